//! Ingredient line and recipe cost estimation with outlier flagging.

use tracing::debug;

use crate::catalog::CatalogIndex;
use crate::config::CostConfig;
use crate::model::{CostTotal, CostWarning, IngredientSlot, LineCost, RecipeCost, RecipeRow};
use crate::normalize::{normalize_text, parse_numeric};
use crate::units::{UnitClass, UnitTable};

#[derive(Debug, Clone, Default)]
pub struct CostOutput {
    pub recipes: Vec<RecipeCost>,
    /// Degenerate conversions encountered while costing.
    pub warnings: Vec<String>,
    pub stats: CostStats,
}

/// Distribution of the calculable recipe totals.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CostStats {
    pub samples: usize,
    pub mean: f64,
    /// Sample standard deviation (n−1). Infinite with fewer than two samples.
    pub std_dev: f64,
}

impl CostStats {
    pub fn from_totals(totals: &[f64]) -> Self {
        let n = totals.len();
        if n == 0 {
            return Self { samples: 0, mean: 0.0, std_dev: f64::INFINITY };
        }
        let mean = totals.iter().sum::<f64>() / n as f64;
        let std_dev = if n < 2 {
            f64::INFINITY
        } else {
            let var = totals.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
            var.sqrt()
        };
        Self { samples: n, mean, std_dev }
    }

    /// Totals above this are statistical outliers. `+∞` when σ is unusable.
    pub fn upper_bound(&self, multiplier: f64) -> f64 {
        let bound = self.mean + multiplier * self.std_dev;
        if bound.is_finite() {
            bound
        } else {
            f64::INFINITY
        }
    }
}

pub fn estimate_costs(
    recipes: &[RecipeRow],
    catalog: &CatalogIndex,
    table: &UnitTable,
    config: &CostConfig,
) -> CostOutput {
    let mut warnings = Vec::new();
    let mut costs: Vec<RecipeCost> = recipes
        .iter()
        .map(|recipe| cost_recipe(recipe, catalog, table, &mut warnings))
        .collect();

    // An overflowing sum would poison the mean and σ for every other recipe.
    let totals: Vec<f64> = costs
        .iter()
        .filter_map(|c| c.total.value())
        .filter(|t| t.is_finite())
        .collect();
    let stats = CostStats::from_totals(&totals);
    let bound = stats.upper_bound(config.std_multiplier);

    for cost in &mut costs {
        cost.warning = match cost.total {
            CostTotal::NotCalculated => CostWarning::NotCalculated,
            CostTotal::Calculated(t) if t > config.absolute_threshold || t > bound => {
                CostWarning::PotentiallyHigh
            }
            CostTotal::Calculated(_) => CostWarning::Ok,
        };
    }

    CostOutput { recipes: costs, warnings, stats }
}

fn cost_recipe(
    recipe: &RecipeRow,
    catalog: &CatalogIndex,
    table: &UnitTable,
    warnings: &mut Vec<String>,
) -> RecipeCost {
    let mut lines = Vec::with_capacity(recipe.slots.len());
    let mut lines_total = 0;
    let mut sum = 0.0;
    let mut lines_costed = 0;

    for slot in &recipe.slots {
        let cost = match normalize_text(slot.name.as_deref()) {
            None => None,
            Some(name) => {
                lines_total += 1;
                line_cost(recipe, slot, &name, catalog, table, warnings)
            }
        };
        if let Some(c) = cost {
            sum += c;
            lines_costed += 1;
        }
        lines.push(LineCost { slot: slot.slot, cost });
    }

    RecipeCost {
        index: recipe.index,
        lines,
        lines_total,
        lines_costed,
        total: if lines_costed > 0 {
            CostTotal::Calculated(sum)
        } else {
            CostTotal::NotCalculated
        },
        warning: CostWarning::NotCalculated,
    }
}

fn line_cost(
    recipe: &RecipeRow,
    slot: &IngredientSlot,
    name: &str,
    catalog: &CatalogIndex,
    table: &UnitTable,
    warnings: &mut Vec<String>,
) -> Option<f64> {
    let qty = parse_numeric(slot.quantity.as_deref())?;
    let (_, record, item) = catalog.lookup(name)?;
    let price = item.price?;

    let (
        UnitClass::Known { category: rc, scale: r_scale, token: r_token },
        UnitClass::Known { category: ic, scale: i_scale, token: i_token },
    ) = (table.classify(slot.unit.as_deref()), table.classify(record.unit.as_deref()))
    else {
        return None;
    };
    if rc != ic {
        return None;
    }

    let cost = if r_token == i_token {
        qty * price
    } else {
        if i_scale == 0.0 {
            warnings.push(format!(
                "{}: item '{}' unit '{}' has a zero conversion factor; line not costed",
                recipe.label(),
                name,
                i_token
            ));
            return None;
        }
        debug!(
            recipe = %recipe.label(),
            slot = slot.slot,
            from = %r_token,
            to = %i_token,
            base = rc.base_unit(),
            "converted ingredient quantity"
        );
        qty * r_scale / i_scale * price
    };

    if !cost.is_finite() {
        warnings.push(format!(
            "{}: cost of '{}' ({} {} at {}) is out of range; line not costed",
            recipe.label(),
            name,
            qty,
            r_token,
            price
        ));
        return None;
    }
    Some(cost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemRecord;
    use crate::units::UnitCategory;

    fn item(name: &str, unit: &str, price: &str) -> ItemRecord {
        ItemRecord {
            name: Some(name.into()),
            unit: Some(unit.into()),
            price: Some(price.into()),
            ..Default::default()
        }
    }

    fn recipe(index: usize, lines: &[(&str, &str, &str)]) -> RecipeRow {
        let cell = |s: &str| if s.is_empty() { None } else { Some(s.to_string()) };
        RecipeRow {
            index,
            menu_item_name: Some(format!("Dish {index}")),
            slots: lines
                .iter()
                .enumerate()
                .map(|(i, (n, q, u))| IngredientSlot {
                    slot: i as u32 + 1,
                    name: cell(n),
                    quantity: cell(q),
                    unit: cell(u),
                })
                .collect(),
            ..Default::default()
        }
    }

    fn catalog() -> CatalogIndex {
        CatalogIndex::from_records(vec![
            item("Tomato", "kg", "2.00"),
            item("Salt", "kg", "0.50"),
            item("Egg", "ea", "0.25"),
            item("Milk", "l", "1.20"),
        ])
    }

    fn run(recipes: &[RecipeRow]) -> CostOutput {
        estimate_costs(recipes, &catalog(), &UnitTable::standard(), &CostConfig::default())
    }

    #[test]
    fn same_unit_line_cost() {
        let out = run(&[recipe(0, &[(" TOMATO ", "3", "kg")])]);
        let r = &out.recipes[0];
        assert_eq!(r.lines[0].cost, Some(6.0));
        assert_eq!(r.total, CostTotal::Calculated(6.0));
        assert_eq!(r.total.to_string(), "6.00");
        assert_eq!((r.lines_costed, r.lines_total), (1, 1));
    }

    #[test]
    fn converted_line_cost() {
        let out = run(&[recipe(0, &[("Salt", "500", "g"), ("Milk", "250", "ml")])]);
        let lines = &out.recipes[0].lines;
        assert!((lines[0].cost.unwrap() - 0.25).abs() < 1e-9);
        assert!((lines[1].cost.unwrap() - 0.30).abs() < 1e-9);
    }

    #[test]
    fn uncostable_lines_stay_blank() {
        let out = run(&[recipe(
            0,
            &[
                ("Salt", "abc", "g"),
                ("Unicorn Dust", "1", "g"),
                ("Egg", "2", "g"),
                ("Tomato", "1", "cups"),
            ],
        )]);
        let r = &out.recipes[0];
        assert!(r.lines.iter().all(|l| l.cost.is_none()));
        assert_eq!(r.total, CostTotal::NotCalculated);
        assert_eq!(r.warning, CostWarning::NotCalculated);
        assert_eq!((r.lines_costed, r.lines_total), (0, 4));
    }

    #[test]
    fn partial_total_is_sum_of_costed_lines() {
        let out = run(&[recipe(0, &[("Tomato", "2", "kg"), ("Salt", "x", "kg"), ("", "", ""), ("Egg", "4", "ea")])]);
        let r = &out.recipes[0];
        let sum: f64 = r.lines.iter().filter_map(|l| l.cost).sum();
        assert_eq!(r.total, CostTotal::Calculated(sum));
        assert_eq!((r.lines_costed, r.lines_total), (2, 3));
    }

    #[test]
    fn absolute_threshold_flags_high_cost() {
        let out = run(&[recipe(0, &[("Tomato", "300", "kg")]), recipe(1, &[("Egg", "1", "ea")])]);
        assert_eq!(out.recipes[0].warning, CostWarning::PotentiallyHigh);
        assert_eq!(out.recipes[1].warning, CostWarning::Ok);
    }

    #[test]
    fn statistical_outlier_flagged() {
        let mut recipes: Vec<RecipeRow> = (0..20).map(|i| recipe(i, &[("Egg", "4", "ea")])).collect();
        recipes.push(recipe(20, &[("Tomato", "100", "kg")]));
        let out = run(&recipes);
        assert_eq!(out.recipes[20].warning, CostWarning::PotentiallyHigh);
        assert!(out.recipes[..20].iter().all(|r| r.warning == CostWarning::Ok));
    }

    #[test]
    fn zero_conversion_factor_leaves_line_uncosted() {
        let tin = "tin".to_string();
        let table = UnitTable::standard().with_extra([(&tin, UnitCategory::Weight, 0.0)]);
        let catalog = CatalogIndex::from_records(vec![item("Tuna", "tin", "3.00")]);
        let out = estimate_costs(&[recipe(0, &[("Tuna", "200", "g")])], &catalog, &table, &CostConfig::default());

        let r = &out.recipes[0];
        assert_eq!(r.lines[0].cost, None);
        assert_eq!(r.total, CostTotal::NotCalculated);
        assert_eq!((r.lines_costed, r.lines_total), (0, 1));
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].contains("zero conversion factor"));
    }

    #[test]
    fn overflowing_line_is_uncosted_and_keeps_outlier_check() {
        let mut recipes: Vec<RecipeRow> = (0..20).map(|i| recipe(i, &[("Egg", "4", "ea")])).collect();
        recipes.push(recipe(20, &[("Tomato", "100", "kg")]));
        recipes.push(recipe(21, &[("Tomato", "1e308", "kg"), ("Egg", "1", "ea")]));
        let out = run(&recipes);

        let huge = &out.recipes[21];
        assert_eq!(huge.lines[0].cost, None);
        assert_eq!(huge.total, CostTotal::Calculated(0.25));
        assert_eq!((huge.lines_costed, huge.lines_total), (1, 2));
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].contains("out of range"));

        assert!(out.stats.mean.is_finite() && out.stats.std_dev.is_finite());
        assert_eq!(out.recipes[20].warning, CostWarning::PotentiallyHigh);
    }

    #[test]
    fn non_finite_totals_are_left_out_of_stats() {
        let mut recipes: Vec<RecipeRow> = (0..20).map(|i| recipe(i, &[("Egg", "4", "ea")])).collect();
        recipes.push(recipe(20, &[("Tomato", "100", "kg")]));
        // Each line is finite; their sum is not.
        recipes.push(recipe(21, &[("Tomato", "8e307", "kg"), ("Tomato", "8e307", "kg")]));
        let out = run(&recipes);

        assert_eq!(out.recipes[21].total.value(), Some(f64::INFINITY));
        assert_eq!(out.recipes[21].warning, CostWarning::PotentiallyHigh);
        assert_eq!(out.stats.samples, 21);
        assert_eq!(out.recipes[20].warning, CostWarning::PotentiallyHigh);
    }

    #[test]
    fn stats_with_single_sample_have_no_bound() {
        let stats = CostStats::from_totals(&[42.0]);
        assert_eq!(stats.mean, 42.0);
        assert_eq!(stats.upper_bound(3.0), f64::INFINITY);

        let stats = CostStats::from_totals(&[1.0, 3.0]);
        assert_eq!(stats.mean, 2.0);
        assert!((stats.std_dev - 2f64.sqrt()).abs() < 1e-12);
    }
}
