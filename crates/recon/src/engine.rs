use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::catalog::CatalogIndex;
use crate::config::AuditConfig;
use crate::cost::{estimate_costs, CostOutput};
use crate::dataset::Dataset;
use crate::duplicates::{annotation, DuplicateFinder, PairwiseScan};
use crate::error::AuditError;
use crate::model::{
    columns, discover_slots, AnnotatedTable, AuditMeta, AuditResult, Cell, DuplicateMap,
    ItemChecks, RecipeChecks, RecipeRow, SlotColumns, SlotPresence,
};
use crate::reconcile::reconcile;
use crate::summary::compute_summary;
use crate::validate::{validate_items, validate_recipes};

const ITEM_STATUS_COLUMNS: [&str; 8] = [
    "Missing_Data_Flag",
    "Size_Status",
    "Price_Status",
    "Tax_Rate_Status",
    "Supplier_Code_Status",
    "UOM_Status",
    "Size_Magnitude_Flag",
    "Potential_Duplicates_Info",
];

const SLOT_STATUS_PREFIXES: [&str; 5] = [
    "Status",
    "Qty_Status",
    "UOM_Status",
    "Qty_Magnitude_Status",
    "Est_Cost",
];

const RECIPE_TOTAL_COLUMNS: [&str; 3] = [
    "Calculated_Recipe_Total_Cost",
    "Cost_Lines_Calculated",
    "Recipe_Cost_Warning",
];

const DUPLICATES_TIMED_OUT: &str = "Not Checked (Duplicate Scan Timed Out)";

/// Run every pass with the default pairwise duplicate scan.
pub fn run(config: &AuditConfig, items: &Dataset, recipes: &Dataset) -> Result<AuditResult, AuditError> {
    run_with_finder(config, items, recipes, &PairwiseScan::new(&config.duplicates))
}

/// Run every pass, detecting duplicates with `finder`.
pub fn run_with_finder(
    config: &AuditConfig,
    items: &Dataset,
    recipes: &Dataset,
    finder: &dyn DuplicateFinder,
) -> Result<AuditResult, AuditError> {
    let layout = check_structure(items, recipes)?;
    let mut warnings = Vec::new();

    if !recipes.has_column(columns::MENU_ITEM_NAME) {
        let msg = format!(
            "recipes: column '{}' not found; recipes are labelled by row index",
            columns::MENU_ITEM_NAME
        );
        warn!("{msg}");
        warnings.push(msg);
    }

    for ds in [items, recipes] {
        if !ds.truncated_rows.is_empty() {
            let msg = format!(
                "{}: {} row(s) have values beyond the last header column, dropped (row indices {:?})",
                ds.name,
                ds.truncated_rows.len(),
                ds.truncated_rows
            );
            warn!("{msg}");
            warnings.push(msg);
        }
    }

    // Catalog
    let catalog = CatalogIndex::build(items);
    let ambiguous = catalog.ambiguous_names();
    for (name, indices) in &ambiguous {
        debug!(name, ?indices, "item name shared by several catalog rows; lookups use the first");
    }
    info!(items = catalog.len(), ambiguous_names = ambiguous.len(), "catalog indexed");

    let recipe_rows: Vec<RecipeRow> = recipes
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| RecipeRow::from_row(i, &recipes.headers, row, &layout))
        .collect();

    // Passes
    let reconciled = reconcile(&recipe_rows, &catalog);
    info!(
        recipes = recipe_rows.len(),
        slots = layout.len(),
        missing = reconciled.missing.len(),
        "ingredients reconciled"
    );

    let item_checks = validate_items(&items.headers, &catalog, config);
    let table = config.units.table();
    let recipe_checks = validate_recipes(&recipe_rows, &layout, &catalog, config, &table);
    info!(items = item_checks.len(), recipes = recipe_checks.len(), "fields validated");

    let costs = estimate_costs(&recipe_rows, &catalog, &table, &config.cost);
    for w in &costs.warnings {
        warn!("{w}");
    }
    warnings.extend(costs.warnings.iter().cloned());
    info!(
        costed = costs.stats.samples,
        mean = costs.stats.mean,
        std_dev = costs.stats.std_dev,
        "recipe costs estimated"
    );

    let duplicates = match finder.find_potential_duplicates(&catalog) {
        Ok(map) => {
            info!(items_with_candidates = map.len(), "duplicate scan finished");
            Some(map)
        }
        Err(err @ AuditError::DuplicateScanTimeout { .. }) => {
            let msg = format!("{err}; duplicate annotations skipped");
            warn!("{msg}");
            warnings.push(msg);
            None
        }
        Err(err) => return Err(err),
    };

    let summary = compute_summary(
        &item_checks,
        duplicates.as_ref().unwrap_or(&DuplicateMap::new()),
        ambiguous.len(),
        &reconciled,
        &recipe_checks,
        &costs,
    );

    let item_table = build_item_table(items, &item_checks, duplicates.as_ref());
    let recipe_table = build_recipe_table(recipes, &layout, &reconciled.presence, &recipe_checks, &costs);

    Ok(AuditResult {
        meta: AuditMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            ingredient_slots: layout.len(),
        },
        summary,
        warnings,
        missing_ingredients: reconciled.missing,
        duplicates: duplicates.unwrap_or_default(),
        items: item_table,
        recipes: recipe_table,
    })
}

/// Conditions under which no row can be processed.
fn check_structure(items: &Dataset, recipes: &Dataset) -> Result<Vec<SlotColumns>, AuditError> {
    if items.is_empty() {
        return Err(AuditError::EmptyDataset { dataset: items.name.clone() });
    }
    if !items.has_column(columns::ITEM_NAME) {
        return Err(AuditError::MissingColumn {
            dataset: items.name.clone(),
            column: columns::ITEM_NAME.into(),
        });
    }
    if recipes.is_empty() {
        return Err(AuditError::EmptyDataset { dataset: recipes.name.clone() });
    }
    let layout = discover_slots(&recipes.headers);
    if layout.is_empty() {
        return Err(AuditError::NoIngredientColumns { dataset: recipes.name.clone() });
    }
    Ok(layout)
}

// ---------------------------------------------------------------------------
// Table assembly
// ---------------------------------------------------------------------------

fn text(cell: &Cell) -> String {
    cell.clone().unwrap_or_default()
}

fn build_item_table(items: &Dataset, checks: &[ItemChecks], duplicates: Option<&DuplicateMap>) -> AnnotatedTable {
    let mut headers = items.headers.clone();
    headers.extend(ITEM_STATUS_COLUMNS.iter().map(|c| c.to_string()));

    let rows = items
        .rows
        .iter()
        .zip(checks)
        .map(|(row, c)| {
            let mut out: Vec<String> = row.iter().map(text).collect();
            out.push(c.missing_data_flag());
            out.push(c.size.to_string());
            out.push(c.price.to_string());
            out.push(c.tax_rate.to_string());
            out.push(c.supplier_code.to_string());
            out.push(c.uom.to_string());
            out.push(c.size_magnitude.to_string());
            out.push(match duplicates {
                None => DUPLICATES_TIMED_OUT.to_string(),
                Some(map) => annotation(map.get(&c.index).map(Vec::as_slice).unwrap_or(&[])),
            });
            out
        })
        .collect();

    AnnotatedTable { headers, rows }
}

/// Header position after which each slot's status columns go, keyed by
/// column index, valued by slot position in `layout`.
fn slot_anchors(headers: &[String], layout: &[SlotColumns]) -> BTreeMap<usize, Vec<usize>> {
    let mut anchors: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (k, cols) in layout.iter().enumerate() {
        let names = [
            columns::ingredient_name(cols.slot),
            columns::ingredient_qty(cols.slot),
            columns::ingredient_unit(cols.slot),
        ];
        let last = headers
            .iter()
            .rposition(|h| names.contains(h))
            .unwrap_or(headers.len().saturating_sub(1));
        anchors.entry(last).or_default().push(k);
    }
    anchors
}

fn build_recipe_table(
    recipes: &Dataset,
    layout: &[SlotColumns],
    presence: &[Vec<SlotPresence>],
    checks: &[RecipeChecks],
    costs: &CostOutput,
) -> AnnotatedTable {
    let anchors = slot_anchors(&recipes.headers, layout);

    let mut headers = Vec::new();
    for (i, header) in recipes.headers.iter().enumerate() {
        headers.push(header.clone());
        for &k in anchors.get(&i).into_iter().flatten() {
            let slot = layout[k].slot;
            headers.extend(SLOT_STATUS_PREFIXES.iter().map(|p| format!("{p} (Ingredient {slot})")));
        }
    }
    headers.extend(RECIPE_TOTAL_COLUMNS.iter().map(|c| c.to_string()));

    let rows = recipes
        .rows
        .iter()
        .enumerate()
        .map(|(r, row)| {
            let check = &checks[r];
            let cost = &costs.recipes[r];
            let mut out = Vec::with_capacity(headers.len());
            for (i, cell) in row.iter().enumerate() {
                out.push(text(cell));
                for &k in anchors.get(&i).into_iter().flatten() {
                    let slot = &check.slots[k];
                    out.push(presence[r][k].to_string());
                    out.push(slot.qty.to_string());
                    out.push(slot.uom.to_string());
                    out.push(slot.qty_magnitude.to_string());
                    out.push(cost.lines[k].cost.map(|c| format!("{c:.2}")).unwrap_or_default());
                }
            }
            out.push(cost.total.to_string());
            out.push(format!("{} of {}", cost.lines_costed, cost.lines_total));
            out.push(cost.warning.to_string());
            out
        })
        .collect();

    AnnotatedTable { headers, rows }
}
