use crate::cost::CostOutput;
use crate::model::{
    AuditSummary, CostTotal, CostWarning, DuplicateMap, FieldStatus, ItemChecks, RecipeChecks,
    SlotPresence,
};
use crate::reconcile::ReconcileOutput;

/// Per-run counters from every pass.
pub fn compute_summary(
    items: &[ItemChecks],
    duplicates: &DuplicateMap,
    ambiguous_item_names: usize,
    reconciled: &ReconcileOutput,
    recipes: &[RecipeChecks],
    costs: &CostOutput,
) -> AuditSummary {
    let mut s = AuditSummary {
        item_rows: items.len(),
        items_with_duplicates: duplicates.len(),
        ambiguous_item_names,
        recipe_rows: recipes.len(),
        missing_ingredient_refs: reconciled.missing.len(),
        recipes_with_missing: reconciled
            .presence
            .iter()
            .filter(|row| row.contains(&SlotPresence::Missing))
            .count(),
        ..Default::default()
    };

    for item in items {
        if item.has_issue() {
            s.items_with_issues += 1;
        }
        if !item.missing_fields.is_empty() {
            s.items_missing_data += 1;
        }
        s.item_fields_invalid += [&item.size, &item.price, &item.tax_rate, &item.supplier_code]
            .iter()
            .filter(|f| ***f == FieldStatus::InvalidFormat)
            .count();
        if item.uom == FieldStatus::InvalidUnit {
            s.items_invalid_unit += 1;
        }
        if item.size_magnitude.is_too_large() {
            s.items_too_large += 1;
        }
    }

    for slot in recipes.iter().flat_map(|r| &r.slots) {
        if slot.qty == FieldStatus::NonNumeric {
            s.quantities_non_numeric += 1;
        }
        match slot.uom {
            FieldStatus::InvalidUnit => s.units_invalid += 1,
            FieldStatus::UnitMismatch { .. } => s.units_mismatched += 1,
            FieldStatus::ItemNotFound => s.units_item_not_found += 1,
            _ => {}
        }
        if slot.qty_magnitude.is_too_large() {
            s.quantities_too_large += 1;
        }
    }

    for cost in &costs.recipes {
        if matches!(cost.total, CostTotal::Calculated(_)) {
            s.recipes_costed += 1;
        }
        if cost.warning == CostWarning::PotentiallyHigh {
            s.recipes_high_cost += 1;
        }
    }

    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        DuplicateCandidate, MagnitudeStatus, MissingIngredientEntry, RecipeCost, SlotChecks,
    };

    fn item_checks(size: FieldStatus, uom: FieldStatus, missing: Vec<&'static str>) -> ItemChecks {
        ItemChecks {
            index: 0,
            missing_fields: missing,
            size,
            price: FieldStatus::Ok,
            tax_rate: FieldStatus::InvalidFormat,
            supplier_code: FieldStatus::Ok,
            uom,
            size_magnitude: MagnitudeStatus::NoThreshold,
        }
    }

    fn slot(qty: FieldStatus, uom: FieldStatus) -> SlotChecks {
        SlotChecks {
            slot: 1,
            qty,
            uom,
            qty_magnitude: MagnitudeStatus::TooLarge { limit: 20.0, unit: "kg".into() },
        }
    }

    #[test]
    fn summary_counts() {
        let items = vec![
            item_checks(FieldStatus::InvalidFormat, FieldStatus::InvalidUnit, vec!["Tax rate"]),
            item_checks(FieldStatus::Ok, FieldStatus::Ok, vec![]),
        ];
        let mut duplicates = DuplicateMap::new();
        duplicates.insert(
            1,
            vec![DuplicateCandidate {
                item: 1,
                matched: 0,
                matched_name: "x".into(),
                name_score: 90,
                supplier: None,
                size: None,
                price: None,
            }],
        );
        let reconciled = ReconcileOutput {
            missing: vec![MissingIngredientEntry {
                recipe_name: "A".into(),
                ingredient_name: "Dust".into(),
                normalized_name: "dust".into(),
                ingredient_column: "Name (Ingredient 1)".into(),
            }],
            presence: vec![vec![SlotPresence::Missing], vec![SlotPresence::Found]],
        };
        let recipes = vec![
            RecipeChecks { index: 0, slots: vec![slot(FieldStatus::NonNumeric, FieldStatus::ItemNotFound)] },
            RecipeChecks {
                index: 1,
                slots: vec![slot(
                    FieldStatus::Ok,
                    FieldStatus::UnitMismatch { recipe: "g".into(), item: "ea".into() },
                )],
            },
        ];
        let costs = CostOutput {
            recipes: vec![
                RecipeCost {
                    index: 0,
                    lines: vec![],
                    lines_total: 1,
                    lines_costed: 0,
                    total: CostTotal::NotCalculated,
                    warning: CostWarning::NotCalculated,
                },
                RecipeCost {
                    index: 1,
                    lines: vec![],
                    lines_total: 1,
                    lines_costed: 1,
                    total: CostTotal::Calculated(900.0),
                    warning: CostWarning::PotentiallyHigh,
                },
            ],
            ..Default::default()
        };

        let s = compute_summary(&items, &duplicates, 1, &reconciled, &recipes, &costs);
        assert_eq!(s.item_rows, 2);
        // Tax rate is invalid on both rows.
        assert_eq!(s.items_with_issues, 2);
        assert_eq!(s.items_missing_data, 1);
        assert_eq!(s.item_fields_invalid, 3);
        assert_eq!(s.items_invalid_unit, 1);
        assert_eq!(s.items_with_duplicates, 1);
        assert_eq!(s.ambiguous_item_names, 1);
        assert_eq!(s.recipe_rows, 2);
        assert_eq!(s.missing_ingredient_refs, 1);
        assert_eq!(s.recipes_with_missing, 1);
        assert_eq!(s.quantities_non_numeric, 1);
        assert_eq!(s.units_item_not_found, 1);
        assert_eq!(s.units_mismatched, 1);
        assert_eq!(s.quantities_too_large, 2);
        assert_eq!(s.recipes_costed, 1);
        assert_eq!(s.recipes_high_cost, 1);
        assert!(s.has_issues());
    }
}
