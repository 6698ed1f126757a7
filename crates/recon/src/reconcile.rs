use crate::catalog::CatalogIndex;
use crate::model::{columns, MissingIngredientEntry, RecipeRow, SlotPresence};
use crate::normalize::normalize_text;

#[derive(Debug, Clone, Default)]
pub struct ReconcileOutput {
    /// Row-major, then slot-major.
    pub missing: Vec<MissingIngredientEntry>,
    /// One entry per recipe row, one presence per slot.
    pub presence: Vec<Vec<SlotPresence>>,
}

/// Resolve every populated ingredient slot against the catalog.
pub fn reconcile(recipes: &[RecipeRow], catalog: &CatalogIndex) -> ReconcileOutput {
    let mut out = ReconcileOutput {
        missing: Vec::new(),
        presence: Vec::with_capacity(recipes.len()),
    };

    for recipe in recipes {
        let mut row = Vec::with_capacity(recipe.slots.len());
        for slot in &recipe.slots {
            let presence = match normalize_text(slot.name.as_deref()) {
                None => SlotPresence::Empty,
                Some(normalized) if catalog.contains(&normalized) => SlotPresence::Found,
                Some(normalized) => {
                    out.missing.push(MissingIngredientEntry {
                        recipe_name: recipe.label(),
                        ingredient_name: slot.name.clone().unwrap_or_default(),
                        normalized_name: normalized,
                        ingredient_column: columns::ingredient_name(slot.slot),
                    });
                    SlotPresence::Missing
                }
            };
            row.push(presence);
        }
        out.presence.push(row);
    }

    out
}
