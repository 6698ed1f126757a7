//! Field validation: the item pass and the recipe-ingredient pass.
//!
//! Both passes are read-only and row-scoped. Every inspected field gets
//! exactly one status; magnitude checks run only when the value and unit
//! checks they depend on both passed.

use std::collections::BTreeMap;

use crate::catalog::{CatalogIndex, ParsedItem};
use crate::config::AuditConfig;
use crate::model::{
    columns, FieldStatus, ItemChecks, ItemRecord, MagnitudeStatus, RecipeChecks, RecipeRow,
    SlotChecks, SlotColumns,
};
use crate::normalize::{is_blank, normalize_text, parse_numeric};
use crate::units::UnitTable;

/// Item columns that must carry a value, in reporting order.
pub const REQUIRED_ITEM_COLUMNS: [&str; 5] = [
    columns::ITEM_SIZE,
    columns::ITEM_UNIT,
    columns::ITEM_PRICE,
    columns::TAX_RATE,
    columns::SUPPLIER_CODE,
];

// ---------------------------------------------------------------------------
// Item pass
// ---------------------------------------------------------------------------

/// Which of the checked item columns exist in the dataset.
#[derive(Debug, Clone, Copy)]
struct ItemLayout {
    size: bool,
    unit: bool,
    price: bool,
    tax_rate: bool,
    supplier_code: bool,
}

impl ItemLayout {
    fn from_headers(headers: &[String]) -> Self {
        let has = |c: &str| headers.iter().any(|h| h == c);
        Self {
            size: has(columns::ITEM_SIZE),
            unit: has(columns::ITEM_UNIT),
            price: has(columns::ITEM_PRICE),
            tax_rate: has(columns::TAX_RATE),
            supplier_code: has(columns::SUPPLIER_CODE),
        }
    }
}

pub fn validate_items(headers: &[String], catalog: &CatalogIndex, config: &AuditConfig) -> Vec<ItemChecks> {
    let layout = ItemLayout::from_headers(headers);
    catalog
        .records()
        .iter()
        .zip(catalog.parsed())
        .map(|(record, parsed)| check_item(record, parsed, layout, config))
        .collect()
}

fn check_item(record: &ItemRecord, parsed: &ParsedItem, layout: ItemLayout, config: &AuditConfig) -> ItemChecks {
    let missing_fields = REQUIRED_ITEM_COLUMNS
        .iter()
        .copied()
        .filter(|col| is_blank(record.field(col)))
        .collect();

    let size = value_status(layout.size, record.size.as_deref(), parsed.size.is_some());
    let price = value_status(layout.price, record.price.as_deref(), parsed.price.is_some());
    let tax_rate = value_status(layout.tax_rate, record.tax_rate.as_deref(), parsed.tax_rate.is_some());
    let supplier_code = value_status(
        layout.supplier_code,
        record.supplier_code.as_deref(),
        parsed.supplier_code.is_some(),
    );

    let uom = if !layout.unit {
        FieldStatus::ColumnMissing
    } else {
        match &parsed.unit {
            None => FieldStatus::Missing,
            Some(unit) if !config.units.is_allowed(unit) => FieldStatus::InvalidUnit,
            Some(_) => FieldStatus::Ok,
        }
    };

    let size_magnitude = match (&size, &uom, parsed.size, &parsed.unit) {
        (FieldStatus::Ok, FieldStatus::Ok, Some(value), Some(unit)) => {
            magnitude(value, unit, &config.magnitude.item_size)
        }
        _ => MagnitudeStatus::InputsInvalid { field: "Size" },
    };

    ItemChecks {
        index: record.index,
        missing_fields,
        size,
        price,
        tax_rate,
        supplier_code,
        uom,
        size_magnitude,
    }
}

/// Column Missing / Missing / Non-Numeric/Invalid Format / OK.
fn value_status(column_present: bool, raw: Option<&str>, parsed: bool) -> FieldStatus {
    if !column_present {
        FieldStatus::ColumnMissing
    } else if is_blank(raw) {
        FieldStatus::Missing
    } else if !parsed {
        FieldStatus::InvalidFormat
    } else {
        FieldStatus::Ok
    }
}

fn magnitude(value: f64, unit: &str, limits: &BTreeMap<String, f64>) -> MagnitudeStatus {
    match limits.get(unit) {
        Some(&limit) if value > limit => MagnitudeStatus::TooLarge {
            limit,
            unit: unit.to_string(),
        },
        Some(_) => MagnitudeStatus::Ok,
        None => MagnitudeStatus::NoThreshold,
    }
}

// ---------------------------------------------------------------------------
// Recipe-ingredient pass
// ---------------------------------------------------------------------------

pub fn validate_recipes(
    recipes: &[RecipeRow],
    layout: &[SlotColumns],
    catalog: &CatalogIndex,
    config: &AuditConfig,
    table: &UnitTable,
) -> Vec<RecipeChecks> {
    recipes
        .iter()
        .map(|recipe| RecipeChecks {
            index: recipe.index,
            slots: layout
                .iter()
                .zip(&recipe.slots)
                .map(|(cols, slot)| {
                    check_slot(
                        cols,
                        slot.name.as_deref(),
                        slot.quantity.as_deref(),
                        slot.unit.as_deref(),
                        catalog,
                        config,
                        table,
                    )
                })
                .collect(),
        })
        .collect()
}

fn check_slot(
    cols: &SlotColumns,
    name: Option<&str>,
    quantity: Option<&str>,
    unit: Option<&str>,
    catalog: &CatalogIndex,
    config: &AuditConfig,
    table: &UnitTable,
) -> SlotChecks {
    let name = normalize_text(name);
    let unit = normalize_text(unit);
    let unit_allowed = unit.as_deref().is_some_and(|u| config.units.is_allowed(u));

    let qty = if !cols.has_qty {
        FieldStatus::ColumnMissing
    } else if name.is_none() && is_blank(quantity) {
        FieldStatus::NoIngredient
    } else if is_blank(quantity) {
        FieldStatus::Missing
    } else if parse_numeric(quantity).is_none() {
        FieldStatus::NonNumeric
    } else {
        FieldStatus::Ok
    };

    let uom = if !cols.has_unit {
        FieldStatus::ColumnMissing
    } else {
        match (&name, &unit) {
            (None, Some(_)) if !unit_allowed => FieldStatus::InvalidUnit,
            (None, _) => FieldStatus::NoIngredient,
            (Some(_), None) => FieldStatus::Missing,
            (Some(_), Some(_)) if !unit_allowed => FieldStatus::InvalidUnit,
            (Some(name), Some(unit)) => match catalog.lookup(name) {
                None => FieldStatus::ItemNotFound,
                Some((_, _, item)) => against_master(unit, item.unit.as_deref(), config, table),
            },
        }
    };

    let qty_magnitude = match (&name, &qty, parse_numeric(quantity), &unit) {
        (None, _, _, _) => MagnitudeStatus::NoIngredient,
        (Some(_), FieldStatus::Ok, Some(value), Some(unit)) if cols.has_unit && unit_allowed => {
            magnitude(value, unit, &config.magnitude.recipe_qty)
        }
        _ => MagnitudeStatus::InputsInvalid { field: "Qty" },
    };

    SlotChecks {
        slot: cols.slot,
        qty,
        uom,
        qty_magnitude,
    }
}

/// Compare a well-formed recipe unit with the resolved item's unit.
fn against_master(recipe: &str, master: Option<&str>, config: &AuditConfig, table: &UnitTable) -> FieldStatus {
    match master {
        None => FieldStatus::NoMasterUnit,
        Some(master) if !config.units.is_allowed(master) => FieldStatus::MasterUnitInvalid,
        Some(master) if master == recipe => FieldStatus::MatchesItem,
        Some(master) if table.convertible(Some(recipe), Some(master)) => FieldStatus::Convertible,
        Some(master) => FieldStatus::UnitMismatch {
            recipe: recipe.to_string(),
            item: master.to_string(),
        },
    }
}
