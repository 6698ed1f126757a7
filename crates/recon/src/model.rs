use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// One cell of an input dataset. `None` = absent or blank.
pub type Cell = Option<String>;

// ---------------------------------------------------------------------------
// Column names
// ---------------------------------------------------------------------------

pub mod columns {
    pub const ITEM_NAME: &str = "Item name";
    pub const ITEM_SIZE: &str = "Item size";
    pub const ITEM_UNIT: &str = "Item Unit of Measure";
    pub const ITEM_PRICE: &str = "€ Price per unit (excluding VAT)";
    pub const TAX_RATE: &str = "Tax rate";
    pub const SUPPLIER_CODE: &str = "Supplier code";
    pub const SUPPLIER: &str = "Supplier";

    pub const MENU_ITEM_NAME: &str = "Menu item name";

    pub const INGREDIENT_NAME_PREFIX: &str = "Name (Ingredient ";

    pub fn ingredient_name(slot: u32) -> String {
        format!("Name (Ingredient {slot})")
    }

    pub fn ingredient_qty(slot: u32) -> String {
        format!("Qty (Ingredient {slot})")
    }

    pub fn ingredient_unit(slot: u32) -> String {
        format!("Unit (Ingredient {slot})")
    }
}

// ---------------------------------------------------------------------------
// Input records
// ---------------------------------------------------------------------------

/// One catalog entry, known columns typed, everything else in `extra`.
#[derive(Debug, Clone, Default)]
pub struct ItemRecord {
    pub index: usize,
    pub name: Cell,
    pub supplier: Cell,
    pub size: Cell,
    pub unit: Cell,
    pub price: Cell,
    pub tax_rate: Cell,
    pub supplier_code: Cell,
    pub extra: BTreeMap<String, String>,
}

impl ItemRecord {
    pub fn from_row(index: usize, headers: &[String], row: &[Cell]) -> Self {
        let mut record = ItemRecord { index, ..Default::default() };
        for (header, cell) in headers.iter().zip(row) {
            let slot = match header.as_str() {
                columns::ITEM_NAME => &mut record.name,
                columns::SUPPLIER => &mut record.supplier,
                columns::ITEM_SIZE => &mut record.size,
                columns::ITEM_UNIT => &mut record.unit,
                columns::ITEM_PRICE => &mut record.price,
                columns::TAX_RATE => &mut record.tax_rate,
                columns::SUPPLIER_CODE => &mut record.supplier_code,
                _ => {
                    if let Some(value) = cell {
                        record.extra.insert(header.clone(), value.clone());
                    }
                    continue;
                }
            };
            *slot = cell.clone();
        }
        record
    }

    /// Cell value by original column name.
    pub fn field(&self, column: &str) -> Option<&str> {
        match column {
            columns::ITEM_NAME => self.name.as_deref(),
            columns::SUPPLIER => self.supplier.as_deref(),
            columns::ITEM_SIZE => self.size.as_deref(),
            columns::ITEM_UNIT => self.unit.as_deref(),
            columns::ITEM_PRICE => self.price.as_deref(),
            columns::TAX_RATE => self.tax_rate.as_deref(),
            columns::SUPPLIER_CODE => self.supplier_code.as_deref(),
            other => self.extra.get(other).map(String::as_str),
        }
    }
}

/// Which columns exist for one ingredient slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotColumns {
    pub slot: u32,
    pub has_qty: bool,
    pub has_unit: bool,
}

impl SlotColumns {
    pub fn name_column(&self) -> String {
        columns::ingredient_name(self.slot)
    }
}

#[derive(Debug, Clone, Default)]
pub struct IngredientSlot {
    pub slot: u32,
    pub name: Cell,
    pub quantity: Cell,
    pub unit: Cell,
}

/// One menu item with its ingredient slots.
#[derive(Debug, Clone, Default)]
pub struct RecipeRow {
    pub index: usize,
    pub menu_item_name: Cell,
    pub slots: Vec<IngredientSlot>,
    pub extra: BTreeMap<String, String>,
}

impl RecipeRow {
    pub fn from_row(index: usize, headers: &[String], row: &[Cell], layout: &[SlotColumns]) -> Self {
        let mut slots: Vec<IngredientSlot> = layout
            .iter()
            .map(|c| IngredientSlot { slot: c.slot, ..Default::default() })
            .collect();
        let mut record = RecipeRow { index, ..Default::default() };

        for (header, cell) in headers.iter().zip(row) {
            if header == columns::MENU_ITEM_NAME {
                record.menu_item_name = cell.clone();
                continue;
            }
            match parse_slot_header(header) {
                Some((kind, slot)) => {
                    if let Some(s) = slots.iter_mut().find(|s| s.slot == slot) {
                        match kind {
                            SlotField::Name => s.name = cell.clone(),
                            SlotField::Qty => s.quantity = cell.clone(),
                            SlotField::Unit => s.unit = cell.clone(),
                        }
                        continue;
                    }
                    if let Some(value) = cell {
                        record.extra.insert(header.clone(), value.clone());
                    }
                }
                None => {
                    if let Some(value) = cell {
                        record.extra.insert(header.clone(), value.clone());
                    }
                }
            }
        }

        record.slots = slots;
        record
    }

    /// Recipe identifier used in reports.
    pub fn label(&self) -> String {
        self.menu_item_name
            .clone()
            .unwrap_or_else(|| format!("Recipe at row index {}", self.index))
    }

    pub fn field(&self, column: &str) -> Option<&str> {
        if column == columns::MENU_ITEM_NAME {
            return self.menu_item_name.as_deref();
        }
        if let Some((kind, slot)) = parse_slot_header(column) {
            if let Some(s) = self.slots.iter().find(|s| s.slot == slot) {
                return match kind {
                    SlotField::Name => s.name.as_deref(),
                    SlotField::Qty => s.quantity.as_deref(),
                    SlotField::Unit => s.unit.as_deref(),
                };
            }
        }
        self.extra.get(column).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotField {
    Name,
    Qty,
    Unit,
}

/// `"Qty (Ingredient 3)"` → `(Qty, 3)`.
pub fn parse_slot_header(header: &str) -> Option<(SlotField, u32)> {
    let (kind, rest) = if let Some(rest) = header.strip_prefix(columns::INGREDIENT_NAME_PREFIX) {
        (SlotField::Name, rest)
    } else if let Some(rest) = header.strip_prefix("Qty (Ingredient ") {
        (SlotField::Qty, rest)
    } else if let Some(rest) = header.strip_prefix("Unit (Ingredient ") {
        (SlotField::Unit, rest)
    } else {
        return None;
    };
    let slot: u32 = rest.strip_suffix(')')?.trim().parse().ok()?;
    Some((kind, slot))
}

/// Discover ingredient slots from the `Name (Ingredient i)` headers, ordered by slot.
pub fn discover_slots(headers: &[String]) -> Vec<SlotColumns> {
    let mut slots: BTreeMap<u32, SlotColumns> = BTreeMap::new();
    for header in headers {
        if let Some((SlotField::Name, slot)) = parse_slot_header(header) {
            slots.insert(slot, SlotColumns { slot, has_qty: false, has_unit: false });
        }
    }
    for header in headers {
        match parse_slot_header(header) {
            Some((SlotField::Qty, slot)) => {
                if let Some(s) = slots.get_mut(&slot) {
                    s.has_qty = true;
                }
            }
            Some((SlotField::Unit, slot)) => {
                if let Some(s) = slots.get_mut(&slot) {
                    s.has_unit = true;
                }
            }
            _ => {}
        }
    }
    slots.into_values().collect()
}

// ---------------------------------------------------------------------------
// Statuses
// ---------------------------------------------------------------------------

/// Outcome of one field check. Always exactly one value per inspected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    Ok,
    Missing,
    /// Recipe quantity that does not parse.
    NonNumeric,
    /// Item field that does not parse (numbers, digit-only codes).
    InvalidFormat,
    InvalidUnit,
    ColumnMissing,
    NoIngredient,
    ItemNotFound,
    MatchesItem,
    Convertible,
    NoMasterUnit,
    MasterUnitInvalid,
    UnitMismatch { recipe: String, item: String },
}

impl FieldStatus {
    /// Any OK flavour, including the unit cross-check refinements.
    pub fn is_ok(&self) -> bool {
        matches!(
            self,
            Self::Ok | Self::MatchesItem | Self::Convertible | Self::NoMasterUnit | Self::MasterUnitInvalid
        )
    }
}

impl fmt::Display for FieldStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Missing => write!(f, "Missing"),
            Self::NonNumeric => write!(f, "Non-Numeric"),
            Self::InvalidFormat => write!(f, "Non-Numeric/Invalid Format"),
            Self::InvalidUnit => write!(f, "Invalid UOM"),
            Self::ColumnMissing => write!(f, "Column Missing"),
            Self::NoIngredient => write!(f, "OK (No Ingredient)"),
            Self::ItemNotFound => write!(f, "Item Not Found"),
            Self::MatchesItem => write!(f, "OK (Matches Item Master)"),
            Self::Convertible => write!(f, "OK (Convertible)"),
            Self::NoMasterUnit => write!(f, "OK (No Master UOM)"),
            Self::MasterUnitInvalid => write!(f, "OK (Master UOM Invalid)"),
            Self::UnitMismatch { recipe, item } => {
                write!(f, "UOM Mismatch (Recipe: {recipe}, Item: {item})")
            }
        }
    }
}

/// Size/quantity plausibility. Only `Ok`/`TooLarge` when the inputs were valid.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MagnitudeStatus {
    Ok,
    TooLarge { limit: f64, unit: String },
    /// Value or unit check did not pass; `field` names the value ("Size", "Qty").
    InputsInvalid { field: &'static str },
    NoThreshold,
    NoIngredient,
}

impl MagnitudeStatus {
    pub fn is_too_large(&self) -> bool {
        matches!(self, Self::TooLarge { .. })
    }
}

impl fmt::Display for MagnitudeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::TooLarge { limit, unit } => write!(f, "Potentially Too Large (>{limit}{unit})"),
            Self::InputsInvalid { field } => write!(f, "N/A ({field}/UOM Invalid or Missing)"),
            Self::NoThreshold => write!(f, "N/A (UOM not in threshold check)"),
            Self::NoIngredient => write!(f, "N/A (No Ingredient)"),
        }
    }
}

/// Reconciler verdict for one ingredient slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotPresence {
    Found,
    Missing,
    Empty,
}

impl fmt::Display for SlotPresence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found => write!(f, "FOUND"),
            Self::Missing => write!(f, "MISSING"),
            Self::Empty => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-row results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ItemChecks {
    pub index: usize,
    /// Required columns that are blank or absent, in configured order.
    pub missing_fields: Vec<&'static str>,
    pub size: FieldStatus,
    pub price: FieldStatus,
    pub tax_rate: FieldStatus,
    pub supplier_code: FieldStatus,
    pub uom: FieldStatus,
    pub size_magnitude: MagnitudeStatus,
}

impl ItemChecks {
    pub fn missing_data_flag(&self) -> String {
        if self.missing_fields.is_empty() {
            "OK".into()
        } else {
            format!("Missing: {}", self.missing_fields.join(", "))
        }
    }

    pub fn has_issue(&self) -> bool {
        !self.missing_fields.is_empty()
            || [&self.size, &self.price, &self.tax_rate, &self.supplier_code]
                .iter()
                .any(|s| **s == FieldStatus::InvalidFormat)
            || self.uom == FieldStatus::InvalidUnit
            || self.size_magnitude.is_too_large()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotChecks {
    pub slot: u32,
    pub qty: FieldStatus,
    pub uom: FieldStatus,
    pub qty_magnitude: MagnitudeStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeChecks {
    pub index: usize,
    pub slots: Vec<SlotChecks>,
}

/// Sum of line costs, or nothing when no line could be costed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CostTotal {
    Calculated(f64),
    NotCalculated,
}

impl CostTotal {
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Calculated(v) => Some(*v),
            Self::NotCalculated => None,
        }
    }
}

impl fmt::Display for CostTotal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Calculated(v) => write!(f, "{v:.2}"),
            Self::NotCalculated => write!(f, "Not Calculated"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CostWarning {
    Ok,
    PotentiallyHigh,
    NotCalculated,
}

impl fmt::Display for CostWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::PotentiallyHigh => write!(f, "Potentially High Cost"),
            Self::NotCalculated => write!(f, "Cost Not Calculated"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LineCost {
    pub slot: u32,
    pub cost: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeCost {
    pub index: usize,
    pub lines: Vec<LineCost>,
    /// Populated slots (non-empty ingredient name).
    pub lines_total: usize,
    pub lines_costed: usize,
    pub total: CostTotal,
    pub warning: CostWarning,
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingIngredientEntry {
    pub recipe_name: String,
    pub ingredient_name: String,
    pub normalized_name: String,
    pub ingredient_column: String,
}

/// Corroborating comparison of one field across a candidate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldMatch {
    Yes,
    BothZero,
    No,
    /// Only one side has a value.
    Partial,
}

impl fmt::Display for FieldMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yes => write!(f, "Y"),
            Self::BothZero => write!(f, "Y (Both 0)"),
            Self::No => write!(f, "N"),
            Self::Partial => write!(f, "Partial"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateCandidate {
    pub item: usize,
    pub matched: usize,
    pub matched_name: String,
    pub name_score: u8,
    pub supplier: Option<FieldMatch>,
    pub size: Option<FieldMatch>,
    pub price: Option<FieldMatch>,
}

impl fmt::Display for DuplicateCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Item:'{}' (Idx:{},NameScore:{}",
            self.matched_name, self.matched, self.name_score
        )?;
        for (label, flag) in [("SupMatch", self.supplier), ("SizeMatch", self.size), ("PriceMatch", self.price)] {
            if let Some(flag) = flag {
                write!(f, ",{label}:{flag}")?;
            }
        }
        write!(f, ")")
    }
}

/// Candidates per source item index. Items without candidates are absent.
pub type DuplicateMap = BTreeMap<usize, Vec<DuplicateCandidate>>;

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Original columns plus status columns, rendered as text.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnnotatedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl AnnotatedTable {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell by row and column name.
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.column(column)?;
        self.rows.get(row)?.get(col).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditSummary {
    pub item_rows: usize,
    pub items_with_issues: usize,
    pub items_missing_data: usize,
    pub item_fields_invalid: usize,
    pub items_invalid_unit: usize,
    pub items_too_large: usize,
    pub items_with_duplicates: usize,
    pub ambiguous_item_names: usize,
    pub recipe_rows: usize,
    pub missing_ingredient_refs: usize,
    pub recipes_with_missing: usize,
    pub quantities_non_numeric: usize,
    pub units_invalid: usize,
    pub units_mismatched: usize,
    pub units_item_not_found: usize,
    pub quantities_too_large: usize,
    pub recipes_costed: usize,
    pub recipes_high_cost: usize,
}

impl AuditSummary {
    pub fn has_issues(&self) -> bool {
        self.items_with_issues > 0
            || self.items_with_duplicates > 0
            || self.missing_ingredient_refs > 0
            || self.quantities_non_numeric > 0
            || self.units_invalid > 0
            || self.units_mismatched > 0
            || self.units_item_not_found > 0
            || self.quantities_too_large > 0
            || self.recipes_high_cost > 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
    pub ingredient_slots: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditResult {
    pub meta: AuditMeta,
    pub summary: AuditSummary,
    pub warnings: Vec<String>,
    pub missing_ingredients: Vec<MissingIngredientEntry>,
    pub duplicates: DuplicateMap,
    pub items: AnnotatedTable,
    pub recipes: AnnotatedTable,
}
