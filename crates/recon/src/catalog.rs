//! Item catalog index: every item parsed exactly once, looked up by normalized name.

use std::collections::{BTreeMap, HashMap};

use crate::dataset::Dataset;
use crate::model::ItemRecord;
use crate::normalize::{normalize_text, parse_digit_string, parse_numeric, parse_percentage};

/// Parsed view of one item, shared by every consumer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedItem {
    pub name: Option<String>,
    pub supplier: Option<String>,
    pub unit: Option<String>,
    pub size: Option<f64>,
    pub price: Option<f64>,
    /// Fraction, e.g. 0.21.
    pub tax_rate: Option<f64>,
    pub supplier_code: Option<String>,
}

impl ParsedItem {
    pub fn parse(record: &ItemRecord) -> Self {
        Self {
            name: normalize_text(record.name.as_deref()),
            supplier: normalize_text(record.supplier.as_deref()),
            unit: normalize_text(record.unit.as_deref()),
            size: parse_numeric(record.size.as_deref()),
            price: parse_numeric(record.price.as_deref()),
            tax_rate: parse_percentage(record.tax_rate.as_deref()),
            supplier_code: parse_digit_string(record.supplier_code.as_deref()),
        }
    }
}

pub struct CatalogIndex {
    records: Vec<ItemRecord>,
    parsed: Vec<ParsedItem>,
    /// Normalized name → item indices in dataset order.
    by_name: HashMap<String, Vec<usize>>,
}

impl CatalogIndex {
    pub fn build(items: &Dataset) -> Self {
        let records: Vec<ItemRecord> = items
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| ItemRecord::from_row(i, &items.headers, row))
            .collect();
        Self::from_records(records)
    }

    pub fn from_records(records: Vec<ItemRecord>) -> Self {
        let parsed: Vec<ParsedItem> = records.iter().map(ParsedItem::parse).collect();
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, p) in parsed.iter().enumerate() {
            if let Some(name) = &p.name {
                by_name.entry(name.clone()).or_default().push(i);
            }
        }
        Self { records, parsed, by_name }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ItemRecord] {
        &self.records
    }

    pub fn parsed(&self) -> &[ParsedItem] {
        &self.parsed
    }

    pub fn record(&self, index: usize) -> &ItemRecord {
        &self.records[index]
    }

    pub fn parsed_item(&self, index: usize) -> &ParsedItem {
        &self.parsed[index]
    }

    /// First item carrying this normalized name. Ambiguous when duplicates exist.
    pub fn lookup(&self, normalized: &str) -> Option<(usize, &ItemRecord, &ParsedItem)> {
        let index = *self.by_name.get(normalized)?.first()?;
        Some((index, &self.records[index], &self.parsed[index]))
    }

    pub fn contains(&self, normalized: &str) -> bool {
        self.by_name.contains_key(normalized)
    }

    /// Every item index sharing this normalized name.
    pub fn indices_for(&self, normalized: &str) -> &[usize] {
        self.by_name.get(normalized).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Normalized names carried by more than one item, with their indices.
    pub fn ambiguous_names(&self) -> BTreeMap<&str, &[usize]> {
        self.by_name
            .iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(name, ids)| (name.as_str(), ids.as_slice()))
            .collect()
    }
}
