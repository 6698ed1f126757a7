//! Unit-of-measure conversion table.
//!
//! Format validity (the configured allowed-unit list) is stricter
//! than convertibility: `grams` converts fine but is not an allowed token.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::normalize::normalize_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitCategory {
    Weight,
    Volume,
    Count,
}

impl UnitCategory {
    /// Base unit every scale in this category is expressed in.
    pub fn base_unit(&self) -> &'static str {
        match self {
            Self::Weight => "g",
            Self::Volume => "ml",
            Self::Count => "ea",
        }
    }
}

impl std::fmt::Display for UnitCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Weight => write!(f, "weight"),
            Self::Volume => write!(f, "volume"),
            Self::Count => write!(f, "count"),
        }
    }
}

/// Result of looking a raw unit token up in the table.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitClass {
    /// No token at all.
    Absent,
    /// Text, but not a unit the table can convert.
    Unknown(String),
    Known {
        category: UnitCategory,
        scale: f64,
        token: String,
    },
}

impl UnitClass {
    pub fn category(&self) -> Option<UnitCategory> {
        match self {
            Self::Known { category, .. } => Some(*category),
            _ => None,
        }
    }
}

const STANDARD_UNITS: &[(&str, UnitCategory, f64)] = &[
    ("g", UnitCategory::Weight, 1.0),
    ("gram", UnitCategory::Weight, 1.0),
    ("grams", UnitCategory::Weight, 1.0),
    ("kg", UnitCategory::Weight, 1000.0),
    ("kilogram", UnitCategory::Weight, 1000.0),
    ("kilograms", UnitCategory::Weight, 1000.0),
    ("ml", UnitCategory::Volume, 1.0),
    ("milliliter", UnitCategory::Volume, 1.0),
    ("milliliters", UnitCategory::Volume, 1.0),
    ("millilitre", UnitCategory::Volume, 1.0),
    ("millilitres", UnitCategory::Volume, 1.0),
    ("l", UnitCategory::Volume, 1000.0),
    ("liter", UnitCategory::Volume, 1000.0),
    ("liters", UnitCategory::Volume, 1000.0),
    ("litre", UnitCategory::Volume, 1000.0),
    ("litres", UnitCategory::Volume, 1000.0),
    ("ea", UnitCategory::Count, 1.0),
    ("each", UnitCategory::Count, 1.0),
];

#[derive(Debug, Clone)]
pub struct UnitTable {
    entries: BTreeMap<String, (UnitCategory, f64)>,
}

impl Default for UnitTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl UnitTable {
    pub fn standard() -> Self {
        let entries = STANDARD_UNITS
            .iter()
            .map(|(token, category, scale)| (token.to_string(), (*category, *scale)))
            .collect();
        Self { entries }
    }

    /// Add entries on top of the standard table. Built-in tokens are never overridden.
    pub fn with_extra<'a>(
        mut self,
        extra: impl IntoIterator<Item = (&'a String, UnitCategory, f64)>,
    ) -> Self {
        for (token, category, scale) in extra {
            let Some(token) = normalize_text(Some(token)) else {
                continue;
            };
            self.entries.entry(token).or_insert((category, scale));
        }
        self
    }

    pub fn classify(&self, raw: Option<&str>) -> UnitClass {
        let Some(token) = normalize_text(raw) else {
            return UnitClass::Absent;
        };
        match self.entries.get(&token) {
            Some(&(category, scale)) => UnitClass::Known { category, scale, token },
            None => UnitClass::Unknown(token),
        }
    }

    /// Same category for both tokens (neither absent nor unknown).
    pub fn convertible(&self, a: Option<&str>, b: Option<&str>) -> bool {
        match (self.classify(a).category(), self.classify(b).category()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
