use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::AuditError;
use crate::normalize::normalize_text;
use crate::units::{UnitCategory, UnitTable};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Tunables for one audit run. Every section is optional in TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub units: UnitsConfig,
    #[serde(default)]
    pub magnitude: MagnitudeConfig,
    #[serde(default)]
    pub duplicates: DuplicateConfig,
    #[serde(default)]
    pub cost: CostConfig,
}

fn default_name() -> String {
    "default".into()
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            units: UnitsConfig::default(),
            magnitude: MagnitudeConfig::default(),
            duplicates: DuplicateConfig::default(),
            cost: CostConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitsConfig {
    /// Tokens accepted as a well-formed unit of measure.
    #[serde(default = "default_allowed_units")]
    pub allowed: Vec<String>,
    /// Conversion entries added on top of the built-in table.
    #[serde(default)]
    pub extra: BTreeMap<String, ExtraUnit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtraUnit {
    pub category: UnitCategory,
    pub scale: f64,
}

fn default_allowed_units() -> Vec<String> {
    ["g", "kg", "l", "ml", "ea"].iter().map(|s| s.to_string()).collect()
}

impl Default for UnitsConfig {
    fn default() -> Self {
        Self {
            allowed: default_allowed_units(),
            extra: BTreeMap::new(),
        }
    }
}

impl UnitsConfig {
    pub fn is_allowed(&self, normalized: &str) -> bool {
        self.allowed.iter().any(|u| u == normalized)
    }

    pub fn table(&self) -> UnitTable {
        UnitTable::standard().with_extra(
            self.extra
                .iter()
                .map(|(token, unit)| (token, unit.category, unit.scale)),
        )
    }
}

// ---------------------------------------------------------------------------
// Magnitude thresholds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MagnitudeConfig {
    /// Largest plausible `Item size` per unit.
    #[serde(default = "default_item_size_limits")]
    pub item_size: BTreeMap<String, f64>,
    /// Largest plausible recipe quantity per unit.
    #[serde(default = "default_recipe_qty_limits")]
    pub recipe_qty: BTreeMap<String, f64>,
}

fn limits(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs.iter().map(|(u, v)| (u.to_string(), *v)).collect()
}

fn default_item_size_limits() -> BTreeMap<String, f64> {
    limits(&[("g", 10000.0), ("ml", 10000.0), ("kg", 100.0), ("l", 100.0), ("ea", 1000.0)])
}

fn default_recipe_qty_limits() -> BTreeMap<String, f64> {
    limits(&[("g", 20000.0), ("ml", 20000.0), ("kg", 20.0), ("l", 20.0), ("ea", 200.0)])
}

impl Default for MagnitudeConfig {
    fn default() -> Self {
        Self {
            item_size: default_item_size_limits(),
            recipe_qty: default_recipe_qty_limits(),
        }
    }
}

// ---------------------------------------------------------------------------
// Duplicates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DuplicateConfig {
    /// Minimum token-sort similarity (0-100) for a name pair to count.
    #[serde(default = "default_name_threshold")]
    pub name_threshold: u8,
    /// Ranked neighbours considered per item.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// Relative tolerance for size comparison (0.01 = 1%).
    #[serde(default = "default_tolerance")]
    pub size_tolerance: f64,
    #[serde(default = "default_tolerance")]
    pub price_tolerance: f64,
    #[serde(default = "default_true")]
    pub parallel: bool,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_name_threshold() -> u8 {
    85
}

fn default_max_candidates() -> usize {
    5
}

fn default_tolerance() -> f64 {
    0.01
}

fn default_true() -> bool {
    true
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            name_threshold: default_name_threshold(),
            max_candidates: default_max_candidates(),
            size_tolerance: default_tolerance(),
            price_tolerance: default_tolerance(),
            parallel: true,
            timeout_secs: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Cost
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CostConfig {
    /// Any recipe costing more than this is flagged.
    #[serde(default = "default_absolute_threshold")]
    pub absolute_threshold: f64,
    /// Recipes above mean + k·σ are flagged.
    #[serde(default = "default_std_multiplier")]
    pub std_multiplier: f64,
}

fn default_absolute_threshold() -> f64 {
    500.0
}

fn default_std_multiplier() -> f64 {
    3.0
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            absolute_threshold: default_absolute_threshold(),
            std_multiplier: default_std_multiplier(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl AuditConfig {
    pub fn from_toml(input: &str) -> Result<Self, AuditError> {
        let mut config: AuditConfig =
            toml::from_str(input).map_err(|e| AuditError::ConfigParse(e.to_string()))?;
        config.normalize_tokens();
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, AuditError> {
        toml::to_string_pretty(self).map_err(|e| AuditError::ConfigParse(e.to_string()))
    }

    /// Unit tokens are compared against normalized cells, so store them normalized.
    fn normalize_tokens(&mut self) {
        self.units.allowed = self
            .units
            .allowed
            .iter()
            .filter_map(|u| normalize_text(Some(u)))
            .collect();
        for map in [&mut self.magnitude.item_size, &mut self.magnitude.recipe_qty] {
            *map = std::mem::take(map)
                .into_iter()
                .filter_map(|(u, v)| normalize_text(Some(&u)).map(|u| (u, v)))
                .collect();
        }
    }

    pub fn validate(&self) -> Result<(), AuditError> {
        if self.units.allowed.is_empty() {
            return Err(AuditError::ConfigValidation(
                "units.allowed must list at least one unit".into(),
            ));
        }

        for (token, unit) in &self.units.extra {
            if !unit.scale.is_finite() || unit.scale <= 0.0 {
                return Err(AuditError::ConfigValidation(format!(
                    "units.extra.{token}: scale must be a positive number, got {}",
                    unit.scale
                )));
            }
        }

        for (section, map) in [
            ("magnitude.item_size", &self.magnitude.item_size),
            ("magnitude.recipe_qty", &self.magnitude.recipe_qty),
        ] {
            for (unit, limit) in map {
                if !limit.is_finite() || *limit <= 0.0 {
                    return Err(AuditError::ConfigValidation(format!(
                        "{section}.{unit}: limit must be a positive number, got {limit}"
                    )));
                }
            }
        }

        let dup = &self.duplicates;
        if dup.name_threshold > 100 {
            return Err(AuditError::ConfigValidation(format!(
                "duplicates.name_threshold must be between 0 and 100, got {}",
                dup.name_threshold
            )));
        }
        if dup.max_candidates == 0 {
            return Err(AuditError::ConfigValidation(
                "duplicates.max_candidates must be at least 1".into(),
            ));
        }
        for (field, tol) in [
            ("size_tolerance", dup.size_tolerance),
            ("price_tolerance", dup.price_tolerance),
        ] {
            if !(0.0..=1.0).contains(&tol) {
                return Err(AuditError::ConfigValidation(format!(
                    "duplicates.{field} must be between 0 and 1, got {tol}"
                )));
            }
        }
        if dup.timeout_secs == Some(0) {
            return Err(AuditError::ConfigValidation(
                "duplicates.timeout_secs must be at least 1 when set".into(),
            ));
        }

        if !self.cost.absolute_threshold.is_finite() || self.cost.absolute_threshold <= 0.0 {
            return Err(AuditError::ConfigValidation(format!(
                "cost.absolute_threshold must be a positive number, got {}",
                self.cost.absolute_threshold
            )));
        }
        if !self.cost.std_multiplier.is_finite() || self.cost.std_multiplier < 0.0 {
            return Err(AuditError::ConfigValidation(format!(
                "cost.std_multiplier must be zero or positive, got {}",
                self.cost.std_multiplier
            )));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
name = "Weekly menu audit"

[units]
allowed = ["g", "KG", "l", "ml", "ea", "lb"]

[units.extra.lb]
category = "weight"
scale = 453.592

[magnitude.item_size]
g = 5000.0
LB = 50.0

[duplicates]
name_threshold = 90
max_candidates = 3
size_tolerance = 0.02
parallel = false
timeout_secs = 10

[cost]
absolute_threshold = 250.0
"#;

    #[test]
    fn empty_config_uses_defaults() {
        let config = AuditConfig::from_toml("").unwrap();
        assert_eq!(config.name, "default");
        assert_eq!(config.units.allowed, vec!["g", "kg", "l", "ml", "ea"]);
        assert_eq!(config.magnitude.item_size["g"], 10000.0);
        assert_eq!(config.magnitude.recipe_qty["kg"], 20.0);
        assert_eq!(config.duplicates.name_threshold, 85);
        assert_eq!(config.duplicates.max_candidates, 5);
        assert!(config.duplicates.parallel);
        assert!(config.duplicates.timeout_secs.is_none());
        assert_eq!(config.cost.absolute_threshold, 500.0);
        assert_eq!(config.cost.std_multiplier, 3.0);
    }

    #[test]
    fn parse_full_config() {
        let config = AuditConfig::from_toml(FULL).unwrap();
        assert_eq!(config.name, "Weekly menu audit");
        assert!(config.units.is_allowed("kg"));
        assert!(config.units.is_allowed("lb"));
        assert_eq!(config.magnitude.item_size["lb"], 50.0);
        // Replaced map: only the listed units remain.
        assert!(!config.magnitude.item_size.contains_key("kg"));
        // Untouched section keeps its defaults.
        assert_eq!(config.magnitude.recipe_qty["ea"], 200.0);
        assert_eq!(config.duplicates.name_threshold, 90);
        assert_eq!(config.duplicates.price_tolerance, 0.01);
        assert!(!config.duplicates.parallel);
        assert_eq!(config.duplicates.timeout_secs, Some(10));
        assert_eq!(config.cost.absolute_threshold, 250.0);

        let table = config.units.table();
        assert_eq!(table.classify(Some("lb")).category(), Some(UnitCategory::Weight));
    }

    #[test]
    fn defaults_round_trip_through_toml() {
        let text = AuditConfig::default().to_toml().unwrap();
        let parsed = AuditConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.units.allowed, AuditConfig::default().units.allowed);
        assert_eq!(parsed.magnitude.item_size, AuditConfig::default().magnitude.item_size);
    }

    #[test]
    fn reject_unknown_field() {
        let err = AuditConfig::from_toml("[duplicates]\nthreshold = 80\n").unwrap_err();
        assert!(matches!(err, AuditError::ConfigParse(_)));
    }

    #[test]
    fn reject_threshold_over_100() {
        let err = AuditConfig::from_toml("[duplicates]\nname_threshold = 101\n").unwrap_err();
        assert!(err.to_string().contains("name_threshold"));
    }

    #[test]
    fn reject_empty_allowed_units() {
        let err = AuditConfig::from_toml("[units]\nallowed = [\" \"]\n").unwrap_err();
        assert!(err.to_string().contains("units.allowed"));
    }

    #[test]
    fn reject_zero_extra_scale() {
        let input = "[units.extra.pinch]\ncategory = \"weight\"\nscale = 0.0\n";
        let err = AuditConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("units.extra.pinch"));
    }

    #[test]
    fn reject_tolerance_out_of_range() {
        let err = AuditConfig::from_toml("[duplicates]\nsize_tolerance = 1.5\n").unwrap_err();
        assert!(err.to_string().contains("size_tolerance"));
    }

    #[test]
    fn reject_invalid_category() {
        let input = "[units.extra.cup]\ncategory = \"length\"\nscale = 240.0\n";
        assert!(AuditConfig::from_toml(input).is_err());
    }
}
