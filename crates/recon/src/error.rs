use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),
    /// Config validation error (bad threshold, empty unit list, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),
    /// A column the run cannot proceed without is absent.
    #[error("dataset '{dataset}': missing column '{column}'")]
    MissingColumn { dataset: String, column: String },
    /// Recipes dataset has no `Name (Ingredient i)` columns at all.
    #[error("dataset '{dataset}': no ingredient name columns found (e.g. 'Name (Ingredient 1)')")]
    NoIngredientColumns { dataset: String },
    /// Dataset has a header row but no data rows.
    #[error("dataset '{dataset}' is empty")]
    EmptyDataset { dataset: String },
    /// CSV decode error.
    #[error("dataset '{dataset}': {message}")]
    Csv { dataset: String, message: String },
    /// Duplicate scan exceeded its configured deadline.
    #[error("duplicate scan timed out after {elapsed_ms} ms")]
    DuplicateScanTimeout { elapsed_ms: u64 },
}

impl AuditError {
    /// Structural errors halt the run before any row is processed.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::MissingColumn { .. } | Self::NoIngredientColumns { .. } | Self::EmptyDataset { .. }
        )
    }
}
