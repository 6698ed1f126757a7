//! CLI Exit Code Registry
//!
//! Single source of truth for `larder` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | Success                                                   |
//! | 1    | General error (unspecified)                               |
//! | 2    | CLI usage error (bad args)                                |
//! | 3    | Config could not be parsed or failed validation           |
//! | 4    | Input dataset is structurally unusable                    |
//! | 5    | File could not be read or written                         |
//! | 6    | Audit flagged issues and `--strict` was given             |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `audit_exit_code` or the command's error handling

use larder_recon::AuditError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Config TOML failed to parse or validate.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Empty dataset, missing `Item name` column, no ingredient slots,
/// or undecodable CSV.
pub const EXIT_STRUCTURAL: u8 = 4;

/// Cannot read an input file or write an output file.
pub const EXIT_IO: u8 = 5;

/// `--strict` run where at least one row was flagged.
pub const EXIT_ISSUES_FOUND: u8 = 6;

/// Map an engine error to its exit code.
pub fn audit_exit_code(err: &AuditError) -> u8 {
    match err {
        AuditError::ConfigParse(_) | AuditError::ConfigValidation(_) => EXIT_INVALID_CONFIG,
        AuditError::Csv { .. } => EXIT_STRUCTURAL,
        e if e.is_structural() => EXIT_STRUCTURAL,
        _ => EXIT_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_codes() {
        assert_eq!(audit_exit_code(&AuditError::ConfigParse("x".into())), EXIT_INVALID_CONFIG);
        assert_eq!(
            audit_exit_code(&AuditError::EmptyDataset { dataset: "items".into() }),
            EXIT_STRUCTURAL
        );
        assert_eq!(
            audit_exit_code(&AuditError::NoIngredientColumns { dataset: "recipes".into() }),
            EXIT_STRUCTURAL
        );
        assert_eq!(
            audit_exit_code(&AuditError::DuplicateScanTimeout { elapsed_ms: 10 }),
            EXIT_ERROR
        );
    }
}
