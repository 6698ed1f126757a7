//! `larder audit`: cross-validate an item catalog against recipe sheets.

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::Subcommand;
use tracing::{debug, info};

use larder_recon::{missing_report_to_csv, AuditConfig, AuditResult, Dataset};

use crate::exit_codes::{EXIT_ERROR, EXIT_INVALID_CONFIG, EXIT_ISSUES_FOUND};
use crate::CliError;

const ITEMS_OUT: &str = "items_with_validation_flags.csv";
const RECIPES_OUT: &str = "recipes_with_validation_flags.csv";
const MISSING_OUT: &str = "missing_ingredients_report.csv";

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Validate items and recipes, write annotated CSVs
    #[command(after_help = "\
Examples:
  larder audit run --items items.csv --recipes recipes.csv
  larder audit run --items items.csv --recipes recipes.csv --out reports/
  larder audit run --items items.csv --recipes recipes.csv --config audit.toml --json
  larder audit run --items items.csv --recipes recipes.csv --strict")]
    Run {
        /// Item catalog CSV
        #[arg(long)]
        items: PathBuf,

        /// Recipe CSV with `Name/Qty/Unit (Ingredient i)` columns
        #[arg(long)]
        recipes: PathBuf,

        /// Directory for the annotated CSVs (created if absent)
        #[arg(long, default_value = "output")]
        out: PathBuf,

        /// Audit config TOML (defaults apply when omitted)
        #[arg(long, env = "LARDER_CONFIG")]
        config: Option<PathBuf>,

        /// Print the full result as JSON to stdout
        #[arg(long)]
        json: bool,

        /// Exit 6 when any row was flagged
        #[arg(long)]
        strict: bool,
    },

    /// Validate an audit config without running
    #[command(after_help = "\
Examples:
  larder audit validate-config audit.toml")]
    ValidateConfig {
        /// Path to the config TOML
        config: PathBuf,
    },

    /// Print the default config as TOML
    Defaults,
}

pub fn cmd_audit(cmd: AuditCommands) -> Result<(), CliError> {
    match cmd {
        AuditCommands::Run { items, recipes, out, config, json, strict } => {
            cmd_audit_run(&items, &recipes, &out, config.as_deref(), json, strict)
        }
        AuditCommands::ValidateConfig { config } => cmd_audit_validate_config(&config),
        AuditCommands::Defaults => cmd_audit_defaults(),
    }
}

fn cmd_audit_run(
    items_path: &Path,
    recipes_path: &Path,
    out_dir: &Path,
    config_path: Option<&Path>,
    json_output: bool,
    strict: bool,
) -> Result<(), CliError> {
    let config = resolve_config(config_path)?;

    let items = load_dataset("items", items_path)?;
    let recipes = load_dataset("recipes", recipes_path)?;
    info!(items = items.len(), recipes = recipes.len(), "datasets loaded");

    let result = larder_recon::run(&config, &items, &recipes)?;

    write_outputs(&result, out_dir)?;

    if json_output {
        let json_str = serde_json::to_string_pretty(&result)
            .map_err(|e| CliError::new(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    }

    print_summary(&result, out_dir);

    if strict && result.summary.has_issues() {
        return Err(CliError::new(EXIT_ISSUES_FOUND, "issues found (--strict)"));
    }
    Ok(())
}

fn cmd_audit_validate_config(path: &Path) -> Result<(), CliError> {
    let config = load_config(path)?;
    eprintln!("config OK: {} ({})", path.display(), config.name);
    Ok(())
}

fn cmd_audit_defaults() -> Result<(), CliError> {
    let toml = AuditConfig::default().to_toml()?;
    print!("{toml}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// `--config` / `LARDER_CONFIG`, then the user config dir, then defaults.
fn resolve_config(explicit: Option<&Path>) -> Result<AuditConfig, CliError> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    if let Some(path) = user_config_path().filter(|p| p.is_file()) {
        debug!(path = %path.display(), "using user config");
        return load_config(&path);
    }
    Ok(AuditConfig::default())
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("larder").join("larder.toml"))
}

fn load_config(path: &Path) -> Result<AuditConfig, CliError> {
    let config_str = std::fs::read_to_string(path)
        .map_err(|e| CliError::io(format!("cannot read config {}: {e}", path.display())))?;
    AuditConfig::from_toml(&config_str).map_err(|e| {
        CliError::new(EXIT_INVALID_CONFIG, format!("{}: {e}", path.display()))
            .with_hint("run `larder audit defaults` for a complete example")
    })
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Read a file as UTF-8, falling back to Windows-1252 (common for Excel exports).
fn read_file_as_utf8(path: &Path) -> Result<String, CliError> {
    let mut file = std::fs::File::open(path)
        .map_err(|e| CliError::io(format!("cannot read {}: {e}", path.display())))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| CliError::io(format!("cannot read {}: {e}", path.display())))?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            debug!(path = %path.display(), "not UTF-8, decoding as Windows-1252");
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(e.as_bytes());
            Ok(decoded.into_owned())
        }
    }
}

fn load_dataset(name: &str, path: &Path) -> Result<Dataset, CliError> {
    let data = read_file_as_utf8(path)?;
    Ok(Dataset::from_csv_str(name, &data)?)
}

fn write_outputs(result: &AuditResult, out_dir: &Path) -> Result<(), CliError> {
    std::fs::create_dir_all(out_dir)
        .map_err(|e| CliError::io(format!("cannot create {}: {e}", out_dir.display())))?;

    let files = [
        (ITEMS_OUT, result.items.to_csv_string()?),
        (RECIPES_OUT, result.recipes.to_csv_string()?),
        (MISSING_OUT, missing_report_to_csv(&result.missing_ingredients)?),
    ];
    for (name, contents) in files {
        let path = out_dir.join(name);
        std::fs::write(&path, contents)
            .map_err(|e| CliError::io(format!("cannot write {}: {e}", path.display())))?;
        info!(path = %path.display(), "wrote");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Human summary (stderr)
// ---------------------------------------------------------------------------

fn print_summary(result: &AuditResult, out_dir: &Path) {
    let s = &result.summary;
    eprintln!(
        "items: {} rows, {} with issues ({} missing data, {} invalid fields, {} invalid UOM, {} oversized), {} with potential duplicates",
        s.item_rows,
        s.items_with_issues,
        s.items_missing_data,
        s.item_fields_invalid,
        s.items_invalid_unit,
        s.items_too_large,
        s.items_with_duplicates,
    );
    eprintln!(
        "recipes: {} rows, {} costed, {} potentially high cost",
        s.recipe_rows, s.recipes_costed, s.recipes_high_cost,
    );
    eprintln!(
        "ingredients: {} missing references in {} recipes, {} non-numeric qty, {} invalid UOM, {} UOM mismatches, {} oversized qty",
        s.missing_ingredient_refs,
        s.recipes_with_missing,
        s.quantities_non_numeric,
        s.units_invalid,
        s.units_mismatched,
        s.quantities_too_large,
    );
    if s.ambiguous_item_names > 0 {
        eprintln!("note: {} item names appear more than once; lookups use the first", s.ambiguous_item_names);
    }

    // Group by recipe, in first-seen order.
    let mut grouped: Vec<(&str, Vec<&str>)> = Vec::new();
    for entry in &result.missing_ingredients {
        match grouped.iter_mut().find(|(recipe, _)| *recipe == entry.recipe_name) {
            Some((_, names)) => names.push(entry.ingredient_name.as_str()),
            None => grouped.push((entry.recipe_name.as_str(), vec![entry.ingredient_name.as_str()])),
        }
    }
    if !grouped.is_empty() {
        eprintln!("missing ingredients:");
        for (recipe, names) in &grouped {
            eprintln!("  {recipe}: {}", names.join(", "));
        }
    }

    if !result.warnings.is_empty() {
        eprintln!("{} warning(s)", result.warnings.len());
    }
    eprintln!("wrote {}", out_dir.display());
}
