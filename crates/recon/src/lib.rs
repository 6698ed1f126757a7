//! `larder-recon`: item catalog / recipe cross-validation engine.
//!
//! Pure engine crate: receives already-parsed datasets, returns annotated
//! tables, a missing-ingredient report and run counters. No filesystem or
//! console access.

pub mod catalog;
pub mod config;
pub mod cost;
pub mod dataset;
pub mod duplicates;
pub mod engine;
pub mod error;
pub mod model;
pub mod normalize;
pub mod reconcile;
pub mod summary;
pub mod units;
pub mod validate;

pub use config::AuditConfig;
pub use dataset::{missing_report_to_csv, Dataset};
pub use duplicates::{DuplicateFinder, PairwiseScan};
pub use engine::{run, run_with_finder};
pub use error::AuditError;
pub use model::{AnnotatedTable, AuditResult, AuditSummary, MissingIngredientEntry};
