//! Shared types, error model, and configuration for MetricCli.
//!
//! This crate is the foundation depended on by all other MetricCli crates.
//! It provides:
//! - [`MetricCliError`]: the unified error type
//! - [`RunStatus`]: the exit-code taxonomy
//! - Domain types ([`Accumulator`], [`MetricsRecord`], [`SearchResults`], [`RunId`])
//! - Configuration ([`TrackerConfig`], [`RequirementsConfig`], [`UploadConfig`], settings loading)

pub mod config;
pub mod error;
pub mod status;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppSettings, RequirementsConfig, ToolsConfig, TrackerConfig, UploadConfig, UploadProfile,
    load_settings, load_settings_from, settings_dir, settings_file_path,
};
pub use error::{MetricCliError, Result};
pub use status::RunStatus;
pub use types::{Accumulator, DATE_KEY, MetricValue, MetricsRecord, RunId, SearchResults};
