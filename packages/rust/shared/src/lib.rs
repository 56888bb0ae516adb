//! Shared types, error model, and configuration for Cinelayer.
//!
//! This crate is the foundation depended on by all other Cinelayer crates.
//! It provides:
//! - [`CinelayerError`]: the unified error type
//! - The table model ([`Frame`], a polars dataframe, and [`ColumnKind`])
//! - Run types ([`RunId`], [`Stage`], [`RunManifest`], [`ArtifactMeta`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)

pub mod config;
pub mod error;
pub mod frame;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DeriveConfig, ImputationKind, PathsConfig, PipelineConfig, RangeRule,
    RefineConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{CinelayerError, Result};
pub use frame::{
    ColumnKind, DATE_FORMAT, Frame, date_to_days, days_to_date, render_float, render_value,
};
pub use types::{
    ArtifactMeta, CURRENT_SCHEMA_VERSION, RunId, RunManifest, Stage, StageRecord,
};
