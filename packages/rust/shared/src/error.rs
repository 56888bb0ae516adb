//! Error types for Cinelayer.
//!
//! Library crates use [`CinelayerError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum CinelayerError {
    /// A required input artifact does not exist.
    #[error("missing input: {}", .path.display())]
    MissingInput { path: PathBuf },

    /// The input parsed cleanly but holds no data rows.
    #[error("empty dataset: {} has no rows", .path.display())]
    EmptyDataset { path: PathBuf },

    /// Delimited text could not be read at all.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Structural problem with a frame or snapshot.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A dataframe operation failed.
    #[error("frame error: {0}")]
    Frame(#[from] polars::prelude::PolarsError),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CinelayerError>;

impl CinelayerError {
    /// A required artifact was not found at `path`.
    pub fn missing_input(path: impl Into<PathBuf>) -> Self {
        Self::MissingInput { path: path.into() }
    }

    /// The table at `path` parsed to zero rows.
    pub fn empty_dataset(path: impl Into<PathBuf>) -> Self {
        Self::EmptyDataset { path: path.into() }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
