//! Core domain types for pipeline runs and their manifests.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current schema version for the run manifest format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for pipeline run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// The three pipeline layers, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Raw source → normalized text snapshot (bronze).
    Intake,
    /// Bronze → cleaned, validated snapshot (silver).
    Refine,
    /// Silver → enriched dataset (gold).
    Derive,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Intake, Stage::Refine, Stage::Derive];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Intake => "intake",
            Stage::Refine => "refine",
            Stage::Derive => "derive",
        }
    }

    /// Conventional medallion layer name of the stage's output.
    pub fn layer(self) -> &'static str {
        match self {
            Stage::Intake => "bronze",
            Stage::Refine => "silver",
            Stage::Derive => "gold",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Artifacts & manifest
// ---------------------------------------------------------------------------

/// Facts about a snapshot file written by a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    /// Where the snapshot was written.
    pub path: PathBuf,
    /// SHA-256 of the encoded bytes (lowercase hex).
    pub sha256: String,
    /// Encoded size.
    pub size_bytes: usize,
    pub rows: usize,
    pub columns: usize,
}

/// One stage's entry in the run manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    #[serde(flatten)]
    pub artifact: ArtifactMeta,
}

/// The `run_manifest.json` written after a full pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    pub run_id: RunId,
    /// Tool version that produced the run.
    pub tool_version: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Date the recency flag was computed against.
    pub reference_date: NaiveDate,
    pub stages: Vec<StageRecord>,
}
