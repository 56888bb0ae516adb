//! Application configuration for Cinelayer.
//!
//! User config lives at `~/.cinelayer/cinelayer.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CinelayerError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "cinelayer.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".cinelayer";

// ---------------------------------------------------------------------------
// Config structs (matching cinelayer.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Artifact locations for each layer.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Cleaning policy for the silver layer.
    #[serde(default)]
    pub refine: RefineConfig,

    /// Feature and reporting policy for the gold layer.
    #[serde(default)]
    pub derive: DeriveConfig,
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Raw source table.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Normalized (bronze) snapshot.
    #[serde(default = "default_bronze")]
    pub bronze: String,

    /// Cleaned (silver) snapshot.
    #[serde(default = "default_silver")]
    pub silver: String,

    /// Enriched (gold) dataset.
    #[serde(default = "default_gold")]
    pub gold: String,

    /// Run manifest written after a full pipeline run.
    #[serde(default = "default_manifest")]
    pub manifest: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            bronze: default_bronze(),
            silver: default_silver(),
            gold: default_gold(),
            manifest: default_manifest(),
        }
    }
}

fn default_origin() -> String {
    "data/origin/latest_2025_movies.csv".into()
}
fn default_bronze() -> String {
    "data/bronze/bronze_data.csv".into()
}
fn default_silver() -> String {
    "data/silver/silver_data.csv".into()
}
fn default_gold() -> String {
    "data/gold/gold_data.csv".into()
}
fn default_manifest() -> String {
    "data/gold/run_manifest.json".into()
}

/// How missing numeric cells are filled during refinement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImputationKind {
    #[default]
    Mean,
    Median,
    Constant,
}

impl std::fmt::Display for ImputationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Mean => "mean",
            Self::Median => "median",
            Self::Constant => "constant",
        };
        f.write_str(name)
    }
}

/// An inclusive bound on a numeric column. Rows outside it are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeRule {
    pub column: String,
    pub min: f64,
    pub max: f64,
}

/// `[refine]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineConfig {
    /// Numeric fill strategy: "mean", "median" or "constant".
    #[serde(default)]
    pub imputation: ImputationKind,

    /// Fill value used when `imputation = "constant"`.
    #[serde(default)]
    pub constant_fill: f64,

    /// Placeholder written into missing text cells.
    #[serde(default = "default_text_placeholder")]
    pub text_placeholder: String,

    /// Columns coerced to numbers regardless of what inference sees.
    #[serde(default = "default_numeric_columns")]
    pub numeric_columns: Vec<String>,

    /// Column holding the release date.
    #[serde(default = "default_date_column")]
    pub date_column: String,

    /// Range checks applied after imputation.
    #[serde(default = "default_ranges")]
    pub ranges: Vec<RangeRule>,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            imputation: ImputationKind::default(),
            constant_fill: 0.0,
            text_placeholder: default_text_placeholder(),
            numeric_columns: default_numeric_columns(),
            date_column: default_date_column(),
            ranges: default_ranges(),
        }
    }
}

fn default_text_placeholder() -> String {
    "Desconocido".into()
}
fn default_numeric_columns() -> Vec<String> {
    vec![
        "vote_average".into(),
        "vote_count".into(),
        "popularity".into(),
    ]
}
fn default_date_column() -> String {
    "release_date".into()
}
fn default_ranges() -> Vec<RangeRule> {
    vec![RangeRule {
        column: "vote_average".into(),
        min: 0.0,
        max: 10.0,
    }]
}

/// `[derive]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeriveConfig {
    /// A title counts as recent when released within this many years of the reference date.
    #[serde(default = "default_recent_window")]
    pub recent_window_years: i32,

    /// Length of the rating leaderboard.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for DeriveConfig {
    fn default() -> Self {
        Self {
            recent_window_years: default_recent_window(),
            top_n: default_top_n(),
        }
    }
}

fn default_recent_window() -> i32 {
    5
}
fn default_top_n() -> usize {
    10
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration passed explicitly into every stage.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub origin_path: PathBuf,
    pub bronze_path: PathBuf,
    pub silver_path: PathBuf,
    pub gold_path: PathBuf,
    pub manifest_path: PathBuf,
    pub refine: RefineConfig,
    pub derive: DeriveConfig,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            origin_path: PathBuf::from(&config.paths.origin),
            bronze_path: PathBuf::from(&config.paths.bronze),
            silver_path: PathBuf::from(&config.paths.silver),
            gold_path: PathBuf::from(&config.paths.gold),
            manifest_path: PathBuf::from(&config.paths.manifest),
            refine: config.refine.clone(),
            derive: config.derive.clone(),
        }
    }
}

impl PipelineConfig {
    /// Lay out all artifacts under a single root, keeping the default file names.
    ///
    /// Used by tests and by callers that want an isolated working directory.
    pub fn rooted_at(root: &Path, origin: impl Into<PathBuf>) -> Self {
        Self {
            origin_path: origin.into(),
            bronze_path: root.join("bronze").join("bronze_data.csv"),
            silver_path: root.join("silver").join("silver_data.csv"),
            gold_path: root.join("gold").join("gold_data.csv"),
            manifest_path: root.join("gold").join("run_manifest.json"),
            refine: RefineConfig::default(),
            derive: DeriveConfig::default(),
        }
    }

    /// Reject settings no stage can honor.
    pub fn validate(&self) -> Result<()> {
        for rule in &self.refine.ranges {
            if rule.min.is_nan() || rule.max.is_nan() || rule.min > rule.max {
                return Err(CinelayerError::config(format!(
                    "range for '{}' is empty: [{}, {}]",
                    rule.column, rule.min, rule.max
                )));
            }
        }
        if !self.refine.constant_fill.is_finite() {
            return Err(CinelayerError::config("refine.constant_fill must be a finite number"));
        }
        if self.refine.date_column.trim().is_empty() {
            return Err(CinelayerError::config("refine.date_column must not be empty"));
        }
        if self.derive.top_n == 0 {
            return Err(CinelayerError::config("derive.top_n must be positive"));
        }
        if self.derive.recent_window_years < 0 {
            return Err(CinelayerError::config(
                "derive.recent_window_years must not be negative",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.cinelayer/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CinelayerError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.cinelayer/cinelayer.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CinelayerError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        CinelayerError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CinelayerError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CinelayerError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CinelayerError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("bronze_data.csv"));
        assert!(toml_str.contains("Desconocido"));
        assert!(toml_str.contains("imputation = \"mean\""));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.derive.top_n, 10);
        assert_eq!(parsed.refine.ranges.len(), 1);
        assert_eq!(parsed.refine.ranges[0].column, "vote_average");
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let toml_str = r#"
[paths]
origin = "/srv/raw/movies.csv"

[refine]
imputation = "median"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.paths.origin, "/srv/raw/movies.csv");
        assert_eq!(config.paths.gold, "data/gold/gold_data.csv");
        assert_eq!(config.refine.imputation, ImputationKind::Median);
        assert_eq!(config.refine.text_placeholder, "Desconocido");
        assert_eq!(config.derive.recent_window_years, 5);
    }

    #[test]
    fn unknown_imputation_is_rejected() {
        let toml_str = "[refine]\nimputation = \"knn\"\n";
        assert!(toml::from_str::<AppConfig>(toml_str).is_err());
    }

    #[test]
    fn pipeline_config_from_app_config() {
        let app = AppConfig::default();
        let pipeline = PipelineConfig::from(&app);
        assert_eq!(pipeline.silver_path, PathBuf::from("data/silver/silver_data.csv"));
        assert_eq!(pipeline.refine.numeric_columns.len(), 3);
        assert!(pipeline.validate().is_ok());
    }

    #[test]
    fn validate_rejects_inverted_range() {
        let mut pipeline = PipelineConfig::from(&AppConfig::default());
        pipeline.refine.ranges[0].min = 11.0;
        let err = pipeline.validate().unwrap_err();
        assert!(err.to_string().contains("vote_average"));
    }

    #[test]
    fn validate_rejects_infinite_constant_fill() {
        let app: AppConfig = toml::from_str("[refine]\nimputation = \"constant\"\nconstant_fill = inf\n").unwrap();
        let err = PipelineConfig::from(&app).validate().unwrap_err();
        assert!(err.to_string().contains("constant_fill"));
    }

    #[test]
    fn validate_rejects_zero_top_n() {
        let mut pipeline = PipelineConfig::rooted_at(Path::new("/tmp/x"), "/tmp/x/raw.csv");
        pipeline.derive.top_n = 0;
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn load_config_from_file() {
        let dir = std::env::temp_dir().join(format!("cl-config-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cinelayer.toml");
        std::fs::write(&path, "[derive]\ntop_n = 3\n").unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.derive.top_n, 3);

        std::fs::write(&path, "[derive\n").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
