//! Intake (bronze): raw source → normalized text snapshot.
//!
//! Every field is kept as text and trimmed, so downstream stages never see
//! mixed types in one column until the refiner restores them.

use std::time::Instant;

use polars::prelude::Column;
use tracing::{error, info, instrument};

use cinelayer_shared::{CinelayerError, Frame, PipelineConfig, Result, Stage};

use crate::report::{self, StageReport};

/// Result of the intake stage.
#[derive(Debug, Clone)]
pub struct IntakeReport {
    pub report: StageReport,
    /// Source records that could not be aligned with the header.
    pub skipped_rows: usize,
}

/// Read `config.origin_path`, normalize it, and write `config.bronze_path`.
#[instrument(skip_all, fields(source = %config.origin_path.display()))]
pub fn run(config: &PipelineConfig) -> Result<IntakeReport> {
    run_inner(config).inspect_err(|e| error!(stage = %Stage::Intake, error = %e, "stage failed"))
}

fn run_inner(config: &PipelineConfig) -> Result<IntakeReport> {
    let started = Instant::now();
    let source = &config.origin_path;

    info!(path = %source.display(), "reading raw source");
    let snapshot = cinelayer_storage::read_snapshot(source)?;
    if snapshot.frame.row_count() == 0 {
        return Err(CinelayerError::empty_dataset(source));
    }

    let rows_in = snapshot.frame.row_count();
    let frame = normalize(snapshot.frame)?;

    report::log_profile(Stage::Intake, "normalized", &frame);
    report::log_preview(Stage::Intake, &frame);

    let artifact = cinelayer_storage::write_snapshot(&config.bronze_path, &frame)?;
    info!(
        path = %artifact.path.display(),
        rows = artifact.rows,
        columns = artifact.columns,
        skipped_rows = snapshot.skipped_rows,
        "bronze snapshot written"
    );

    Ok(IntakeReport {
        report: StageReport::new(Stage::Intake, rows_in, &frame, artifact, started)?,
        skipped_rows: snapshot.skipped_rows,
    })
}

/// Coerce every cell to trimmed text. Blank cells become nulls.
pub fn normalize(frame: Frame) -> Result<Frame> {
    let mut columns = Vec::with_capacity(frame.column_count());
    for name in frame.column_names() {
        let values: Vec<Option<String>> = frame
            .rendered(name)?
            .into_iter()
            .map(|v| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
            .collect();
        columns.push(Column::new(name.into(), values));
    }
    Frame::new(columns)
}
