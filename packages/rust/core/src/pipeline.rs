//! End-to-end run: origin → intake (bronze) → refine (silver) → derive (gold) → manifest.

use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};
use tracing::{info, instrument};

use cinelayer_shared::{
    CURRENT_SCHEMA_VERSION, CinelayerError, PipelineConfig, Result, RunId, RunManifest, Stage,
    StageRecord,
};

use crate::derive::{self, DeriveReport};
use crate::intake::{self, IntakeReport};
use crate::refine::{self, RefineReport};
use crate::report::StageReport;

/// Version recorded in run manifests.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result of a full pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub run_id: RunId,
    pub intake: IntakeReport,
    pub refine: RefineReport,
    pub derive: DeriveReport,
    pub manifest: RunManifest,
    pub elapsed: Duration,
}

impl PipelineReport {
    /// The three stage reports in execution order.
    pub fn stages(&self) -> [&StageReport; 3] {
        [&self.intake.report, &self.refine.report, &self.derive.report]
    }
}

/// Outcome of running one stage on its own.
#[derive(Debug, Clone)]
pub enum StageOutcome {
    Intake(IntakeReport),
    Refine(RefineReport),
    Derive(DeriveReport),
}

impl StageOutcome {
    pub fn report(&self) -> &StageReport {
        match self {
            Self::Intake(r) => &r.report,
            Self::Refine(r) => &r.report,
            Self::Derive(r) => &r.report,
        }
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a stage starts.
    fn phase(&self, stage: Stage);
    /// Called when a stage has written its artifact.
    fn stage_done(&self, report: &StageReport);
    /// Called when the pipeline completes.
    fn done(&self, report: &PipelineReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _stage: Stage) {}
    fn stage_done(&self, _report: &StageReport) {}
    fn done(&self, _report: &PipelineReport) {}
}

/// Run all three stages in order, stopping at the first failure, then
/// write the run manifest.
#[instrument(skip_all, fields(origin = %config.origin_path.display(), reference_date = %reference_date))]
pub fn run_pipeline(
    config: &PipelineConfig,
    reference_date: NaiveDate,
    progress: &dyn ProgressReporter,
) -> Result<PipelineReport> {
    config.validate()?;

    let start = Instant::now();
    let started_at = Utc::now();
    let run_id = RunId::new();
    info!(%run_id, "starting pipeline");

    progress.phase(Stage::Intake);
    let intake = intake::run(config)?;
    progress.stage_done(&intake.report);

    progress.phase(Stage::Refine);
    let refine = refine::run(config)?;
    progress.stage_done(&refine.report);

    progress.phase(Stage::Derive);
    let derive = derive::run(config, reference_date)?;
    progress.stage_done(&derive.report);

    let manifest = RunManifest {
        schema_version: CURRENT_SCHEMA_VERSION,
        run_id: run_id.clone(),
        tool_version: TOOL_VERSION.to_string(),
        started_at,
        completed_at: Utc::now(),
        reference_date,
        stages: [&intake.report, &refine.report, &derive.report]
            .into_iter()
            .map(|r| StageRecord {
                stage: r.stage,
                artifact: r.artifact.clone(),
            })
            .collect(),
    };
    write_manifest(config, &manifest)?;

    let report = PipelineReport {
        run_id,
        intake,
        refine,
        derive,
        manifest,
        elapsed: start.elapsed(),
    };

    info!(
        run_id = %report.run_id,
        rows = report.derive.report.rows_out(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "pipeline complete"
    );
    progress.done(&report);
    Ok(report)
}

/// Run a single stage against whatever artifacts are already on disk.
pub fn run_stage(
    stage: Stage,
    config: &PipelineConfig,
    reference_date: NaiveDate,
) -> Result<StageOutcome> {
    config.validate()?;
    match stage {
        Stage::Intake => intake::run(config).map(StageOutcome::Intake),
        Stage::Refine => refine::run(config).map(StageOutcome::Refine),
        Stage::Derive => derive::run(config, reference_date).map(StageOutcome::Derive),
    }
}

fn write_manifest(config: &PipelineConfig, manifest: &RunManifest) -> Result<()> {
    let json = serde_json::to_string_pretty(manifest)
        .map_err(|e| CinelayerError::validation(format!("failed to serialize manifest: {e}")))?;
    cinelayer_storage::write_atomic(&config.manifest_path, json.as_bytes())?;
    info!(path = %config.manifest_path.display(), "run manifest written");
    Ok(())
}
