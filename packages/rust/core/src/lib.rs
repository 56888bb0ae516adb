//! Core pipeline stages and orchestration for Cinelayer.
//!
//! The three stages each read one snapshot and write the next:
//! [`intake`] (origin → bronze), [`refine`] (bronze → silver) and
//! [`derive`] (silver → gold). [`pipeline`] sequences them and writes the
//! run manifest.

pub mod aggregate;
pub mod derive;
pub mod impute;
pub mod intake;
pub mod pipeline;
pub mod refine;
pub mod report;
pub mod schema;

pub use aggregate::{LanguageStats, ReportingViews, TopEntry, VoteTotal, YearStats};
pub use derive::{DeriveReport, LOGGED_YEARS, PopularityBand, RatingBand};
pub use impute::{ConstantImputer, Imputer, MeanImputer, MedianImputer};
pub use intake::IntakeReport;
pub use pipeline::{
    PipelineReport, ProgressReporter, SilentProgress, StageOutcome, run_pipeline, run_stage,
};
pub use refine::{RefineReport, RepairSummary};
pub use report::StageReport;
