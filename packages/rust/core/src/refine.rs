//! Refine (silver): bronze snapshot → typed, repaired, validated snapshot.
//!
//! Order matters: numbers and dates are coerced before deduplication so
//! that `"7"` and `"7.0"` compare equal, imputation runs before range
//! checks so filled values are validated too.

use std::time::Instant;

use polars::prelude::*;
use tracing::{debug, error, info, instrument, warn};

use cinelayer_shared::{
    CinelayerError, ColumnKind, Frame, PipelineConfig, RangeRule, RefineConfig, Result, Stage,
};

use crate::impute::{self, Imputation};
use crate::report::{self, StageReport};
use crate::schema;

/// Result of the refine stage.
#[derive(Debug, Clone)]
pub struct RefineReport {
    pub report: StageReport,
    pub repairs: RepairSummary,
}

/// Counts of every repair applied to the data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepairSummary {
    /// Strategy name used for numeric fills.
    pub imputer: &'static str,
    pub nulls_before: Vec<(String, usize)>,
    pub dropped_columns: Vec<String>,
    pub malformed_numbers: usize,
    pub unparsed_dates: usize,
    pub duplicates_removed: usize,
    pub imputed: Vec<Imputation>,
    pub text_filled: usize,
    pub out_of_range_removed: usize,
}

/// Read `config.bronze_path`, clean it, and write `config.silver_path`.
#[instrument(skip_all, fields(source = %config.bronze_path.display()))]
pub fn run(config: &PipelineConfig) -> Result<RefineReport> {
    run_inner(config).inspect_err(|e| error!(stage = %Stage::Refine, error = %e, "stage failed"))
}

fn run_inner(config: &PipelineConfig) -> Result<RefineReport> {
    let started = Instant::now();
    let source = &config.bronze_path;

    let snapshot = cinelayer_storage::read_snapshot(source)?;
    if snapshot.frame.row_count() == 0 {
        return Err(CinelayerError::empty_dataset(source));
    }
    let rows_in = snapshot.frame.row_count();

    let mut frame = schema::type_frame(snapshot.frame)?;
    report::log_profile(Stage::Refine, "before", &frame);

    let repairs = refine_frame(&mut frame, &config.refine)?;

    report::log_profile(Stage::Refine, "after", &frame);
    report::log_preview(Stage::Refine, &frame);

    let artifact = cinelayer_storage::write_snapshot(&config.silver_path, &frame)?;
    info!(
        path = %artifact.path.display(),
        rows_in,
        rows_out = artifact.rows,
        duplicates = repairs.duplicates_removed,
        out_of_range = repairs.out_of_range_removed,
        "silver snapshot written"
    );

    Ok(RefineReport {
        report: StageReport::new(Stage::Refine, rows_in, &frame, artifact, started)?,
        repairs,
    })
}

/// Apply every cleaning step to a typed frame in place.
pub fn refine_frame(frame: &mut Frame, config: &RefineConfig) -> Result<RepairSummary> {
    let mut summary = RepairSummary {
        nulls_before: frame.null_counts(),
        ..RepairSummary::default()
    };

    // numeric coercion covers range-checked columns as well
    let mut numeric: Vec<&str> = config.numeric_columns.iter().map(String::as_str).collect();
    for rule in &config.ranges {
        if !numeric.contains(&rule.column.as_str()) {
            numeric.push(&rule.column);
        }
    }
    for name in numeric {
        if !frame.has_column(name) {
            warn!(column = name, "numeric column not present");
            continue;
        }
        let malformed = schema::coerce_numeric(frame, name)?;
        if malformed > 0 {
            warn!(column = name, malformed, "non-numeric values set to null");
        }
        summary.malformed_numbers += malformed;
    }

    let index_columns: Vec<String> = frame
        .column_names()
        .into_iter()
        .filter(|n| schema::is_index_column(n))
        .map(str::to_string)
        .collect();
    for name in &index_columns {
        frame.drop_column(name);
        info!(column = %name, "dropped positional index column");
    }
    summary.dropped_columns = index_columns;

    trim_text(frame)?;

    if frame.has_column(&config.date_column) {
        summary.unparsed_dates = schema::coerce_dates(frame, &config.date_column)?;
        if summary.unparsed_dates > 0 {
            warn!(
                column = %config.date_column,
                unparsed = summary.unparsed_dates,
                "unparseable dates set to null"
            );
        }
    } else {
        warn!(column = %config.date_column, "date column not present");
    }

    summary.duplicates_removed = drop_duplicates(frame)?;
    info!(removed = summary.duplicates_removed, "duplicate rows removed");

    let imputer = impute::imputer_for(config);
    summary.imputer = imputer.name();
    for (name, kind) in frame.schema() {
        if !kind.is_numeric() {
            continue;
        }
        match impute::impute_column(frame, &name, imputer.as_ref())? {
            Some(done) => {
                debug!(
                    column = %done.column,
                    filled = done.filled,
                    value = done.value,
                    strategy = imputer.name(),
                    "imputed numeric nulls"
                );
                summary.imputed.push(done);
            }
            None if frame.column(&name)?.null_count() > 0 => {
                warn!(column = %name, "no values to impute from; nulls kept");
            }
            None => {}
        }
    }

    summary.text_filled = fill_text(frame, &config.text_placeholder)?;

    for rule in &config.ranges {
        let removed = apply_range(frame, rule)?;
        if removed > 0 {
            info!(
                column = %rule.column,
                min = rule.min,
                max = rule.max,
                removed,
                "rows outside range dropped"
            );
        }
        summary.out_of_range_removed += removed;
    }

    Ok(summary)
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

fn trim_text(frame: &mut Frame) -> Result<()> {
    for (name, kind) in frame.schema() {
        if kind != ColumnKind::Text {
            continue;
        }
        let values = frame.rendered(&name)?;
        let trimmed: Vec<Option<&str>> = values
            .iter()
            .map(|v| v.as_deref().map(str::trim))
            .collect();
        frame.upsert_column(Column::new(name.as_str().into(), trimmed))?;
    }
    Ok(())
}

/// Drop rows identical across every column, keeping first occurrences in order.
fn drop_duplicates(frame: &mut Frame) -> Result<usize> {
    let before = frame.row_count();
    let unique = frame
        .df()
        .clone()
        .lazy()
        .unique_stable(None, UniqueKeepStrategy::First)
        .collect()?;
    *frame = Frame::from(unique);
    Ok(before - frame.row_count())
}

/// Replace nulls in text and boolean columns with `placeholder`. A boolean
/// column that needs filling becomes text. Returns cells filled.
fn fill_text(frame: &mut Frame, placeholder: &str) -> Result<usize> {
    let mut filled = 0;
    for (name, kind) in frame.schema() {
        if !matches!(kind, ColumnKind::Text | ColumnKind::Boolean) {
            continue;
        }
        let nulls = frame.column(&name)?.null_count();
        if nulls == 0 {
            continue;
        }
        let values: Vec<String> = frame
            .rendered(&name)?
            .into_iter()
            .map(|v| v.unwrap_or_else(|| placeholder.to_string()))
            .collect();
        frame.upsert_column(Column::new(name.as_str().into(), values))?;
        filled += nulls;
    }
    Ok(filled)
}

/// Drop rows whose value in `rule.column` is null or outside `[min, max]`.
fn apply_range(frame: &mut Frame, rule: &RangeRule) -> Result<usize> {
    if !frame.has_column(&rule.column) {
        return Ok(0);
    }
    let before = frame.row_count();
    let value = || col(rule.column.as_str());
    let kept = frame
        .df()
        .clone()
        .lazy()
        .filter(value().gt_eq(lit(rule.min)).and(value().lt_eq(lit(rule.max))))
        .collect()?;
    *frame = Frame::from(kept);
    Ok(before - frame.row_count())
}
