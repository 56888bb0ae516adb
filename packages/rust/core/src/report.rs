//! Per-stage run summaries and the diagnostics each stage logs.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use cinelayer_shared::{ArtifactMeta, ColumnKind, Frame, Result, Stage};

/// Rows shown in previews.
pub const PREVIEW_ROWS: usize = 5;

/// What a stage produced. Returned on success; its presence is the success sentinel.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: Stage,
    /// Rows in the stage's input.
    pub rows_in: usize,
    /// The artifact written.
    pub artifact: ArtifactMeta,
    /// Output schema in column order.
    pub schema: Vec<(String, ColumnKind)>,
    /// Null count per output column.
    pub null_counts: Vec<(String, usize)>,
    /// First rows of the output, rendered.
    pub preview: Vec<Vec<String>>,
    pub elapsed: Duration,
}

impl StageReport {
    pub(crate) fn new(
        stage: Stage,
        rows_in: usize,
        output: &Frame,
        artifact: ArtifactMeta,
        started: Instant,
    ) -> Result<Self> {
        Ok(Self {
            stage,
            rows_in,
            artifact,
            schema: output.schema(),
            null_counts: output.null_counts(),
            preview: output.head(PREVIEW_ROWS)?,
            elapsed: started.elapsed(),
        })
    }

    pub fn rows_out(&self) -> usize {
        self.artifact.rows
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.schema.iter().map(|(name, _)| name.as_str()).collect()
    }
}

/// Log shape and null counts of a frame at a named checkpoint.
pub(crate) fn log_profile(stage: Stage, checkpoint: &str, frame: &Frame) {
    let total_nulls: usize = frame.null_counts().iter().map(|(_, n)| n).sum();
    info!(
        %stage,
        checkpoint,
        rows = frame.row_count(),
        columns = frame.column_count(),
        nulls = total_nulls,
        "frame profile"
    );
    for (column, nulls) in frame.null_counts().into_iter().filter(|(_, n)| *n > 0) {
        debug!(%stage, checkpoint, column = %column, nulls, "null cells");
    }
}

/// Log the first rows of a frame at debug level.
pub(crate) fn log_preview(stage: Stage, frame: &Frame) {
    debug!(%stage, columns = ?frame.column_names(), "preview header");
    match frame.head(PREVIEW_ROWS) {
        Ok(rows) => {
            for (idx, row) in rows.into_iter().enumerate() {
                debug!(%stage, row = idx, values = ?row, "preview row");
            }
        }
        Err(e) => debug!(%stage, error = %e, "preview unavailable"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::Column;

    #[test]
    fn report_captures_output_shape() {
        let frame = Frame::new(vec![
            Column::new("title".into(), [Some("A"), None]),
            Column::new("vote_count".into(), [1i64, 2]),
        ])
        .unwrap();
        let artifact = ArtifactMeta {
            path: "out.csv".into(),
            sha256: "f".repeat(64),
            size_bytes: 10,
            rows: 2,
            columns: 2,
        };

        let report = StageReport::new(Stage::Refine, 3, &frame, artifact, Instant::now()).unwrap();
        assert_eq!(report.rows_in, 3);
        assert_eq!(report.rows_out(), 2);
        assert_eq!(report.column_names(), vec!["title", "vote_count"]);
        assert_eq!(report.null_counts[0].1, 1);
        assert_eq!(report.preview[1], vec!["NaN", "2"]);
        assert_eq!(report.schema[1], ("vote_count".to_string(), ColumnKind::Integer));
    }
}
