//! Table model shared by every pipeline stage.
//!
//! A [`Frame`] wraps a polars [`DataFrame`]. Stages hand frames to each
//! other and to storage; row-level work (deduplication, filtering, group
//! summaries) runs on the dataframe itself. This module owns the mapping
//! between dataframe dtypes and the pipeline's [`ColumnKind`]s, and the
//! text rendering used when a frame is written out.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{CinelayerError, Result};

/// Storage format for dates inside snapshots.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Days from 0001-01-01 (CE) to 1970-01-01, the origin of polars dates.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// Text form of one value as written to snapshots. `None` for nulls.
pub fn render_value(value: &AnyValue<'_>) -> Option<String> {
    match value {
        AnyValue::Null => None,
        AnyValue::String(s) => Some((*s).to_string()),
        AnyValue::StringOwned(s) => Some(s.to_string()),
        AnyValue::Boolean(true) => Some("True".into()),
        AnyValue::Boolean(false) => Some("False".into()),
        AnyValue::Int64(v) => Some(v.to_string()),
        AnyValue::Int32(v) => Some(v.to_string()),
        AnyValue::UInt32(v) => Some(v.to_string()),
        AnyValue::UInt64(v) => Some(v.to_string()),
        AnyValue::Float64(v) => Some(render_float(*v)),
        AnyValue::Float32(v) => Some(render_float(f64::from(*v))),
        AnyValue::Date(days) => days_to_date(*days).map(|d| d.format(DATE_FORMAT).to_string()),
        other => Some(other.to_string()),
    }
}

/// Integral floats keep one decimal (`100.0`); others use the shortest round-trip form.
pub fn render_float(v: f64) -> String {
    if v.is_nan() {
        "NaN".into()
    } else if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{v:.1}")
    } else {
        v.to_string()
    }
}

/// Physical value of a date inside a polars `Date` column.
pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

// ---------------------------------------------------------------------------
// ColumnKind
// ---------------------------------------------------------------------------

/// Logical type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Integer,
    Float,
    Date,
    Boolean,
}

impl ColumnKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float)
    }

    /// Kind of a dataframe dtype. Anything the pipeline does not type is text.
    pub fn of(dtype: &DataType) -> Self {
        match dtype {
            DataType::Boolean => ColumnKind::Boolean,
            DataType::Date => ColumnKind::Date,
            d if d.is_integer() => ColumnKind::Integer,
            d if d.is_float() => ColumnKind::Float,
            _ => ColumnKind::Text,
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Text => "text",
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "float",
            ColumnKind::Date => "date",
            ColumnKind::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// An ordered table backed by a polars dataframe.
#[derive(Debug, Clone)]
pub struct Frame {
    df: DataFrame,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            df: DataFrame::empty(),
        }
    }
}

impl From<DataFrame> for Frame {
    fn from(df: DataFrame) -> Self {
        Self { df }
    }
}

impl Frame {
    /// Build a frame, rejecting ragged or duplicate-named columns.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        Ok(Self {
            df: DataFrame::new(columns)?,
        })
    }

    /// Build an all-text frame from a header and row-major records.
    ///
    /// Every record must have exactly `header.len()` fields. `None` marks a
    /// missing field.
    pub fn from_text_rows(header: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Result<Self> {
        let width = header.len();
        let mut values: Vec<Vec<Option<String>>> = vec![Vec::with_capacity(rows.len()); width];
        for (idx, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(CinelayerError::validation(format!(
                    "row {idx} has {} fields, expected {width}",
                    row.len()
                )));
            }
            for (column, value) in values.iter_mut().zip(row) {
                column.push(value);
            }
        }
        let columns = header
            .into_iter()
            .zip(values)
            .map(|(name, cells)| Column::new(name.into(), cells))
            .collect();
        Self::new(columns)
    }

    pub fn df(&self) -> &DataFrame {
        &self.df
    }

    pub fn into_df(self) -> DataFrame {
        self.df
    }

    pub fn row_count(&self) -> usize {
        self.df.height()
    }

    pub fn column_count(&self) -> usize {
        self.df.width()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.df
            .get_column_names()
            .into_iter()
            .map(|name| name.as_str())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.df.column(name).is_ok()
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        Ok(self.df.column(name)?)
    }

    pub fn kind(&self, name: &str) -> Option<ColumnKind> {
        self.df.column(name).ok().map(|c| ColumnKind::of(c.dtype()))
    }

    /// Insert a column, or replace the existing one with the same name in place.
    pub fn upsert_column(&mut self, column: Column) -> Result<()> {
        self.df.with_column(column)?;
        Ok(())
    }

    /// Remove a column by name, returning it if it existed.
    pub fn drop_column(&mut self, name: &str) -> Option<Column> {
        self.df.drop_in_place(name).ok()
    }

    /// Rendered values of one column in row order.
    pub fn rendered(&self, name: &str) -> Result<Vec<Option<String>>> {
        render_column(self.df.column(name)?)
    }

    /// Every column rendered, in column order.
    pub fn rendered_columns(&self) -> Result<Vec<Vec<Option<String>>>> {
        self.df.get_columns().iter().map(render_column).collect()
    }

    /// Numeric view of a column; values that are not numbers read as null.
    pub fn f64_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let column = self.df.column(name)?;
        if !ColumnKind::of(column.dtype()).is_numeric() {
            return Ok(vec![None; column.len()]);
        }
        let floats = column.cast(&DataType::Float64)?;
        Ok(floats.f64()?.into_iter().collect())
    }

    /// Date view of a `Date` column; any other column reads as all null.
    pub fn date_values(&self, name: &str) -> Result<Vec<Option<NaiveDate>>> {
        let column = self.df.column(name)?;
        if column.dtype() != &DataType::Date {
            return Ok(vec![None; column.len()]);
        }
        let days = column.cast(&DataType::Int32)?;
        Ok(days
            .i32()?
            .into_iter()
            .map(|d| d.and_then(days_to_date))
            .collect())
    }

    /// Null count per column, in column order.
    pub fn null_counts(&self) -> Vec<(String, usize)> {
        self.df
            .get_columns()
            .iter()
            .map(|c| (c.name().to_string(), c.null_count()))
            .collect()
    }

    /// Column names with their kinds, in column order.
    pub fn schema(&self) -> Vec<(String, ColumnKind)> {
        self.df
            .get_columns()
            .iter()
            .map(|c| (c.name().to_string(), ColumnKind::of(c.dtype())))
            .collect()
    }

    /// First `n` rows rendered for display. Nulls show as `NaN`.
    pub fn head(&self, n: usize) -> Result<Vec<Vec<String>>> {
        let head = self.df.head(Some(n));
        let columns: Vec<Vec<Option<String>>> =
            head.get_columns().iter().map(render_column).collect::<Result<_>>()?;
        Ok((0..head.height())
            .map(|r| {
                columns
                    .iter()
                    .map(|c| c[r].clone().unwrap_or_else(|| "NaN".into()))
                    .collect()
            })
            .collect())
    }
}

fn render_column(column: &Column) -> Result<Vec<Option<String>>> {
    (0..column.len())
        .map(|i| Ok(render_value(&column.get(i)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Frame {
        Frame::new(vec![
            Column::new("title".into(), [Some("A"), Some("B"), None]),
            Column::new("vote_average".into(), [Some(8.0), Some(6.5), None]),
            Column::new("vote_count".into(), [Some(10i64), None, Some(3)]),
        ])
        .unwrap()
    }

    #[test]
    fn render_floats_like_dataframe_exports() {
        assert_eq!(render_float(100.0), "100.0");
        assert_eq!(render_float(7.25), "7.25");
        assert_eq!(render_float(-0.5), "-0.5");
        assert_eq!(render_value(&AnyValue::Boolean(true)).as_deref(), Some("True"));
        assert_eq!(render_value(&AnyValue::Null), None);
        let d = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        assert_eq!(
            render_value(&AnyValue::Date(date_to_days(d))).as_deref(),
            Some("2023-01-01")
        );
    }

    #[test]
    fn epoch_offset_round_trips() {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(date_to_days(epoch), 0);
        let d = NaiveDate::from_ymd_opt(1895, 12, 28).unwrap();
        assert_eq!(days_to_date(date_to_days(d)), Some(d));
    }

    #[test]
    fn new_rejects_ragged_columns() {
        let err = Frame::new(vec![
            Column::new("a".into(), [Some("x")]),
            Column::new("b".into(), Vec::<Option<&str>>::new()),
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn new_rejects_duplicate_names() {
        let err = Frame::new(vec![
            Column::new("a".into(), [Some("x")]),
            Column::new("a".into(), [Some("y")]),
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn kinds_follow_dtypes() {
        let frame = sample();
        assert_eq!(
            frame.schema(),
            vec![
                ("title".to_string(), ColumnKind::Text),
                ("vote_average".to_string(), ColumnKind::Float),
                ("vote_count".to_string(), ColumnKind::Integer),
            ]
        );
        assert_eq!(frame.kind("missing"), None);
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut frame = sample();
        frame
            .upsert_column(Column::new("title".into(), [Some("Z"), Some("Z"), Some("Z")]))
            .unwrap();
        assert_eq!(frame.column_names(), vec!["title", "vote_average", "vote_count"]);
        frame
            .upsert_column(Column::new("flag".into(), [false, false, true]))
            .unwrap();
        assert_eq!(frame.column_count(), 4);
        assert!(frame
            .upsert_column(Column::new("short".into(), [Some("x"), Some("y")]))
            .is_err());
    }

    #[test]
    fn drop_column_returns_it() {
        let mut frame = sample();
        assert!(frame.drop_column("vote_count").is_some());
        assert!(frame.drop_column("vote_count").is_none());
        assert_eq!(frame.column_count(), 2);
    }

    #[test]
    fn null_counts_and_head() {
        let frame = sample();
        assert_eq!(frame.null_counts()[1], ("vote_average".to_string(), 1));
        let head = frame.head(2).unwrap();
        assert_eq!(head.len(), 2);
        assert_eq!(head[1], vec!["B", "6.5", "NaN"]);
    }

    #[test]
    fn numeric_and_date_views() {
        let frame = sample();
        assert_eq!(
            frame.f64_values("vote_count").unwrap(),
            vec![Some(10.0), None, Some(3.0)]
        );
        assert_eq!(frame.f64_values("title").unwrap(), vec![None, None, None]);
        assert_eq!(frame.date_values("title").unwrap(), vec![None, None, None]);
        assert!(frame.f64_values("missing").is_err());
    }

    #[test]
    fn from_text_rows_checks_width() {
        let header = vec!["a".to_string(), "b".to_string()];
        let frame = Frame::from_text_rows(
            header.clone(),
            vec![vec![Some("1".into()), None]],
        )
        .unwrap();
        assert_eq!(frame.rendered("b").unwrap(), vec![None]);
        assert!(Frame::from_text_rows(header, vec![vec![Some("1".into())]]).is_err());
    }
}
