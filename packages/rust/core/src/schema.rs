//! Type recovery for text snapshots.
//!
//! Snapshots are stored as text. When a stage reads one back it recognizes
//! null tokens, infers a kind per column, and coerces the columns it needs
//! as numbers or dates. Values that fail coercion become nulls; nothing in
//! here raises on a bad cell.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::{Column, DataType};
use regex::Regex;

use cinelayer_shared::{ColumnKind, Frame, Result, date_to_days};

/// Cell texts read back as missing values.
pub const NULL_TOKENS: &[&str] = &[
    "", "nan", "NaN", "-nan", "-NaN", "NA", "N/A", "n/a", "<NA>", "#N/A", "#N/A N/A", "#NA",
    "NULL", "null", "None", "-1.#IND", "1.#IND", "-1.#QNAN", "1.#QNAN",
];

/// Matches the positional index column left behind by dataframe exports.
static INDEX_COLUMN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Unnamed: \d+$").expect("valid regex"));

pub fn is_null_token(value: &str) -> bool {
    NULL_TOKENS.contains(&value.trim())
}

/// A null token, or any spelling of NaN the float parser accepts (`NAN`, `+nan`).
pub fn is_missing(value: &str) -> bool {
    is_null_token(value) || value.trim().parse::<f64>().is_ok_and(f64::is_nan)
}

/// Finite numbers only; `inf` and NaN do not count as numbers.
pub fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn is_index_column(name: &str) -> bool {
    INDEX_COLUMN_RE.is_match(name)
}

// ---------------------------------------------------------------------------
// Inference
// ---------------------------------------------------------------------------

/// Turn an all-text frame into a typed one, column by column. Columns that
/// already carry a type are kept as they are.
pub fn type_frame(frame: Frame) -> Result<Frame> {
    let mut columns = Vec::with_capacity(frame.column_count());
    for (name, kind) in frame.schema() {
        let column = match kind {
            ColumnKind::Text => infer_column(&name, &frame.rendered(&name)?),
            _ => frame.column(&name)?.clone(),
        };
        columns.push(column);
    }
    Frame::new(columns)
}

/// Infer a column's kind from its non-missing values.
///
/// All integers → `Integer`; all finite numbers → `Float`; all
/// `True`/`False` → `Boolean`; anything else, including a column with no
/// values, → `Text`.
pub fn infer_column(name: &str, values: &[Option<String>]) -> Column {
    let present: Vec<Option<&str>> = values
        .iter()
        .map(|v| v.as_deref().map(str::trim).filter(|s| !is_missing(s)))
        .collect();
    let known = || present.iter().flatten();

    let kind = if known().next().is_none() {
        ColumnKind::Text
    } else if known().all(|s| s.parse::<i64>().is_ok()) {
        ColumnKind::Integer
    } else if known().all(|s| parse_number(s).is_some()) {
        ColumnKind::Float
    } else if known().all(|s| parse_bool(s).is_some()) {
        ColumnKind::Boolean
    } else {
        ColumnKind::Text
    };

    match kind {
        ColumnKind::Integer => Column::new(
            name.into(),
            present
                .iter()
                .map(|v| v.and_then(|s| s.parse::<i64>().ok()))
                .collect::<Vec<_>>(),
        ),
        ColumnKind::Float => Column::new(
            name.into(),
            present
                .iter()
                .map(|v| v.and_then(parse_number))
                .collect::<Vec<_>>(),
        ),
        ColumnKind::Boolean => Column::new(
            name.into(),
            present
                .iter()
                .map(|v| v.and_then(parse_bool))
                .collect::<Vec<_>>(),
        ),
        _ => Column::new(
            name.into(),
            values
                .iter()
                .zip(&present)
                .map(|(raw, kept)| kept.and(raw.as_deref()))
                .collect::<Vec<_>>(),
        ),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "True" | "true" | "TRUE" => Some(true),
        "False" | "false" | "FALSE" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Numeric coercion
// ---------------------------------------------------------------------------

/// Force a column to a numeric kind. Returns how many present cells could
/// not be parsed as finite numbers and were nulled.
///
/// A column whose values are all integers is parsed straight to `i64`, so
/// large counts keep every digit.
pub fn coerce_numeric(frame: &mut Frame, name: &str) -> Result<usize> {
    if frame.kind(name).is_some_and(ColumnKind::is_numeric) {
        return Ok(0);
    }

    let values = frame.rendered(name)?;
    let mut malformed = 0usize;
    let numbers: Vec<Option<&str>> = values
        .iter()
        .map(|v| {
            let s = v.as_deref()?.trim();
            if is_missing(s) {
                return None;
            }
            if parse_number(s).is_none() {
                malformed += 1;
                return None;
            }
            Some(s)
        })
        .collect();

    let column = if numbers.iter().flatten().all(|s| s.parse::<i64>().is_ok()) {
        Column::new(
            name.into(),
            numbers
                .iter()
                .map(|v| v.and_then(|s| s.parse::<i64>().ok()))
                .collect::<Vec<_>>(),
        )
    } else {
        Column::new(
            name.into(),
            numbers
                .iter()
                .map(|v| v.and_then(parse_number))
                .collect::<Vec<_>>(),
        )
    };
    frame.upsert_column(column)?;

    Ok(malformed)
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

static COMPACT_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{8}$").expect("valid regex"));

static YEAR_MONTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{1,2})$").expect("valid regex"));

static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}$").expect("valid regex"));

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse a date in any of the accepted shapes; `None` if none fits.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if is_null_token(s) {
        return None;
    }

    if let Some(d) = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
    {
        return Some(d);
    }

    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Some(dt.date());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }

    if COMPACT_DATE_RE.is_match(s) {
        return NaiveDate::parse_from_str(s, "%Y%m%d").ok();
    }

    if let Some(caps) = YEAR_MONTH_RE.captures(s) {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, 1);
    }

    if YEAR_RE.is_match(s) {
        return NaiveDate::from_ymd_opt(s.parse().ok()?, 1, 1);
    }

    None
}

/// Convert a column to dates in place. Returns how many present values
/// could not be parsed and were nulled. A `Date` column passes through.
pub fn coerce_dates(frame: &mut Frame, name: &str) -> Result<usize> {
    if frame.kind(name) == Some(ColumnKind::Date) {
        return Ok(0);
    }

    let values = frame.rendered(name)?;
    let mut unparsed = 0usize;
    let days: Vec<Option<i32>> = values
        .iter()
        .map(|v| {
            let raw = v.as_deref()?;
            if is_missing(raw) {
                return None;
            }
            let parsed = parse_date(raw).map(date_to_days);
            if parsed.is_none() {
                unparsed += 1;
            }
            parsed
        })
        .collect();

    let column = Column::new(name.into(), days).cast(&DataType::Date)?;
    frame.upsert_column(column)?;
    Ok(unparsed)
}
