//! Reporting views computed over the gold table.
//!
//! Views are transient: they are logged, returned to the caller, and never
//! written back into the dataset. Grouping and ranking run as lazy polars
//! queries; rounding to two decimals happens when results are read back.

use std::fmt;

use polars::prelude::*;
use serde::Serialize;

use cinelayer_shared::{ColumnKind, Frame, Result, render_float};

use crate::derive::columns;

/// Sum of `vote_count` within a group. Stays whole while the column holds integers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VoteTotal {
    Whole(i64),
    Fractional(f64),
}

impl fmt::Display for VoteTotal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Whole(v) => write!(f, "{v}"),
            Self::Fractional(v) => f.write_str(&render_float(*v)),
        }
    }
}

/// Per-language summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageStats {
    pub original_language: String,
    pub cantidad_peliculas: usize,
    pub calificacion_promedio: Option<f64>,
    pub calificacion_mediana: Option<f64>,
    pub calificacion_desv_est: Option<f64>,
    pub popularidad_promedio: Option<f64>,
    pub popularidad_mediana: Option<f64>,
    pub votos_totales: VoteTotal,
}

/// Per-release-year summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearStats {
    pub release_year: i64,
    pub cantidad_peliculas: usize,
    pub calificacion_promedio: Option<f64>,
    pub calificacion_max: Option<f64>,
    pub calificacion_min: Option<f64>,
    pub popularidad_promedio: Option<f64>,
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopEntry {
    pub rank: usize,
    pub title: Option<String>,
    pub release_year: Option<i64>,
    pub vote_average: f64,
    pub popularity: Option<f64>,
}

/// All views produced alongside the gold table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportingViews {
    pub by_language: Vec<LanguageStats>,
    pub by_year: Vec<YearStats>,
    pub top_rated: Vec<TopEntry>,
}

impl ReportingViews {
    pub fn compute(frame: &Frame, top_n: usize) -> Result<Self> {
        let source = view_source(frame)?;
        Ok(Self {
            by_language: by_language(&source)?,
            by_year: by_year(&source)?,
            top_rated: top_rated(&source, top_n)?,
        })
    }
}

/// Round half away from zero to two decimals.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// The gold dataframe with every column the views read. Missing or
/// non-numeric measure columns read as all null; the language key is text.
fn view_source(frame: &Frame) -> Result<DataFrame> {
    let height = frame.row_count();
    let mut df = frame.df().clone();

    let text = [columns::TITLE, columns::ORIGINAL_LANGUAGE];
    for name in text {
        let column = if frame.has_column(name) {
            Column::new(name.into(), frame.rendered(name)?)
        } else {
            Column::full_null(name.into(), height, &DataType::String)
        };
        df.with_column(column)?;
    }

    let measures = [
        (columns::VOTE_AVERAGE, DataType::Float64),
        (columns::POPULARITY, DataType::Float64),
        (columns::VOTE_COUNT, DataType::Int64),
        (columns::RELEASE_YEAR, DataType::Int64),
    ];
    for (name, dtype) in measures {
        if !frame.kind(name).is_some_and(ColumnKind::is_numeric) {
            df.with_column(Column::full_null(name.into(), height, &dtype))?;
        }
    }

    Ok(df)
}

fn ints(frame: &Frame, name: &str) -> Result<Vec<Option<i64>>> {
    let column = frame.column(name)?.cast(&DataType::Int64)?;
    Ok(column.i64()?.into_iter().collect())
}

fn counts(frame: &Frame, name: &str) -> Result<Vec<usize>> {
    Ok(ints(frame, name)?
        .into_iter()
        .map(|n| n.map_or(0, |n| n.max(0) as usize))
        .collect())
}

fn rounded(frame: &Frame, name: &str) -> Result<Vec<Option<f64>>> {
    Ok(frame
        .f64_values(name)?
        .into_iter()
        .map(|v| v.filter(|v| v.is_finite()).map(round2))
        .collect())
}

fn vote_totals(frame: &Frame, name: &str) -> Result<Vec<VoteTotal>> {
    if frame.kind(name) == Some(ColumnKind::Integer) {
        Ok(ints(frame, name)?
            .into_iter()
            .map(|v| VoteTotal::Whole(v.unwrap_or(0)))
            .collect())
    } else {
        Ok(frame
            .f64_values(name)?
            .into_iter()
            .map(|v| VoteTotal::Fractional(round2(v.unwrap_or(0.0))))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Per-language stats, ascending by language. Rows without a language are excluded.
pub fn by_language(source: &DataFrame) -> Result<Vec<LanguageStats>> {
    let stats = source
        .clone()
        .lazy()
        .filter(col(columns::ORIGINAL_LANGUAGE).is_not_null())
        .group_by([col(columns::ORIGINAL_LANGUAGE)])
        .agg([
            col(columns::TITLE).count().alias("peliculas"),
            col(columns::VOTE_AVERAGE).mean().alias("calificacion_promedio"),
            col(columns::VOTE_AVERAGE).median().alias("calificacion_mediana"),
            col(columns::VOTE_AVERAGE).std(1).alias("calificacion_desv_est"),
            col(columns::POPULARITY).mean().alias("popularidad_promedio"),
            col(columns::POPULARITY).median().alias("popularidad_mediana"),
            col(columns::VOTE_COUNT).sum().alias("votos_totales"),
        ])
        .sort([columns::ORIGINAL_LANGUAGE], SortMultipleOptions::default())
        .collect()?;
    let stats = Frame::from(stats);

    let languages = stats.rendered(columns::ORIGINAL_LANGUAGE)?;
    let peliculas = counts(&stats, "peliculas")?;
    let mean = rounded(&stats, "calificacion_promedio")?;
    let median = rounded(&stats, "calificacion_mediana")?;
    let std = rounded(&stats, "calificacion_desv_est")?;
    let pop_mean = rounded(&stats, "popularidad_promedio")?;
    let pop_median = rounded(&stats, "popularidad_mediana")?;
    let votes = vote_totals(&stats, "votos_totales")?;

    Ok((0..stats.row_count())
        .map(|i| LanguageStats {
            original_language: languages[i].clone().unwrap_or_default(),
            cantidad_peliculas: peliculas[i],
            calificacion_promedio: mean[i],
            calificacion_mediana: median[i],
            calificacion_desv_est: std[i],
            popularidad_promedio: pop_mean[i],
            popularidad_mediana: pop_median[i],
            votos_totales: votes[i],
        })
        .collect())
}

/// Per-year stats, ascending by year. Rows without a year are excluded.
pub fn by_year(source: &DataFrame) -> Result<Vec<YearStats>> {
    let stats = source
        .clone()
        .lazy()
        .filter(col(columns::RELEASE_YEAR).is_not_null())
        .group_by([col(columns::RELEASE_YEAR)])
        .agg([
            col(columns::TITLE).count().alias("peliculas"),
            col(columns::VOTE_AVERAGE).mean().alias("calificacion_promedio"),
            col(columns::VOTE_AVERAGE).max().alias("calificacion_max"),
            col(columns::VOTE_AVERAGE).min().alias("calificacion_min"),
            col(columns::POPULARITY).mean().alias("popularidad_promedio"),
        ])
        .sort([columns::RELEASE_YEAR], SortMultipleOptions::default())
        .collect()?;
    let stats = Frame::from(stats);

    let years = ints(&stats, columns::RELEASE_YEAR)?;
    let peliculas = counts(&stats, "peliculas")?;
    let mean = rounded(&stats, "calificacion_promedio")?;
    let max = rounded(&stats, "calificacion_max")?;
    let min = rounded(&stats, "calificacion_min")?;
    let pop_mean = rounded(&stats, "popularidad_promedio")?;

    Ok((0..stats.row_count())
        .filter_map(|i| {
            Some(YearStats {
                release_year: years[i]?,
                cantidad_peliculas: peliculas[i],
                calificacion_promedio: mean[i],
                calificacion_max: max[i],
                calificacion_min: min[i],
                popularidad_promedio: pop_mean[i],
            })
        })
        .collect())
}

/// Highest-rated rows, descending. Equal ratings keep row order; null ratings never rank.
pub fn top_rated(source: &DataFrame, n: usize) -> Result<Vec<TopEntry>> {
    let top = source
        .clone()
        .lazy()
        .filter(col(columns::VOTE_AVERAGE).is_not_null())
        .sort(
            [columns::VOTE_AVERAGE],
            SortMultipleOptions::default()
                .with_order_descending(true)
                .with_maintain_order(true),
        )
        .collect()?
        .head(Some(n));
    let top = Frame::from(top);

    let titles = top.rendered(columns::TITLE)?;
    let years = ints(&top, columns::RELEASE_YEAR)?;
    let ratings = top.f64_values(columns::VOTE_AVERAGE)?;
    let popularity = top.f64_values(columns::POPULARITY)?;

    Ok((0..top.row_count())
        .filter_map(|i| {
            Some(TopEntry {
                rank: i + 1,
                title: titles[i].clone(),
                release_year: years[i],
                vote_average: ratings[i]?,
                popularity: popularity[i],
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gold() -> Frame {
        Frame::new(vec![
            Column::new("title".into(), [Some("A"), Some("B"), Some("C"), Some("D"), Some("E")]),
            Column::new(
                "original_language".into(),
                [Some("en"), Some("en"), Some("fr"), None, Some("en")],
            ),
            Column::new(
                "vote_average".into(),
                [Some(8.0), Some(7.0), Some(8.0), Some(9.5), None],
            ),
            Column::new("vote_count".into(), [Some(10i64), Some(20), Some(5), Some(1), None]),
            Column::new(
                "popularity".into(),
                [Some(60.0), Some(10.0), Some(30.0), None, Some(5.0)],
            ),
            Column::new(
                "release_year".into(),
                [Some(2023i64), Some(2020), Some(2023), None, Some(2020)],
            ),
        ])
        .unwrap()
    }

    fn views(frame: &Frame, n: usize) -> ReportingViews {
        ReportingViews::compute(frame, n).unwrap()
    }

    #[test]
    fn languages_sorted_and_null_keys_excluded() {
        let stats = views(&gold(), 10).by_language;
        let keys: Vec<_> = stats.iter().map(|s| s.original_language.as_str()).collect();
        assert_eq!(keys, vec!["en", "fr"]);

        let en = &stats[0];
        assert_eq!(en.cantidad_peliculas, 3);
        assert_eq!(en.calificacion_promedio, Some(7.5));
        assert_eq!(en.calificacion_mediana, Some(7.5));
        assert_eq!(en.calificacion_desv_est, Some(0.71));
        assert_eq!(en.popularidad_promedio, Some(25.0));
        assert_eq!(en.popularidad_mediana, Some(10.0));
        assert_eq!(en.votos_totales, VoteTotal::Whole(30));
        assert_eq!(en.votos_totales.to_string(), "30");

        let fr = &stats[1];
        assert_eq!(fr.cantidad_peliculas, 1);
        assert_eq!(fr.calificacion_desv_est, None);
    }

    #[test]
    fn fractional_vote_counts_sum_as_floats() {
        let mut frame = gold();
        frame
            .upsert_column(Column::new(
                "vote_count".into(),
                [Some(1.5), Some(2.0), Some(5.0), Some(1.0), None],
            ))
            .unwrap();
        let en = &views(&frame, 10).by_language[0];
        assert_eq!(en.votos_totales, VoteTotal::Fractional(3.5));
        assert_eq!(en.votos_totales.to_string(), "3.5");
    }

    #[test]
    fn vote_totals_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&VoteTotal::Whole(30)).unwrap();
        assert_eq!(json, "30");
        let json = serde_json::to_string(&VoteTotal::Fractional(2.5)).unwrap();
        assert_eq!(json, "2.5");
    }

    #[test]
    fn years_ascending_with_extremes() {
        let stats = views(&gold(), 10).by_year;
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].release_year, 2020);
        assert_eq!(stats[0].cantidad_peliculas, 2);
        assert_eq!(stats[0].calificacion_max, Some(7.0));
        assert_eq!(stats[1].release_year, 2023);
        assert_eq!(stats[1].calificacion_promedio, Some(8.0));
        assert_eq!(stats[1].popularidad_promedio, Some(45.0));
    }

    #[test]
    fn top_rated_breaks_ties_by_row_order() {
        let top = views(&gold(), 3).top_rated;
        let titles: Vec<_> = top.iter().map(|t| t.title.as_deref().unwrap()).collect();
        assert_eq!(titles, vec!["D", "A", "C"]);
        assert_eq!(top[0].rank, 1);
        assert_eq!(top[0].release_year, None);
        assert_eq!(top[1].popularity, Some(60.0));
    }

    #[test]
    fn top_rated_skips_null_ratings() {
        let top = views(&gold(), 10).top_rated;
        assert_eq!(top.len(), 4);
        assert!(top.iter().all(|t| t.title.as_deref() != Some("E")));
    }

    #[test]
    fn missing_columns_read_as_null() {
        let frame = Frame::new(vec![Column::new("title".into(), [Some("A")])]).unwrap();
        let views = views(&frame, 10);
        assert!(views.by_language.is_empty());
        assert!(views.by_year.is_empty());
        assert!(views.top_rated.is_empty());
    }

    #[test]
    fn round2_half_away_from_zero() {
        assert_eq!(round2(2.345_000_1), 2.35);
        assert_eq!(round2(7.0), 7.0);
        assert_eq!(round2(-1.006), -1.01);
    }
}
