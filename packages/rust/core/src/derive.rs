//! Derive (gold): silver snapshot → enriched dataset plus reporting views.

use std::fmt;
use std::time::Instant;

use chrono::{Datelike, NaiveDate};
use polars::prelude::Column;
use tracing::{debug, error, info, instrument, warn};

use cinelayer_shared::{CinelayerError, DeriveConfig, Frame, PipelineConfig, Result, Stage};

use crate::aggregate::ReportingViews;
use crate::report::{self, StageReport};
use crate::schema;

/// Column names read and written by this stage.
pub mod columns {
    pub const TITLE: &str = "title";
    pub const ORIGINAL_LANGUAGE: &str = "original_language";
    pub const VOTE_AVERAGE: &str = "vote_average";
    pub const VOTE_COUNT: &str = "vote_count";
    pub const POPULARITY: &str = "popularity";
    pub const RELEASE_YEAR: &str = "release_year";
    pub const RELEASE_MONTH: &str = "release_month";
    pub const RATING_BAND: &str = "calificacion_categoria";
    pub const POPULARITY_BAND: &str = "popularidad_categoria";
    pub const IS_RECENT: &str = "es_reciente";
}

/// Most recent years of the by-year view shown in logs and summaries.
pub const LOGGED_YEARS: usize = 10;

// ---------------------------------------------------------------------------
// Buckets
// ---------------------------------------------------------------------------

/// Rating bucket for `vote_average`. Thresholds are inclusive lower bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingBand {
    Unrated,
    Excellent,
    VeryGood,
    Good,
    Fair,
    Poor,
}

impl RatingBand {
    pub fn classify(rating: Option<f64>) -> Self {
        match rating {
            None => Self::Unrated,
            Some(r) if r >= 8.0 => Self::Excellent,
            Some(r) if r >= 7.0 => Self::VeryGood,
            Some(r) if r >= 6.0 => Self::Good,
            Some(r) if r >= 5.0 => Self::Fair,
            Some(_) => Self::Poor,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Unrated => "Sin clasificar",
            Self::Excellent => "Excelente",
            Self::VeryGood => "Muy buena",
            Self::Good => "Buena",
            Self::Fair => "Regular",
            Self::Poor => "Pobre",
        }
    }
}

impl fmt::Display for RatingBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Popularity bucket for `popularity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopularityBand {
    Unknown,
    VeryPopular,
    Popular,
    ModeratelyPopular,
    NotPopular,
}

impl PopularityBand {
    pub fn classify(popularity: Option<f64>) -> Self {
        match popularity {
            None => Self::Unknown,
            Some(p) if p >= 50.0 => Self::VeryPopular,
            Some(p) if p >= 25.0 => Self::Popular,
            Some(p) if p >= 10.0 => Self::ModeratelyPopular,
            Some(_) => Self::NotPopular,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Unknown => "Desconocida",
            Self::VeryPopular => "Muy popular",
            Self::Popular => "Popular",
            Self::ModeratelyPopular => "Moderadamente popular",
            Self::NotPopular => "Poco popular",
        }
    }
}

impl fmt::Display for PopularityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// True iff `year` falls within `window` years of `reference_year`. Unknown years are never recent.
pub fn is_recent(year: Option<i32>, reference_year: i32, window: i32) -> bool {
    year.is_some_and(|y| y >= reference_year - window)
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Result of the derive stage.
#[derive(Debug, Clone)]
pub struct DeriveReport {
    pub report: StageReport,
    pub views: ReportingViews,
    pub reference_date: NaiveDate,
}

/// Read `config.silver_path`, enrich it, and write `config.gold_path`.
#[instrument(skip_all, fields(source = %config.silver_path.display(), reference_date = %reference_date))]
pub fn run(config: &PipelineConfig, reference_date: NaiveDate) -> Result<DeriveReport> {
    run_inner(config, reference_date)
        .inspect_err(|e| error!(stage = %Stage::Derive, error = %e, "stage failed"))
}

fn run_inner(config: &PipelineConfig, reference_date: NaiveDate) -> Result<DeriveReport> {
    let started = Instant::now();
    let source = &config.silver_path;

    let snapshot = cinelayer_storage::read_snapshot(source)?;
    if snapshot.frame.row_count() == 0 {
        return Err(CinelayerError::empty_dataset(source));
    }
    let rows_in = snapshot.frame.row_count();

    let mut frame = schema::type_frame(snapshot.frame)?;
    for name in [columns::VOTE_AVERAGE, columns::VOTE_COUNT, columns::POPULARITY] {
        if frame.has_column(name) {
            schema::coerce_numeric(&mut frame, name)?;
        } else {
            warn!(column = name, "column not present; treated as null");
        }
    }
    let date_column = &config.refine.date_column;
    if frame.has_column(date_column) {
        schema::coerce_dates(&mut frame, date_column)?;
    } else {
        warn!(column = %date_column, "date column not present");
    }

    derive_frame(&mut frame, date_column, &config.derive, reference_date)?;

    let views = ReportingViews::compute(&frame, config.derive.top_n)?;
    log_views(&views);
    report::log_profile(Stage::Derive, "enriched", &frame);
    report::log_preview(Stage::Derive, &frame);

    let artifact = cinelayer_storage::write_snapshot(&config.gold_path, &frame)?;
    info!(
        path = %artifact.path.display(),
        rows = artifact.rows,
        columns = artifact.columns,
        "gold dataset written"
    );

    Ok(DeriveReport {
        report: StageReport::new(Stage::Derive, rows_in, &frame, artifact, started)?,
        views,
        reference_date,
    })
}

/// Add (or replace in place) the five derived columns.
pub fn derive_frame(
    frame: &mut Frame,
    date_column: &str,
    config: &DeriveConfig,
    reference_date: NaiveDate,
) -> Result<()> {
    let rows = frame.row_count();
    let dates = if frame.has_column(date_column) {
        frame.date_values(date_column)?
    } else {
        vec![None; rows]
    };
    let numbers = |name: &str| -> Result<Vec<Option<f64>>> {
        if frame.has_column(name) {
            frame.f64_values(name)
        } else {
            Ok(vec![None; rows])
        }
    };
    let ratings = numbers(columns::VOTE_AVERAGE)?;
    let popularity = numbers(columns::POPULARITY)?;

    let years: Vec<Option<i32>> = dates.iter().map(|d| d.map(|d| d.year())).collect();
    let reference_year = reference_date.year();

    let derived = [
        Column::new(
            columns::RELEASE_YEAR.into(),
            years.iter().map(|y| y.map(i64::from)).collect::<Vec<_>>(),
        ),
        Column::new(
            columns::RELEASE_MONTH.into(),
            dates
                .iter()
                .map(|d| d.map(|d| i64::from(d.month())))
                .collect::<Vec<_>>(),
        ),
        Column::new(
            columns::RATING_BAND.into(),
            ratings
                .iter()
                .map(|r| RatingBand::classify(*r).label())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            columns::POPULARITY_BAND.into(),
            popularity
                .iter()
                .map(|p| PopularityBand::classify(*p).label())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            columns::IS_RECENT.into(),
            years
                .iter()
                .map(|y| is_recent(*y, reference_year, config.recent_window_years))
                .collect::<Vec<_>>(),
        ),
    ];

    for column in derived {
        frame.upsert_column(column)?;
    }

    debug!(
        reference_year,
        window = config.recent_window_years,
        "derived columns added"
    );
    Ok(())
}

fn log_views(views: &ReportingViews) {
    for s in &views.by_language {
        info!(
            language = %s.original_language,
            peliculas = s.cantidad_peliculas,
            calificacion_promedio = ?s.calificacion_promedio,
            calificacion_mediana = ?s.calificacion_mediana,
            calificacion_desv_est = ?s.calificacion_desv_est,
            popularidad_promedio = ?s.popularidad_promedio,
            votos_totales = %s.votos_totales,
            "language stats"
        );
    }
    let skip = views.by_year.len().saturating_sub(LOGGED_YEARS);
    for s in views.by_year.iter().skip(skip) {
        info!(
            year = s.release_year,
            peliculas = s.cantidad_peliculas,
            calificacion_promedio = ?s.calificacion_promedio,
            calificacion_max = ?s.calificacion_max,
            calificacion_min = ?s.calificacion_min,
            popularidad_promedio = ?s.popularidad_promedio,
            "year stats"
        );
    }
    for t in &views.top_rated {
        info!(
            rank = t.rank,
            title = t.title.as_deref().unwrap_or(""),
            year = ?t.release_year,
            vote_average = t.vote_average,
            popularity = ?t.popularity,
            "top rated"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cl-derive-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn config_with_silver(root: &Path, silver: &str) -> PipelineConfig {
        let config = PipelineConfig::rooted_at(root, root.join("origin.csv"));
        std::fs::create_dir_all(config.silver_path.parent().unwrap()).unwrap();
        std::fs::write(&config.silver_path, silver).unwrap();
        config
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn rating_thresholds_map_up() {
        assert_eq!(RatingBand::classify(None).label(), "Sin clasificar");
        assert_eq!(RatingBand::classify(Some(8.0)).label(), "Excelente");
        assert_eq!(RatingBand::classify(Some(7.0)).label(), "Muy buena");
        assert_eq!(RatingBand::classify(Some(6.0)).label(), "Buena");
        assert_eq!(RatingBand::classify(Some(5.0)).label(), "Regular");
        assert_eq!(RatingBand::classify(Some(4.99)).label(), "Pobre");
        assert_eq!(RatingBand::classify(Some(0.0)), RatingBand::Poor);
        assert_eq!(RatingBand::classify(Some(7.99)), RatingBand::VeryGood);
    }

    #[test]
    fn popularity_thresholds_map_up() {
        assert_eq!(PopularityBand::classify(None).label(), "Desconocida");
        assert_eq!(PopularityBand::classify(Some(50.0)).label(), "Muy popular");
        assert_eq!(PopularityBand::classify(Some(25.0)).label(), "Popular");
        assert_eq!(PopularityBand::classify(Some(10.0)).label(), "Moderadamente popular");
        assert_eq!(PopularityBand::classify(Some(9.9)).label(), "Poco popular");
    }

    #[test]
    fn recency_window_is_inclusive() {
        assert!(is_recent(Some(2020), 2025, 5));
        assert!(!is_recent(Some(2019), 2025, 5));
        assert!(is_recent(Some(2030), 2025, 5));
        assert!(!is_recent(None, 2025, 5));
    }

    #[test]
    fn derive_enriches_single_row() {
        let tmp = temp_dir();
        let config = config_with_silver(
            &tmp,
            "title,release_date,vote_average,popularity\nA,2023-01-01,8.0,60\n",
        );

        let result = run(&config, ymd(2025, 6, 1)).unwrap();
        assert_eq!(
            result.report.column_names(),
            vec![
                "title",
                "release_date",
                "vote_average",
                "popularity",
                "release_year",
                "release_month",
                "calificacion_categoria",
                "popularidad_categoria",
                "es_reciente",
            ]
        );

        let gold = std::fs::read_to_string(&config.gold_path).unwrap();
        assert_eq!(
            gold,
            "title,release_date,vote_average,popularity,release_year,release_month,\
             calificacion_categoria,popularidad_categoria,es_reciente\n\
             A,2023-01-01,8.0,60,2023,1,Excelente,Muy popular,True\n"
        );
        assert_eq!(result.views.top_rated.len(), 1);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn null_dates_give_null_year_and_not_recent() {
        let tmp = temp_dir();
        let config = config_with_silver(
            &tmp,
            "title,release_date,vote_average,popularity\nA,,4.0,\nB,2010-03-04,5.5,12\n",
        );

        run(&config, ymd(2025, 1, 1)).unwrap();
        let gold = std::fs::read_to_string(&config.gold_path).unwrap();
        let lines: Vec<_> = gold.lines().collect();
        assert_eq!(lines[1], "A,,4.0,,,,Pobre,Desconocida,False");
        assert_eq!(lines[2], "B,2010-03-04,5.5,12,2010,3,Regular,Moderadamente popular,False");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rerun_replaces_derived_columns_in_place() {
        let tmp = temp_dir();
        let config = config_with_silver(&tmp, "title,release_date,vote_average\nA,2024-02-02,6.2\n");

        let first = run(&config, ymd(2025, 1, 1)).unwrap();
        // feed gold back in as silver
        std::fs::copy(&config.gold_path, &config.silver_path).unwrap();
        let second = run(&config, ymd(2025, 1, 1)).unwrap();

        assert_eq!(first.report.column_names(), second.report.column_names());
        assert_eq!(first.report.artifact.sha256, second.report.artifact.sha256);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn derive_requires_silver() {
        let tmp = temp_dir();
        let config = PipelineConfig::rooted_at(&tmp, tmp.join("origin.csv"));
        let err = run(&config, ymd(2025, 1, 1)).unwrap_err();
        assert!(matches!(err, CinelayerError::MissingInput { .. }));
        let _ = std::fs::remove_dir_all(&tmp);
    }
}
