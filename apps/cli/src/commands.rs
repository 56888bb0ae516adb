//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use cinelayer_core::pipeline::{PipelineReport, ProgressReporter, StageOutcome};
use cinelayer_core::{LOGGED_YEARS, RepairSummary, ReportingViews, StageReport};
use cinelayer_shared::{
    AppConfig, PipelineConfig, Stage, init_config, load_config, load_config_from, render_float,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Cinelayer: refine a raw movie export into bronze, silver and gold layers.
#[derive(Parser)]
#[command(
    name = "cinelayer",
    version,
    about = "Refine a raw movie export into bronze, silver and gold datasets.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.cinelayer/cinelayer.toml.
    #[arg(long, env = "CINELAYER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run intake, refine and derive in order.
    Run {
        /// Date the recency flag is computed against (defaults to today).
        #[arg(long)]
        reference_date: Option<NaiveDate>,

        /// Raw source file (overrides `paths.origin`).
        #[arg(long)]
        origin: Option<PathBuf>,

        /// Print the reporting views as JSON instead of tables.
        #[arg(long)]
        json: bool,
    },

    /// Run a single stage against existing artifacts.
    Stage {
        /// Stage to run.
        stage: StageArg,

        /// Date the recency flag is computed against (defaults to today).
        #[arg(long)]
        reference_date: Option<NaiveDate>,

        /// Raw source file (overrides `paths.origin`).
        #[arg(long)]
        origin: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Stage names accepted on the command line.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum StageArg {
    Intake,
    Refine,
    Derive,
}

impl From<StageArg> for Stage {
    fn from(arg: StageArg) -> Self {
        match arg {
            StageArg::Intake => Stage::Intake,
            StageArg::Refine => Stage::Refine,
            StageArg::Derive => Stage::Derive,
        }
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "cinelayer=info",
        1 => "cinelayer=debug",
        _ => "cinelayer=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            reference_date,
            origin,
            json,
        } => {
            let config = pipeline_config(cli.config.as_ref(), origin)?;
            cmd_run(&config, reference_date.unwrap_or_else(today), json)
        }
        Command::Stage {
            stage,
            reference_date,
            origin,
        } => {
            let config = pipeline_config(cli.config.as_ref(), origin)?;
            cmd_stage(stage.into(), &config, reference_date.unwrap_or_else(today))
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(cli.config.as_ref()),
        },
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn app_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    Ok(match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    })
}

/// Resolve the stage config: CLI flags over config file over defaults.
fn pipeline_config(path: Option<&PathBuf>, origin: Option<PathBuf>) -> Result<PipelineConfig> {
    let app = app_config(path)?;
    let mut config = PipelineConfig::from(&app);
    if let Some(origin) = origin {
        config.origin_path = origin;
    }
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_run(config: &PipelineConfig, reference_date: NaiveDate, json: bool) -> Result<()> {
    info!(
        origin = %config.origin_path.display(),
        %reference_date,
        "running pipeline"
    );

    let reporter = CliProgress::new();
    let report = cinelayer_core::run_pipeline(config, reference_date, &reporter)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report.derive.views)?);
        return Ok(());
    }

    print_pipeline_summary(&report, config);
    print_repairs(&report.refine.repairs);
    print_views(&report.derive.views);
    Ok(())
}

fn cmd_stage(stage: Stage, config: &PipelineConfig, reference_date: NaiveDate) -> Result<()> {
    info!(%stage, "running single stage");

    let outcome = cinelayer_core::run_stage(stage, config, reference_date)?;
    println!();
    print_stage(outcome.report());
    match &outcome {
        StageOutcome::Intake(intake) => {
            println!("  Skipped rows: {}", intake.skipped_rows);
        }
        StageOutcome::Refine(refine) => print_repairs(&refine.repairs),
        StageOutcome::Derive(derive) => print_views(&derive.views),
    }
    println!();
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&PathBuf>) -> Result<()> {
    let config = app_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, stage: Stage) {
        self.spinner
            .set_message(format!("{stage}: building {} layer", stage.layer()));
    }

    fn stage_done(&self, report: &StageReport) {
        self.spinner.println(format!(
            "  ✓ {:<7} {:>6} rows → {}",
            report.stage,
            report.rows_out(),
            report.artifact.path.display()
        ));
    }

    fn done(&self, _report: &PipelineReport) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_pipeline_summary(report: &PipelineReport, config: &PipelineConfig) {
    println!();
    println!("  Pipeline complete");
    println!("  Run:      {}", report.run_id);
    for stage in report.stages() {
        println!(
            "  {:<9} {} → {} rows, {} columns",
            format!("{}:", stage.stage),
            stage.rows_in,
            stage.rows_out(),
            stage.artifact.columns
        );
    }
    println!("  Manifest: {}", config.manifest_path.display());
    println!("  Time:     {:.1}s", report.elapsed.as_secs_f64());
    println!();
}

fn print_stage(report: &StageReport) {
    println!("  Stage:    {} ({})", report.stage, report.stage.layer());
    println!("  Rows:     {} → {}", report.rows_in, report.rows_out());
    println!("  Columns:  {}", report.column_names().join(", "));
    println!("  Output:   {}", report.artifact.path.display());
    println!("  SHA-256:  {}", report.artifact.sha256);
    println!("  Time:     {:.1}s", report.elapsed.as_secs_f64());
}

fn print_repairs(repairs: &RepairSummary) {
    println!("  Duplicates removed:   {}", repairs.duplicates_removed);
    println!("  Out of range removed: {}", repairs.out_of_range_removed);
    println!("  Malformed numbers:    {}", repairs.malformed_numbers);
    println!("  Unparsed dates:       {}", repairs.unparsed_dates);
    println!("  Text cells filled:    {}", repairs.text_filled);
    for imputed in &repairs.imputed {
        println!(
            "  Imputed {} ({}): {} cells with {}",
            imputed.column,
            repairs.imputer,
            imputed.filled,
            render_float(imputed.value)
        );
    }
    println!();
}

fn print_views(views: &ReportingViews) {
    println!("=== Estadísticas por idioma ===");
    let rows: Vec<Vec<String>> = views
        .by_language
        .iter()
        .map(|s| {
            vec![
                s.original_language.clone(),
                s.cantidad_peliculas.to_string(),
                fmt_opt(s.calificacion_promedio),
                fmt_opt(s.calificacion_mediana),
                fmt_opt(s.calificacion_desv_est),
                fmt_opt(s.popularidad_promedio),
                fmt_opt(s.popularidad_mediana),
                s.votos_totales.to_string(),
            ]
        })
        .collect();
    println!(
        "{}",
        format_table(
            &[
                "original_language",
                "cantidad_peliculas",
                "calificacion_promedio",
                "calificacion_mediana",
                "calificacion_desv_est",
                "popularidad_promedio",
                "popularidad_mediana",
                "votos_totales",
            ],
            &rows,
        )
    );

    println!("=== Estadísticas por año (últimos {LOGGED_YEARS}) ===");
    let rows = recent_year_rows(views);
    println!(
        "{}",
        format_table(
            &[
                "release_year",
                "cantidad_peliculas",
                "calificacion_promedio",
                "calificacion_max",
                "calificacion_min",
                "popularidad_promedio",
            ],
            &rows,
        )
    );

    println!("=== Top {} películas por calificación ===", views.top_rated.len());
    let rows: Vec<Vec<String>> = views
        .top_rated
        .iter()
        .map(|t| {
            vec![
                t.rank.to_string(),
                t.title.clone().unwrap_or_default(),
                t.release_year.map(|y| y.to_string()).unwrap_or_default(),
                render_float(t.vote_average),
                fmt_opt(t.popularity),
            ]
        })
        .collect();
    println!(
        "{}",
        format_table(&["#", "title", "release_year", "vote_average", "popularity"], &rows)
    );
}

/// By-year rows for the most recent [`LOGGED_YEARS`] years.
fn recent_year_rows(views: &ReportingViews) -> Vec<Vec<String>> {
    let skip = views.by_year.len().saturating_sub(LOGGED_YEARS);
    views
        .by_year
        .iter()
        .skip(skip)
        .map(|s| {
            vec![
                s.release_year.to_string(),
                s.cantidad_peliculas.to_string(),
                fmt_opt(s.calificacion_promedio),
                fmt_opt(s.calificacion_max),
                fmt_opt(s.calificacion_min),
                fmt_opt(s.popularidad_promedio),
            ]
        })
        .collect()
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(render_float).unwrap_or_else(|| "NaN".into())
}

/// Left-aligned plain-text table with one space of padding between columns.
fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![line(headers.to_vec())];
    out.extend(rows.iter().map(|r| line(r.iter().map(String::as_str).collect())));
    out.join("\n")
}
