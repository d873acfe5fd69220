//! Command-line parsing for the store-sales forecaster.
//!
//! Argument parsing and command dispatch stay separate from the pipeline code;
//! `app` turns these structs into `ForecastConfig` / `ServerConfig`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::SeasonalityMode;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "storecast", version, about = "Per-store daily sales forecaster (spreadsheet in, xlsx out)")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Forecast a local or remote spreadsheet and write the result workbook.
    Run(RunArgs),
    /// Start the HTTP service.
    Serve(ServeArgs),
}

/// Where the input spreadsheet comes from.
#[derive(Debug, Args, Clone)]
#[group(required = true, multiple = false)]
pub struct InputSource {
    /// Local xlsx/xls/ods or delimited text file.
    #[arg(short, long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// http(s) URL to download the input from.
    #[arg(short, long, value_name = "URL")]
    pub url: Option<String>,
}

/// Model knobs shared by `run` and `serve`.
#[derive(Debug, Args, Clone)]
pub struct ModelArgs {
    /// Weekly seasonality.
    #[arg(long, value_enum, default_value_t = SeasonalityMode::Auto)]
    pub weekly: SeasonalityMode,

    /// Yearly seasonality.
    #[arg(long, value_enum, default_value_t = SeasonalityMode::On)]
    pub yearly: SeasonalityMode,

    /// Fourier order of the weekly component.
    #[arg(long, default_value_t = 3)]
    pub weekly_order: usize,

    /// Fourier order of the yearly component.
    #[arg(long, default_value_t = 10)]
    pub yearly_order: usize,

    /// Prior scale of the seasonal terms (smaller = smoother).
    #[arg(long, default_value_t = 1.0)]
    pub prior_scale: f64,

    /// Longest accepted forecast range in days.
    #[arg(long, default_value_t = 3660)]
    pub max_horizon_days: usize,

    /// Fit series one after another instead of in parallel.
    #[arg(long)]
    pub sequential: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: InputSource,

    /// First forecast date (YYYY-MM-DD).
    #[arg(long, value_name = "DATE")]
    pub start: String,

    /// Last forecast date, inclusive (YYYY-MM-DD).
    #[arg(long, value_name = "DATE")]
    pub end: String,

    /// Output workbook (default: `forecast_<uuid>.xlsx` in the current directory).
    #[arg(short, long, value_name = "XLSX")]
    pub output: Option<PathBuf>,

    /// Also write the manifest as JSON.
    #[arg(long, value_name = "JSON")]
    pub manifest: Option<PathBuf>,

    /// Rows of the forecast to print.
    #[arg(long, default_value_t = 10)]
    pub preview: usize,

    /// Download timeout in seconds (with `--url`).
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value_t = 60)]
    pub fetch_timeout_secs: u64,

    #[command(flatten)]
    pub model: ModelArgs,
}

#[derive(Debug, Parser, Clone)]
pub struct ServeArgs {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Directory for generated workbooks.
    #[arg(long, env = "FILES_DIR", default_value = "files")]
    pub files_dir: PathBuf,

    /// Base of returned download links (default: `http://<host>:<port>`).
    #[arg(long, env = "PUBLIC_BASE_URL")]
    pub public_base_url: Option<String>,

    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value_t = 60)]
    pub fetch_timeout_secs: u64,

    #[command(flatten)]
    pub model: ModelArgs,
}
