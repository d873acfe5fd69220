//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the "real main" that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments
//! - runs one forecast from the command line, or starts the HTTP service

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::{Command, InputSource, ModelArgs, RunArgs, ServeArgs};
use crate::domain::{DateRange, ForecastConfig, InputOrigin};
use crate::error::AppError;
use crate::fit::check_horizon;
use crate::io::fetch::FileFetcher;
use crate::server::{ArtifactStore, ServerConfig};

pub mod pipeline;

const DEFAULT_LOG_FILTER: &str = "storecast=info,tower_http=info";

/// Entry point for the `storecast` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = crate::cli::Cli::parse();
    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Serve(args) => handle_serve(args),
    }
}

fn init_tracing() {
    // Logs go to stderr so the run summary on stdout stays clean.
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let config = forecast_config_from_args(&args.model);
    let range = DateRange::parse(&args.start, &args.end)?;
    check_horizon(&range, &config)?;

    let (payload, origin) = read_source(&args.source, Duration::from_secs(args.fetch_timeout_secs))?;
    let run = pipeline::run_forecast(&payload, &origin, &range, &config)?;

    println!(
        "{}",
        crate::report::format_run_summary(&run.table, &run.manifest, run.input_format)
    );
    println!("{}", crate::report::format_preview(&run.table, args.preview));

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("forecast_{}.xlsx", uuid::Uuid::new_v4().simple())));
    fs::write(&output, &run.workbook)
        .map_err(|e| AppError::new(2, format!("Failed to write {}: {e}", output.display())))?;
    println!("Workbook: {}", output.display());

    if let Some(path) = &args.manifest {
        write_manifest_json(path, &run.manifest)?;
        println!("Manifest: {}", path.display());
    }

    Ok(())
}

fn read_source(source: &InputSource, timeout: Duration) -> Result<(Vec<u8>, InputOrigin), AppError> {
    match (&source.input, &source.url) {
        (Some(path), _) => {
            let bytes = fs::read(path)
                .map_err(|e| AppError::new(2, format!("Failed to read {}: {e}", path.display())))?;
            let filename = path.file_name().map(|n| n.to_string_lossy().into_owned());
            Ok((bytes, InputOrigin::Upload { filename }))
        }
        (None, Some(url)) => {
            let bytes = FileFetcher::new(timeout)?.fetch(url)?;
            Ok((bytes, InputOrigin::Url(url.clone())))
        }
        (None, None) => Err(AppError::new(2, "One of --input or --url is required.")),
    }
}

fn write_manifest_json(path: &Path, manifest: &crate::domain::Manifest) -> Result<(), AppError> {
    let file = fs::File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create {}: {e}", path.display())))?;
    serde_json::to_writer_pretty(file, manifest)
        .map_err(|e| AppError::new(2, format!("Failed to write {}: {e}", path.display())))
}

fn handle_serve(args: ServeArgs) -> Result<(), AppError> {
    let config = server_config_from_args(&args);
    let store = ArtifactStore::open(&args.files_dir)?;

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| AppError::new(4, format!("Failed to start async runtime: {e}")))?;
    runtime.block_on(crate::server::serve(config, store))
}

pub fn forecast_config_from_args(args: &ModelArgs) -> ForecastConfig {
    ForecastConfig {
        weekly: args.weekly,
        yearly: args.yearly,
        weekly_order: args.weekly_order,
        yearly_order: args.yearly_order,
        seasonality_prior_scale: args.prior_scale,
        parallel: !args.sequential,
        max_horizon_days: args.max_horizon_days,
    }
}

pub fn server_config_from_args(args: &ServeArgs) -> ServerConfig {
    let public_base_url = args
        .public_base_url
        .clone()
        .unwrap_or_else(|| format!("http://{}:{}", args.host, args.port));
    ServerConfig {
        host: args.host.clone(),
        port: args.port,
        public_base_url,
        fetch_timeout: Duration::from_secs(args.fetch_timeout_secs),
        forecast: forecast_config_from_args(&args.model),
    }
}
