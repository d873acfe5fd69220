//! The forecast pipeline shared by the CLI and the HTTP service.
//!
//! load -> normalize -> reshape -> dispatch -> assemble -> export
//!
//! Bytes in, bytes out: storing or delivering the workbook is up to the caller.

use crate::domain::{DateRange, ForecastConfig, InputOrigin, Manifest, ResultTable};
use crate::error::PipelineError;
use crate::fit::{check_horizon, dispatch};
use crate::io::ingest::{TableFormat, load_table};
use crate::io::{normalize, write_workbook};
use crate::models::{ModelFactory, SeasonalTrendFactory};
use crate::report::assemble;
use crate::series::reshape;

/// All outputs of one pipeline invocation.
#[derive(Debug, Clone)]
pub struct ForecastRun {
    pub input_format: TableFormat,
    pub table: ResultTable,
    pub manifest: Manifest,
    /// xlsx bytes of `table`.
    pub workbook: Vec<u8>,
}

/// Run the pipeline with the default model.
pub fn run_forecast(
    payload: &[u8],
    origin: &InputOrigin,
    range: &DateRange,
    config: &ForecastConfig,
) -> Result<ForecastRun, PipelineError> {
    let factory = SeasonalTrendFactory::new(config);
    run_forecast_with(payload, origin, range, config, &factory)
}

/// Run the pipeline with a caller-supplied model factory.
pub fn run_forecast_with(
    payload: &[u8],
    origin: &InputOrigin,
    range: &DateRange,
    config: &ForecastConfig,
    factory: &dyn ModelFactory,
) -> Result<ForecastRun, PipelineError> {
    // Range problems are caught before touching the payload.
    check_horizon(range, config)?;

    let loaded = load_table(payload, origin)?;
    let input_format = loaded.format;

    let normalized = normalize(loaded.table)?;
    tracing::info!(
        date_column = %normalized.source_date_header,
        rows = normalized.dates.len(),
        columns = normalized.columns.len(),
        dropped = normalized.dropped.len(),
        "table normalized"
    );

    let reshaped = reshape(&normalized)?;
    drop(normalized);

    let outcome = dispatch(&reshaped.series, range, factory, config.parallel);
    let (table, manifest) = assemble(range, outcome, reshaped.excluded);
    tracing::info!(
        model = factory.name(),
        start = %range.start(),
        end = %range.end(),
        included = manifest.included_count(),
        excluded = manifest.excluded_count(),
        "forecast assembled"
    );

    // Every series failed in the model: nothing to hand back.
    if table.columns.is_empty() {
        let reasons: Vec<String> = manifest
            .excluded_series
            .iter()
            .map(|e| format!("{}: {}", e.name, e.reason))
            .collect();
        return Err(PipelineError::AllForecastsFailed(reasons.join("; ")));
    }

    let workbook = write_workbook(&table)?;

    Ok(ForecastRun {
        input_format,
        table,
        manifest,
        workbook,
    })
}
