//! Per-series forecast fan-out.
//!
//! Each series gets its own model instance from the factory; nothing is shared
//! between series apart from the read-only factory and date list. Series that
//! fail to fit are skipped and reported, the same way for every caller.

use rayon::prelude::*;

use crate::domain::{DateRange, ExcludedSeries, ExclusionReason, ForecastConfig, ForecastResult, Series};
use crate::error::PipelineError;
use crate::models::ModelFactory;

/// Predictions for every series that could be forecast, plus the ones that could not.
#[derive(Debug, Clone, Default)]
pub struct DispatchOutcome {
    /// In input series order.
    pub results: Vec<ForecastResult>,
    /// In input series order.
    pub failed: Vec<ExcludedSeries>,
}

/// Reject ranges longer than the configured horizon limit.
pub fn check_horizon(range: &DateRange, config: &ForecastConfig) -> Result<(), PipelineError> {
    if range.len() > config.max_horizon_days {
        return Err(PipelineError::InvalidDateRange(format!(
            "{} to {} spans {} days, limit is {}",
            range.start(),
            range.end(),
            range.len(),
            config.max_horizon_days
        )));
    }
    Ok(())
}

/// Forecast every series over `range`.
///
/// With `parallel` set the fits run on the rayon pool; the call returns only
/// once every series has either produced predictions or been skipped.
pub fn dispatch(series: &[Series], range: &DateRange, factory: &dyn ModelFactory, parallel: bool) -> DispatchOutcome {
    let dates = range.dates();

    let outcomes: Vec<Result<ForecastResult, ExcludedSeries>> = if parallel {
        series
            .par_iter()
            .map(|s| forecast_series(s, &dates, factory))
            .collect()
    } else {
        series
            .iter()
            .map(|s| forecast_series(s, &dates, factory))
            .collect()
    };

    let mut outcome = DispatchOutcome::default();
    for result in outcomes {
        match result {
            Ok(forecast) => outcome.results.push(forecast),
            Err(excluded) => outcome.failed.push(excluded),
        }
    }
    outcome
}

fn forecast_series(
    series: &Series,
    dates: &[chrono::NaiveDate],
    factory: &dyn ModelFactory,
) -> Result<ForecastResult, ExcludedSeries> {
    let fail = |reason: String| {
        tracing::warn!(series = %series.name, model = factory.name(), %reason, "series forecast failed");
        ExcludedSeries {
            name: series.name.clone(),
            reason: ExclusionReason::ForecastFailed(reason),
        }
    };

    let mut model = factory.create();
    model.fit(series).map_err(|e| fail(format!("fit: {e}")))?;
    let values = model.predict(dates).map_err(|e| fail(format!("predict: {e}")))?;

    if values.len() != dates.len() {
        return Err(fail(format!(
            "model returned {} values for {} dates",
            values.len(),
            dates.len()
        )));
    }
    if let Some(idx) = values.iter().position(|v| !v.is_finite()) {
        return Err(fail(format!("non-finite prediction for {}", dates[idx])));
    }

    tracing::debug!(series = %series.name, points = series.len(), horizon = dates.len(), "series forecast");
    Ok(ForecastResult {
        series: series.name.clone(),
        values,
    })
}
