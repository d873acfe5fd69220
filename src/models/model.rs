//! Model contract and the default seasonal-trend regression.
//!
//! The default model is additive:
//!
//! ```text
//! y(d) = β0 + β1·t(d) + Σ weekly Fourier terms + Σ yearly Fourier terms
//! ```
//!
//! with `t` the position of `d` inside the history span scaled to `[0, 1]` and
//! `y` scaled by its largest magnitude. Seasonal coefficients carry a ridge
//! penalty `1 / prior_scale²`, which keeps short histories from chasing noise;
//! the trend is unpenalized. Dates outside the history extrapolate the trend.

use chrono::NaiveDate;
use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use crate::domain::{ForecastConfig, MIN_HISTORY_POINTS, SeasonalityMode, Series};
use crate::math::{WEEKLY_PERIOD, YEARLY_PERIOD, epoch_days, fill_fourier, solve_ridge};

/// Weekly terms need two full cycles of history in `auto` mode.
const WEEKLY_MIN_SPAN_DAYS: i64 = 14;
/// Yearly terms need two full cycles of history in `auto` mode.
const YEARLY_MIN_SPAN_DAYS: i64 = 730;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("need at least {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("history covers a single date")]
    ZeroSpan,

    #[error("history contains non-finite values")]
    NonFinite,

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("least squares solve failed")]
    Singular,

    #[error("model must be fitted before predicting")]
    NotFitted,
}

/// A univariate model fitted on one series' history.
///
/// Instances are single-use: the dispatcher creates a fresh one per series.
pub trait ForecastModel {
    fn fit(&mut self, history: &Series) -> Result<(), ModelError>;

    /// One prediction per requested date, in the same order.
    fn predict(&self, dates: &[NaiveDate]) -> Result<Vec<f64>, ModelError>;
}

/// Builds fresh model instances; shared read-only across worker threads.
pub trait ModelFactory: Send + Sync {
    fn name(&self) -> &str;

    fn create(&self) -> Box<dyn ForecastModel>;
}

/// Default model factory.
#[derive(Debug, Clone)]
pub struct SeasonalTrendFactory {
    config: ForecastConfig,
}

impl SeasonalTrendFactory {
    pub fn new(config: &ForecastConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl ModelFactory for SeasonalTrendFactory {
    fn name(&self) -> &str {
        "seasonal-trend"
    }

    fn create(&self) -> Box<dyn ForecastModel> {
        Box::new(SeasonalTrendModel::new(&self.config))
    }
}

/// Linear trend + Fourier seasonality, fitted by ridge least squares.
#[derive(Debug, Clone)]
pub struct SeasonalTrendModel {
    weekly: SeasonalityMode,
    yearly: SeasonalityMode,
    weekly_order: usize,
    yearly_order: usize,
    prior_scale: f64,
    fitted: Option<Fitted>,
}

#[derive(Debug, Clone)]
struct Fitted {
    weekly_order: usize,
    yearly_order: usize,
    start_day: f64,
    span_days: f64,
    y_scale: f64,
    betas: Vec<f64>,
}

impl Fitted {
    fn width(&self) -> usize {
        design_width(self.weekly_order, self.yearly_order)
    }
}

impl SeasonalTrendModel {
    pub fn new(config: &ForecastConfig) -> Self {
        Self {
            weekly: config.weekly,
            yearly: config.yearly,
            weekly_order: config.weekly_order,
            yearly_order: config.yearly_order,
            prior_scale: config.seasonality_prior_scale,
            fitted: None,
        }
    }
}

impl ForecastModel for SeasonalTrendModel {
    fn fit(&mut self, history: &Series) -> Result<(), ModelError> {
        if history.len() < MIN_HISTORY_POINTS {
            return Err(ModelError::InsufficientData {
                required: MIN_HISTORY_POINTS,
                actual: history.len(),
            });
        }
        if !(self.prior_scale.is_finite() && self.prior_scale > 0.0) {
            return Err(ModelError::InvalidParameter {
                name: "seasonality_prior_scale",
                reason: format!("must be finite and > 0, got {}", self.prior_scale),
            });
        }
        if history.points.iter().any(|(_, y)| !y.is_finite()) {
            return Err(ModelError::NonFinite);
        }

        let span = history.span_days();
        if span <= 0 {
            return Err(ModelError::ZeroSpan);
        }

        let weekly_order = resolve_order(self.weekly, self.weekly_order, span, WEEKLY_MIN_SPAN_DAYS);
        let yearly_order = resolve_order(self.yearly, self.yearly_order, span, YEARLY_MIN_SPAN_DAYS);

        let y_scale = history
            .points
            .iter()
            .map(|(_, y)| y.abs())
            .fold(0.0, f64::max);
        let y_scale = if y_scale > 0.0 { y_scale } else { 1.0 };

        let start_day = history.first_date().map(epoch_days).ok_or(ModelError::ZeroSpan)?;
        let mut fitted = Fitted {
            weekly_order,
            yearly_order,
            start_day,
            span_days: span as f64,
            y_scale,
            betas: Vec::new(),
        };

        let n = history.len();
        let p = fitted.width();
        let mut x = DMatrix::<f64>::zeros(n, p);
        let mut row = vec![0.0; p];
        for (i, (date, _)) in history.points.iter().enumerate() {
            fill_design_row(&fitted, *date, &mut row);
            for (j, v) in row.iter().enumerate() {
                x[(i, j)] = *v;
            }
        }
        let y = DVector::from_iterator(n, history.points.iter().map(|(_, y)| y / y_scale));

        let lambda = 1.0 / (self.prior_scale * self.prior_scale);
        let penalties: Vec<f64> = (0..p).map(|j| if j < 2 { 0.0 } else { lambda }).collect();

        let betas = solve_ridge(&x, &y, &penalties).ok_or(ModelError::Singular)?;
        fitted.betas = betas.iter().copied().collect();

        tracing::debug!(
            series = %history.name,
            n,
            weekly_order,
            yearly_order,
            "seasonal-trend model fitted"
        );

        self.fitted = Some(fitted);
        Ok(())
    }

    fn predict(&self, dates: &[NaiveDate]) -> Result<Vec<f64>, ModelError> {
        let fitted = self.fitted.as_ref().ok_or(ModelError::NotFitted)?;
        let mut row = vec![0.0; fitted.width()];
        dates
            .iter()
            .map(|date| {
                fill_design_row(fitted, *date, &mut row);
                let scaled: f64 = row.iter().zip(&fitted.betas).map(|(x, b)| x * b).sum();
                let y = scaled * fitted.y_scale;
                if y.is_finite() { Ok(y) } else { Err(ModelError::NonFinite) }
            })
            .collect()
    }
}

fn resolve_order(mode: SeasonalityMode, order: usize, span_days: i64, min_span_days: i64) -> usize {
    match mode {
        SeasonalityMode::Off => 0,
        SeasonalityMode::On => order,
        SeasonalityMode::Auto if span_days >= min_span_days => order,
        SeasonalityMode::Auto => 0,
    }
}

fn design_width(weekly_order: usize, yearly_order: usize) -> usize {
    2 + 2 * weekly_order + 2 * yearly_order
}

/// Fill a design row: intercept, trend, weekly terms, yearly terms.
fn fill_design_row(fitted: &Fitted, date: NaiveDate, out: &mut [f64]) {
    let day = epoch_days(date);
    out[0] = 1.0;
    out[1] = (day - fitted.start_day) / fitted.span_days;

    let weekly_end = 2 + 2 * fitted.weekly_order;
    fill_fourier(day, WEEKLY_PERIOD, fitted.weekly_order, &mut out[2..weekly_end]);
    fill_fourier(day, YEARLY_PERIOD, fitted.yearly_order, &mut out[weekly_end..]);
}
