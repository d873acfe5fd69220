//! Shared domain types.
//!
//! Tables move through the pipeline by value: each stage consumes the previous
//! stage's output and nothing is shared between requests.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::PipelineError;

/// Fewest historical observations a series needs to be forecast.
pub const MIN_HISTORY_POINTS: usize = 2;

/// Header used for the date column in every table the pipeline produces.
pub const DATE_HEADER: &str = "Date";

/// One untyped cell as read from a spreadsheet or delimited file.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

/// Rectangular table straight out of the loader. Column order is preserved and
/// every row has exactly `headers.len()` cells.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// Where a payload came from. Only used for diagnostics; parsing never depends on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOrigin {
    Url(String),
    Upload { filename: Option<String> },
}

impl std::fmt::Display for InputOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputOrigin::Url(url) => write!(f, "url {url}"),
            InputOrigin::Upload { filename: Some(name) } => write!(f, "upload '{name}'"),
            InputOrigin::Upload { filename: None } => write!(f, "upload"),
        }
    }
}

/// A numeric series column of the normalized table, aligned with `NormalizedTable::dates`.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Date column + numeric series columns, rows sorted by date.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable {
    /// Header of the date column as it appeared in the input (e.g. `" date "`).
    pub source_date_header: String,
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<SeriesColumn>,
    /// Columns dropped because none of their cells were numeric.
    pub dropped: Vec<ExcludedSeries>,
}

/// A named history of daily observations.
///
/// Invariant: dates are strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub points: Vec<(NaiveDate, f64)>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|(d, _)| *d)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|(d, _)| *d)
    }

    /// Days between the first and last observation.
    pub fn span_days(&self) -> i64 {
        match (self.first_date(), self.last_date()) {
            (Some(a), Some(b)) => (b - a).num_days(),
            _ => 0,
        }
    }
}

/// Inclusive daily date range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, PipelineError> {
        if start > end {
            return Err(PipelineError::InvalidDateRange(format!(
                "start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse two `YYYY-MM-DD` boundary dates.
    pub fn parse(start: &str, end: &str) -> Result<Self, PipelineError> {
        let start = parse_boundary("start", start)?;
        let end = parse_boundary("end", end)?;
        Self::new(start, end)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days in the range, both ends included.
    pub fn len(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        (0..self.len() as i64)
            .map(|i| self.start + Duration::days(i))
            .collect()
    }
}

fn parse_boundary(which: &str, value: &str) -> Result<NaiveDate, PipelineError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        PipelineError::InvalidDateRange(format!(
            "{which} date '{value}' is not a YYYY-MM-DD date"
        ))
    })
}

/// Predictions for one series, one value per date of the requested range.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastResult {
    pub series: String,
    pub values: Vec<f64>,
}

/// Wide output table: the range dates plus one column per forecast series.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<ForecastResult>,
}

impl ResultTable {
    pub fn row_count(&self) -> usize {
        self.dates.len()
    }

    /// Header row: `Date` followed by the series names in input order.
    pub fn headers(&self) -> Vec<String> {
        std::iter::once(DATE_HEADER.to_string())
            .chain(self.columns.iter().map(|c| c.series.clone()))
            .collect()
    }
}

/// Why a series is missing from the result.
#[derive(Debug, Clone, PartialEq)]
pub enum ExclusionReason {
    /// No cell of the column could be read as a number.
    NonNumeric,
    /// Fewer than `MIN_HISTORY_POINTS` observations after dropping missing values.
    InsufficientData { points: usize },
    /// The model could not fit or predict this series.
    ForecastFailed(String),
}

impl std::fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExclusionReason::NonNumeric => write!(f, "non-numeric column"),
            ExclusionReason::InsufficientData { points } => write!(
                f,
                "insufficient data: {points} point(s), need at least {MIN_HISTORY_POINTS}"
            ),
            ExclusionReason::ForecastFailed(reason) => write!(f, "forecast failed: {reason}"),
        }
    }
}

impl Serialize for ExclusionReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExcludedSeries {
    pub name: String,
    pub reason: ExclusionReason,
}

/// Which series made it into the result and which did not.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Manifest {
    pub included_series: Vec<String>,
    pub excluded_series: Vec<ExcludedSeries>,
}

impl Manifest {
    pub fn included_count(&self) -> usize {
        self.included_series.len()
    }

    pub fn excluded_count(&self) -> usize {
        self.excluded_series.len()
    }
}

/// Whether a seasonal component is fitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SeasonalityMode {
    /// Enable when the history is long enough to identify the cycle.
    Auto,
    On,
    Off,
}

/// Knobs for the default model and the dispatcher.
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    pub weekly: SeasonalityMode,
    pub yearly: SeasonalityMode,
    /// Fourier order of the weekly component.
    pub weekly_order: usize,
    /// Fourier order of the yearly component.
    pub yearly_order: usize,
    /// Prior scale of the seasonal coefficients; smaller means stronger shrinkage.
    pub seasonality_prior_scale: f64,
    /// Fit series on the rayon pool instead of one after another.
    pub parallel: bool,
    /// Longest accepted forecast range, in days.
    pub max_horizon_days: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            weekly: SeasonalityMode::Auto,
            yearly: SeasonalityMode::On,
            weekly_order: 3,
            yearly_order: 10,
            seasonality_prior_scale: 1.0,
            parallel: true,
            max_horizon_days: 3660,
        }
    }
}
