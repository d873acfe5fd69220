use thiserror::Error;

/// Application-level error carried up to `main`.
///
/// Exit codes:
/// - `2`: input/usage problems (bad range, unreadable file, I/O)
/// - `3`: data problems (missing columns, nothing to forecast)
/// - `4`: external failures (download, workbook serialization, server)
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Normalize,
    Reshape,
    Dispatch,
    Assemble,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Normalize => "normalize",
            Stage::Reshape => "reshape",
            Stage::Dispatch => "dispatch",
            Stage::Assemble => "assemble",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request-fatal failures of the forecast pipeline.
///
/// Per-series fit failures are not represented here: they are recorded in the
/// manifest as exclusions and the request carries on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Unreadable input: {0}")]
    UnreadableInput(String),

    #[error("Missing date column: no header matches `date` (found: {})", .found.join(", "))]
    MissingDateColumn { found: Vec<String> },

    #[error("Invalid date '{value}' in row {row}")]
    InvalidDateFormat { row: usize, value: String },

    #[error("No series columns: every non-date column is missing or non-numeric")]
    NoSeriesColumns,

    #[error("Insufficient data: no series has at least {min_points} observations")]
    InsufficientData { min_points: usize },

    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("No series could be forecast: {0}")]
    AllForecastsFailed(String),

    #[error("Failed to write workbook: {0}")]
    Export(String),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::UnreadableInput(_) => Stage::Load,
            PipelineError::MissingDateColumn { .. }
            | PipelineError::InvalidDateFormat { .. }
            | PipelineError::NoSeriesColumns => Stage::Normalize,
            PipelineError::InsufficientData { .. } => Stage::Reshape,
            PipelineError::InvalidDateRange(_) | PipelineError::AllForecastsFailed(_) => Stage::Dispatch,
            PipelineError::Export(_) => Stage::Assemble,
        }
    }

    /// Whether the caller supplied something unusable (as opposed to an internal failure).
    pub fn is_client_error(&self) -> bool {
        !matches!(self, PipelineError::Export(_))
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        let exit_code = match &err {
            PipelineError::UnreadableInput(_) | PipelineError::InvalidDateRange(_) => 2,
            PipelineError::MissingDateColumn { .. }
            | PipelineError::InvalidDateFormat { .. }
            | PipelineError::NoSeriesColumns
            | PipelineError::InsufficientData { .. }
            | PipelineError::AllForecastsFailed(_) => 3,
            PipelineError::Export(_) => 4,
        };
        AppError::new(exit_code, format!("[{}] {err}", err.stage()))
    }
}
