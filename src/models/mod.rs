//! Forecasting models.
//!
//! The dispatcher only sees the `ForecastModel` / `ModelFactory` traits; the
//! seasonal-trend regression in `model` is the default implementation.

pub mod model;

pub use model::*;
