//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - loader/normalizer tables (`RawTable`, `NormalizedTable`)
//! - per-series history and predictions (`Series`, `ForecastResult`)
//! - the request range and outputs (`DateRange`, `ResultTable`, `Manifest`)
//! - model configuration (`ForecastConfig`)

pub mod types;

pub use types::*;
