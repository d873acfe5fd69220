//! `storecast` library crate.
//!
//! The binary (`storecast`) is a thin wrapper around this library so that:
//!
//! - the pipeline is testable without spawning processes
//! - the CLI and the HTTP service share one `run_forecast` entry point

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
pub mod series;
pub mod server;
