//! Forecast dispatch.
//!
//! Responsibilities:
//!
//! - validate the requested horizon
//! - fit one fresh model per series (parallel)
//! - collect predictions, or a reason when a series could not be forecast

pub mod dispatch;

pub use dispatch::*;
