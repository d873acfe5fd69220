//! Turning a normalized table into independent per-series histories.

pub mod reshape;

pub use reshape::*;
