//! Mathematical utilities: Fourier seasonal features and regularized least squares.

pub mod fourier;
pub mod ols;

pub use fourier::*;
pub use ols::*;
