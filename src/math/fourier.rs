//! Fourier features for seasonal cycles.
//!
//! A cycle of period `P` days at order `K` contributes `2K` features:
//!
//! `sin(2πk·d/P), cos(2πk·d/P)` for `k = 1..=K`
//!
//! where `d` is the number of days since a fixed epoch, so the phase of a date
//! does not depend on where the history happens to start.

use std::f64::consts::PI;

use chrono::NaiveDate;

pub const WEEKLY_PERIOD: f64 = 7.0;
pub const YEARLY_PERIOD: f64 = 365.25;

/// Days since 1970-01-01 (may be negative).
pub fn epoch_days(date: NaiveDate) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN);
    (date - epoch).num_days() as f64
}

/// Write the `2 * order` features of one cycle into `out`.
///
/// # Panics
/// Panics if `out.len() < 2 * order`.
pub fn fill_fourier(day: f64, period: f64, order: usize, out: &mut [f64]) {
    for k in 0..order {
        let angle = 2.0 * PI * (k as f64 + 1.0) * day / period;
        out[2 * k] = angle.sin();
        out[2 * k + 1] = angle.cos();
    }
}
