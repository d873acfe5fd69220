//! Result assembly and terminal reporting.
//!
//! - merge per-series predictions into the wide `ResultTable` (`assemble`)
//! - human-readable summaries and previews (`format`)

pub mod format;

pub use format::*;

use crate::domain::{DateRange, ExcludedSeries, Manifest, ResultTable};
use crate::fit::DispatchOutcome;

/// Build the wide result table and its manifest.
///
/// `excluded` holds what earlier stages set aside (non-numeric or too-short
/// columns); dispatcher failures are appended after them. Excluded series never
/// appear as columns.
pub fn assemble(range: &DateRange, outcome: DispatchOutcome, excluded: Vec<ExcludedSeries>) -> (ResultTable, Manifest) {
    let dates = range.dates();

    let manifest = Manifest {
        included_series: outcome.results.iter().map(|r| r.series.clone()).collect(),
        excluded_series: excluded.into_iter().chain(outcome.failed).collect(),
    };

    let table = ResultTable {
        dates,
        columns: outcome.results,
    };

    (table, manifest)
}
