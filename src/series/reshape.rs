//! Wide → long → per-series reshaping.
//!
//! The normalized table is melted into `(date, series, value)` records with
//! missing values dropped, then regrouped into one `Series` per column in the
//! original column order.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::{ExcludedSeries, ExclusionReason, MIN_HISTORY_POINTS, NormalizedTable, Series};
use crate::error::PipelineError;

/// One observation in long format.
#[derive(Debug, Clone, PartialEq)]
pub struct LongRecord {
    pub date: NaiveDate,
    /// Index of the series column in the normalized table.
    pub column: usize,
    pub value: f64,
}

/// Series eligible for forecasting plus everything that was set aside.
#[derive(Debug, Clone)]
pub struct Reshaped {
    pub series: Vec<Series>,
    /// Exclusions in input column order (normalizer drops first).
    pub excluded: Vec<ExcludedSeries>,
}

/// Melt the wide table into long records, skipping missing cells.
pub fn melt(table: &NormalizedTable) -> Vec<LongRecord> {
    table
        .columns
        .iter()
        .enumerate()
        .flat_map(|(column, col)| {
            table
                .dates
                .iter()
                .zip(&col.values)
                .filter_map(move |(date, value)| {
                    value.map(|value| LongRecord {
                        date: *date,
                        column,
                        value,
                    })
                })
        })
        .collect()
}

/// Split the normalized table into forecastable series.
pub fn reshape(table: &NormalizedTable) -> Result<Reshaped, PipelineError> {
    // Per column: date -> (sum, count), so repeated dates collapse to their mean.
    let mut grouped: Vec<BTreeMap<NaiveDate, (f64, usize)>> = vec![BTreeMap::new(); table.columns.len()];
    for record in melt(table) {
        let slot = grouped[record.column].entry(record.date).or_insert((0.0, 0));
        slot.0 += record.value;
        slot.1 += 1;
    }

    let mut series = Vec::new();
    let mut excluded = table.dropped.clone();
    for (col, observations) in table.columns.iter().zip(grouped) {
        let points: Vec<(NaiveDate, f64)> = observations
            .into_iter()
            .map(|(date, (sum, count))| (date, sum / count as f64))
            .collect();

        if points.len() < MIN_HISTORY_POINTS {
            tracing::warn!(series = %col.name, points = points.len(), "series has too little history");
            excluded.push(ExcludedSeries {
                name: col.name.clone(),
                reason: ExclusionReason::InsufficientData { points: points.len() },
            });
            continue;
        }

        series.push(Series {
            name: col.name.clone(),
            points,
        });
    }

    if series.is_empty() {
        return Err(PipelineError::InsufficientData {
            min_points: MIN_HISTORY_POINTS,
        });
    }

    Ok(Reshaped { series, excluded })
}
