//! Schema normalization: `RawTable` → `NormalizedTable`.
//!
//! - the date column is found by name, ignoring case and surrounding whitespace
//! - every date cell must parse; the table is sorted by date
//! - every other column is coerced to numbers, unreadable cells become missing
//! - a column with no numeric cell at all is dropped and reported

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};

use crate::domain::{Cell, ExcludedSeries, ExclusionReason, NormalizedTable, RawTable, SeriesColumn};
use crate::error::PipelineError;

/// Text date formats accepted in the date column, tried in order.
///
/// Slash dates are read month-first, which is what spreadsheet exports in the
/// wild overwhelmingly use.
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m-%d-%Y", "%d.%m.%Y"];
const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S%.f",
];

/// Spreadsheet serials outside this window are not dates (1900-01-01 .. 9999-12-31).
const SERIAL_MIN: f64 = 1.0;
const SERIAL_MAX: f64 = 2_958_466.0;

/// Normalize a raw table.
pub fn normalize(raw: RawTable) -> Result<NormalizedTable, PipelineError> {
    let date_idx = find_date_column(&raw.headers).ok_or_else(|| PipelineError::MissingDateColumn {
        found: raw.headers.clone(),
    })?;

    // Blank rows (common at the bottom of exported sheets) carry no information.
    let rows: Vec<(usize, &Vec<Cell>)> = raw
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| !row.iter().all(Cell::is_empty))
        .collect();

    let mut dated = Vec::with_capacity(rows.len());
    for (idx, row) in rows {
        let cell = row.get(date_idx).unwrap_or(&Cell::Empty);
        // +2: header occupies row 1 and rows are 1-based.
        let date = parse_date_cell(cell).ok_or_else(|| PipelineError::InvalidDateFormat {
            row: idx + 2,
            value: cell_display(cell),
        })?;
        dated.push((date, row));
    }
    dated.sort_by_key(|(date, _)| *date);

    let mut columns = Vec::new();
    let mut dropped = Vec::new();
    for (col_idx, name) in raw.headers.iter().enumerate() {
        if col_idx == date_idx {
            continue;
        }

        let mut values = Vec::with_capacity(dated.len());
        let mut non_empty = 0usize;
        let mut numeric = 0usize;
        for (_, row) in &dated {
            let cell = row.get(col_idx).unwrap_or(&Cell::Empty);
            if !cell.is_empty() {
                non_empty += 1;
            }
            let value = coerce_number(cell);
            if value.is_some() {
                numeric += 1;
            }
            values.push(value);
        }

        if non_empty > 0 && numeric == 0 {
            tracing::warn!(column = %name, "dropping non-numeric column");
            dropped.push(ExcludedSeries {
                name: name.trim().to_string(),
                reason: ExclusionReason::NonNumeric,
            });
            continue;
        }

        columns.push(SeriesColumn {
            name: name.trim().to_string(),
            values,
        });
    }

    if columns.is_empty() {
        return Err(PipelineError::NoSeriesColumns);
    }

    Ok(NormalizedTable {
        source_date_header: raw.headers[date_idx].clone(),
        dates: dated.into_iter().map(|(date, _)| date).collect(),
        columns,
        dropped,
    })
}

fn find_date_column(headers: &[String]) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim_start_matches('\u{feff}').trim().eq_ignore_ascii_case("date"))
}

fn parse_date_cell(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::DateTime(dt) => Some(dt.date()),
        Cell::Number(serial) => serial_to_date(*serial),
        Cell::Text(s) => parse_date_text(s),
        Cell::Empty | Cell::Bool(_) => None,
    }
}

fn parse_date_text(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| parse_datetime_text(s).map(|dt| dt.date()))
}

/// Parse a timestamp, with optional fractional seconds and optional `Z`/offset.
///
/// Offsets are dropped, not applied: the wall-clock date as written is kept.
pub fn parse_datetime_text(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_local()))
}

/// Spreadsheet day serial (1900 date system) to a calendar date.
fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !(SERIAL_MIN..SERIAL_MAX).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}

fn coerce_number(cell: &Cell) -> Option<f64> {
    let value = match cell {
        Cell::Number(v) => *v,
        Cell::Text(s) => parse_number_text(s)?,
        Cell::Empty | Cell::Bool(_) | Cell::DateTime(_) => return None,
    };
    value.is_finite().then_some(value)
}

fn parse_number_text(s: &str) -> Option<f64> {
    let s = s.trim();
    if let Ok(v) = s.parse::<f64>() {
        return Some(v);
    }
    if is_grouped_number(s) {
        return s.replace(',', "").parse::<f64>().ok();
    }
    None
}

/// `1,234` / `-12,345,678.90`: comma groups of exactly three digits.
fn is_grouped_number(s: &str) -> bool {
    let s = s.strip_prefix('-').unwrap_or(s);
    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (s, None),
    };
    if let Some(frac) = frac_part {
        if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
    }
    let mut groups = int_part.split(',');
    let Some(lead) = groups.next() else {
        return false;
    };
    if lead.is_empty() || lead.len() > 3 || !lead.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let mut saw_group = false;
    for group in groups {
        if group.len() != 3 || !group.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        saw_group = true;
    }
    saw_group
}

fn cell_display(cell: &Cell) -> String {
    match cell {
        Cell::Empty => String::new(),
        Cell::Text(s) => s.clone(),
        Cell::Number(v) => v.to_string(),
        Cell::Bool(b) => b.to_string(),
        Cell::DateTime(dt) => dt.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn table(headers: &[&str], rows: Vec<Vec<Cell>>) -> RawTable {
        RawTable {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    #[test]
    fn padded_mixed_case_date_header_is_accepted() {
        let raw = table(
            &[" date ", "StoreA"],
            vec![vec![text("2025-01-02"), text("5")], vec![text("2025-01-01"), text("4")]],
        );
        let norm = normalize(raw).unwrap();
        assert_eq!(norm.source_date_header, " date ");
        // Sorted by date.
        assert_eq!(norm.dates[0], NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(norm.columns[0].values, vec![Some(4.0), Some(5.0)]);
    }

    #[test]
    fn missing_date_column_is_reported() {
        let raw = table(&["Day", "StoreA"], vec![vec![text("2025-01-01"), text("1")]]);
        let err = normalize(raw).unwrap_err();
        assert_eq!(
            err,
            PipelineError::MissingDateColumn {
                found: vec!["Day".to_string(), "StoreA".to_string()]
            }
        );
    }

    #[test]
    fn unparseable_date_names_the_row() {
        let raw = table(
            &["Date", "StoreA"],
            vec![vec![text("2025-01-01"), text("1")], vec![text("yesterday"), text("2")]],
        );
        let err = normalize(raw).unwrap_err();
        assert_eq!(
            err,
            PipelineError::InvalidDateFormat {
                row: 3,
                value: "yesterday".to_string()
            }
        );
    }

    #[test]
    fn accepts_serials_datetimes_and_us_dates() {
        let dt = NaiveDate::from_ymd_opt(2025, 1, 3)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let raw = table(
            &["Date", "A"],
            vec![
                vec![Cell::Number(45658.0), text("1")],
                vec![text("01/02/2025"), text("2")],
                vec![Cell::DateTime(dt), text("3")],
            ],
        );
        let norm = normalize(raw).unwrap();
        let expected: Vec<NaiveDate> = (1..=3)
            .map(|d| NaiveDate::from_ymd_opt(2025, 1, d).unwrap())
            .collect();
        assert_eq!(norm.dates, expected);
    }

    #[test]
    fn bad_cells_become_missing_and_text_columns_are_dropped() {
        let raw = table(
            &["Date", "Sales", "Notes", "Empty"],
            vec![
                vec![text("2025-01-01"), text("1,250"), text("promo"), Cell::Empty],
                vec![text("2025-01-02"), text("n/a"), text("closed"), Cell::Empty],
                vec![Cell::Empty, Cell::Empty, Cell::Empty, Cell::Empty],
            ],
        );
        let norm = normalize(raw).unwrap();
        assert_eq!(norm.dates.len(), 2);
        let names: Vec<&str> = norm.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Sales", "Empty"]);
        assert_eq!(norm.columns[0].values, vec![Some(1250.0), None]);
        assert_eq!(norm.dropped.len(), 1);
        assert_eq!(norm.dropped[0].name, "Notes");
        assert_eq!(norm.dropped[0].reason, ExclusionReason::NonNumeric);
    }

    #[test]
    fn no_numeric_columns_fails() {
        let raw = table(&["Date", "Notes"], vec![vec![text("2025-01-01"), text("x")]]);
        assert_eq!(normalize(raw).unwrap_err(), PipelineError::NoSeriesColumns);

        let raw = table(&["Date"], vec![vec![text("2025-01-01")]]);
        assert_eq!(normalize(raw).unwrap_err(), PipelineError::NoSeriesColumns);
    }

    #[test]
    fn timestamps_with_fractions_and_offsets_are_dates() {
        let jan1 = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        for value in [
            "2025-01-01 00:00:00.000",
            "2025-01-01T00:00:00.250",
            "2025-01-01T00:00:00Z",
            "2025-01-01T23:30:00-05:00",
            "2025-01-01T08:15:00.5+09:00",
        ] {
            assert_eq!(parse_date_text(value), Some(jan1), "{value}");
        }

        let raw = table(
            &["Date", "StoreA"],
            vec![
                vec![text("2025-01-02 00:00:00.000"), Cell::Number(10.0)],
                vec![text("2025-01-01T00:00:00Z"), Cell::Number(12.0)],
            ],
        );
        let norm = normalize(raw).unwrap();
        assert_eq!(norm.dates, vec![jan1, jan1.succ_opt().unwrap()]);
    }

    #[test]
    fn grouped_number_detection() {
        assert!(is_grouped_number("1,234"));
        assert!(is_grouped_number("-12,345,678.90"));
        assert!(!is_grouped_number("1,5"));
        assert!(!is_grouped_number("1234"));
        assert!(!is_grouped_number(",123"));
    }
}
