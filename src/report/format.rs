//! Formatted terminal output.
//!
//! Numbers are shown the way the exported workbook displays them: rounded,
//! thousands-grouped integers. Dates use the workbook's `mm-dd-yyyy` layout.

use crate::domain::{Manifest, ResultTable};
use crate::io::ingest::TableFormat;

/// Render a value as a rounded integer with `,` thousands separators.
pub fn format_grouped(value: f64) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());

    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0.0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Summary of a finished run.
pub fn format_run_summary(table: &ResultTable, manifest: &Manifest, format: TableFormat) -> String {
    let mut out = String::new();

    out.push_str("=== storecast - forecast ===\n");
    out.push_str(&format!("Input: {}\n", format.label()));
    if let (Some(first), Some(last)) = (table.dates.first(), table.dates.last()) {
        out.push_str(&format!(
            "Range: {first} .. {last} ({} days)\n",
            table.row_count()
        ));
    }
    out.push_str(&format!(
        "Series: {} forecast, {} excluded\n",
        manifest.included_count(),
        manifest.excluded_count()
    ));

    for name in &manifest.included_series {
        out.push_str(&format!("  + {name}\n"));
    }
    for excluded in &manifest.excluded_series {
        out.push_str(&format!("  - {}: {}\n", excluded.name, excluded.reason));
    }

    out
}

/// First `rows` rows of the result table as an aligned text grid.
pub fn format_preview(table: &ResultTable, rows: usize) -> String {
    let headers = table.headers();
    let mut grid: Vec<Vec<String>> = vec![headers];
    for (i, date) in table.dates.iter().take(rows).enumerate() {
        let mut line = vec![date.format("%m-%d-%Y").to_string()];
        line.extend(table.columns.iter().map(|c| format_grouped(c.values[i])));
        grid.push(line);
    }

    let ncols = grid[0].len();
    let widths: Vec<usize> = (0..ncols)
        .map(|c| grid.iter().map(|r| r[c].chars().count()).max().unwrap_or(0))
        .collect();

    let mut out = String::new();
    for row in &grid {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(c, cell)| {
                if c == 0 {
                    format!("{cell:<width$}", width = widths[c])
                } else {
                    format!("{cell:>width$}", width = widths[c])
                }
            })
            .collect();
        out.push_str(cells.join("  ").trim_end());
        out.push('\n');
    }
    if table.row_count() > rows {
        out.push_str(&format!("... {} more rows\n", table.row_count() - rows));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DateRange, ExcludedSeries, ExclusionReason, ForecastResult};

    #[test]
    fn grouped_integers() {
        assert_eq!(format_grouped(0.4), "0");
        assert_eq!(format_grouped(999.5), "1,000");
        assert_eq!(format_grouped(1234567.89), "1,234,568");
        assert_eq!(format_grouped(-4321.2), "-4,321");
        assert_eq!(format_grouped(f64::NAN), "-");
    }

    #[test]
    fn preview_formats_dates_and_numbers() {
        let range = DateRange::parse("2025-01-01", "2025-01-03").unwrap();
        let table = ResultTable {
            dates: range.dates(),
            columns: vec![ForecastResult {
                series: "StoreA".to_string(),
                values: vec![1500.2, 1600.7, 1700.0],
            }],
        };
        let preview = format_preview(&table, 2);
        let lines: Vec<&str> = preview.lines().collect();
        assert_eq!(lines[0], "Date        StoreA");
        assert_eq!(lines[1], "01-01-2025   1,500");
        assert_eq!(lines[2], "01-02-2025   1,601");
        assert_eq!(lines[3], "... 1 more rows");
    }

    #[test]
    fn summary_lists_exclusions() {
        let table = ResultTable {
            dates: Vec::new(),
            columns: Vec::new(),
        };
        let manifest = Manifest {
            included_series: vec!["StoreA".to_string()],
            excluded_series: vec![ExcludedSeries {
                name: "StoreB".to_string(),
                reason: ExclusionReason::NonNumeric,
            }],
        };
        let summary = format_run_summary(&table, &manifest, TableFormat::Delimited);
        assert!(summary.contains("Series: 1 forecast, 1 excluded"));
        assert!(summary.contains("  - StoreB: non-numeric column"));
    }
}
