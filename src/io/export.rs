//! Serialize a `ResultTable` to an xlsx workbook.
//!
//! Layout consumers rely on:
//! - one sheet named `Forecast`, header row first
//! - column A holds true spreadsheet dates shown as `mm-dd-yyyy`
//! - every series column holds the unrounded prediction shown as `#,##0`

use chrono::NaiveDate;
use rust_xlsxwriter::{Format, Workbook, XlsxError};

use crate::domain::ResultTable;
use crate::error::PipelineError;

pub const SHEET_NAME: &str = "Forecast";
pub const DATE_NUM_FORMAT: &str = "mm-dd-yyyy";
pub const VALUE_NUM_FORMAT: &str = "#,##0";

/// Render the result table as xlsx bytes.
pub fn write_workbook(table: &ResultTable) -> Result<Vec<u8>, PipelineError> {
    build_workbook(table).map_err(|e| PipelineError::Export(e.to_string()))
}

fn build_workbook(table: &ResultTable) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let date_format = Format::new().set_num_format(DATE_NUM_FORMAT);
    let value_format = Format::new().set_num_format(VALUE_NUM_FORMAT);

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, header) in table.headers().iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, header, &header_format)?;
    }
    sheet.set_column_width(0, 12)?;

    for (i, date) in table.dates.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_number_with_format(row, 0, date_serial(*date), &date_format)?;
        for (c, column) in table.columns.iter().enumerate() {
            let value = column.values[i];
            if value.is_finite() {
                sheet.write_number_with_format(row, c as u16 + 1, value, &value_format)?;
            }
        }
    }

    workbook.save_to_buffer()
}

/// Spreadsheet day serial (1900 date system) of a calendar date.
pub fn date_serial(date: NaiveDate) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or(NaiveDate::MIN);
    (date - epoch).num_days() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Cell, DateRange, ForecastResult, InputOrigin};
    use crate::io::ingest::load_table;

    #[test]
    fn serial_of_known_dates() {
        assert_eq!(date_serial(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()), 45658.0);
        assert_eq!(date_serial(NaiveDate::from_ymd_opt(1900, 3, 1).unwrap()), 61.0);
    }

    #[test]
    fn workbook_reads_back_with_full_precision() {
        let range = DateRange::parse("2025-01-01", "2025-01-02").unwrap();
        let table = ResultTable {
            dates: range.dates(),
            columns: vec![ForecastResult {
                series: "StoreA".to_string(),
                values: vec![1234.567, 89.1],
            }],
        };
        let bytes = write_workbook(&table).unwrap();

        let loaded = load_table(&bytes, &InputOrigin::Upload { filename: None }).unwrap();
        assert_eq!(loaded.table.headers, vec!["Date", "StoreA"]);
        assert_eq!(loaded.table.rows.len(), 2);
        // Display format rounds; the stored value does not.
        assert_eq!(loaded.table.rows[0][1], Cell::Number(1234.567));
    }
}
