//! Payload ingest: bytes → `RawTable`.
//!
//! A payload is tried against an ordered list of formats (spreadsheet first,
//! then delimited text). Each attempt yields a tagged outcome so the caller can
//! report every reason when nothing fits. No I/O happens here: fetching and
//! uploads are handled by the transport layer.

use std::collections::HashMap;
use std::io::Cursor;

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use csv::StringRecord;

use crate::domain::{Cell, InputOrigin, RawTable};
use crate::error::PipelineError;
use crate::io::normalize::parse_datetime_text;

/// Table encodings the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Spreadsheet,
    Delimited,
}

impl TableFormat {
    pub fn label(self) -> &'static str {
        match self {
            TableFormat::Spreadsheet => "spreadsheet",
            TableFormat::Delimited => "delimited text",
        }
    }
}

/// Formats are attempted in this order; the first success wins.
pub const ATTEMPT_ORDER: [TableFormat; 2] = [TableFormat::Spreadsheet, TableFormat::Delimited];

/// Result of trying one format against a payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Parsed(RawTable),
    Rejected { format: TableFormat, reason: String },
}

/// A successfully loaded payload.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table: RawTable,
    pub format: TableFormat,
}

/// Delimiters considered when sniffing a text header line.
const DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Parse a payload into a raw table.
pub fn load_table(payload: &[u8], origin: &InputOrigin) -> Result<LoadedTable, PipelineError> {
    let mut reasons = Vec::with_capacity(ATTEMPT_ORDER.len());

    for format in ATTEMPT_ORDER {
        match attempt(format, payload) {
            ParseOutcome::Parsed(table) => {
                tracing::debug!(
                    %origin,
                    format = format.label(),
                    columns = table.headers.len(),
                    rows = table.rows.len(),
                    "payload parsed"
                );
                return Ok(LoadedTable { table, format });
            }
            ParseOutcome::Rejected { format, reason } => {
                tracing::debug!(%origin, format = format.label(), %reason, "format rejected");
                reasons.push(format!("not {} ({reason})", format.label()));
            }
        }
    }

    Err(PipelineError::UnreadableInput(format!(
        "{origin}: {}",
        reasons.join("; ")
    )))
}

/// Try a single format.
pub fn attempt(format: TableFormat, payload: &[u8]) -> ParseOutcome {
    let parsed = match format {
        TableFormat::Spreadsheet => parse_spreadsheet(payload),
        TableFormat::Delimited => parse_delimited(payload),
    };
    match parsed {
        Ok(table) => ParseOutcome::Parsed(table),
        Err(reason) => ParseOutcome::Rejected { format, reason },
    }
}

fn parse_spreadsheet(payload: &[u8]) -> Result<RawTable, String> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(payload)).map_err(|e| e.to_string())?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| "workbook has no worksheets".to_string())?
        .map_err(|e| e.to_string())?;

    let mut rows = range.rows();
    let header_row = rows.next().ok_or_else(|| "first worksheet is empty".to_string())?;
    let headers = clean_headers(header_row.iter().map(header_text).collect());

    let rows = rows
        .map(|row| row.iter().map(spreadsheet_cell).collect())
        .collect();

    Ok(RawTable { headers, rows })
}

fn spreadsheet_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) => text_cell(s),
        Data::Float(v) => Cell::Number(*v),
        Data::Int(v) => Cell::Number(*v as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) => Cell::DateTime(value),
            None => Cell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => match parse_datetime_text(s) {
            Some(value) => Cell::DateTime(value),
            None => text_cell(s),
        },
        Data::DurationIso(s) => text_cell(s),
    }
}

fn header_text(data: &Data) -> String {
    match data {
        Data::Empty | Data::Error(_) => String::new(),
        Data::Float(v) if v.fract() == 0.0 => format!("{v:.0}"),
        other => other.to_string(),
    }
}

fn parse_delimited(payload: &[u8]) -> Result<RawTable, String> {
    if payload.is_empty() {
        return Err("payload is empty".to_string());
    }
    if payload.contains(&0) {
        return Err("payload contains binary data".to_string());
    }
    let text = std::str::from_utf8(payload).map_err(|e| format!("payload is not UTF-8: {e}"))?;
    let text = text.trim_start_matches('\u{feff}');

    let delimiter = sniff_delimiter(text);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut records = reader.records();
    let header: StringRecord = loop {
        match records.next() {
            Some(Ok(record)) if record.iter().all(|f| f.trim().is_empty()) => continue,
            Some(Ok(record)) => break record,
            Some(Err(e)) => return Err(format!("header parse error: {e}")),
            None => return Err("no header row".to_string()),
        }
    };
    let headers = clean_headers(header.iter().map(str::to_string).collect());
    let width = headers.len();

    let mut rows = Vec::new();
    for (idx, result) in records.enumerate() {
        let record = result.map_err(|e| format!("parse error: {e}"))?;
        if record.len() > width {
            // +2: 1-based lines, header on line 1.
            return Err(format!(
                "line {} has {} fields, header has {width}",
                idx + 2,
                record.len()
            ));
        }
        let mut row: Vec<Cell> = record.iter().map(text_cell).collect();
        row.resize(width, Cell::Empty);
        rows.push(row);
    }

    Ok(RawTable { headers, rows })
}

/// Pick the candidate delimiter that occurs most often on the first non-blank line.
fn sniff_delimiter(text: &str) -> u8 {
    let Some(line) = text.lines().find(|l| !l.trim().is_empty()) else {
        return b',';
    };
    let mut best = (b',', 0usize);
    for &delim in &DELIMITERS {
        let count = line.bytes().filter(|&b| b == delim).count();
        if count > best.1 {
            best = (delim, count);
        }
    }
    best.0
}

fn text_cell(s: &str) -> Cell {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        Cell::Empty
    } else {
        Cell::Text(trimmed.to_string())
    }
}

/// Blank headers become `Unnamed: <idx>`; repeated names get `.1`, `.2`, ...
fn clean_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    raw.into_iter()
        .enumerate()
        .map(|(idx, name)| {
            let name = name.trim_start_matches('\u{feff}').trim();
            let base = if name.is_empty() {
                format!("Unnamed: {idx}")
            } else {
                name.to_string()
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let unique = if *count == 0 {
                base.clone()
            } else {
                format!("{base}.{count}")
            };
            *count += 1;
            unique
        })
        .collect()
}
