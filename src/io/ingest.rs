//! Input ingest.
//!
//! Turns a CSV (or, via `io::xlsx`, spreadsheet) input file into a `RawTable`:
//! normalized headers plus the raw text of every record, tagged with its source
//! line. No typing happens here; the `validate` module owns column checks and
//! cleaning.
//!
//! Any failure to read the file, or a record that isn't well-formed CSV, is a
//! fatal `PipelineError::Parse` for the whole file.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::debug;

use crate::error::PipelineError;

/// One raw record of an input table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based line number in the source file (the header is line 1).
    pub line: usize,
    pub cells: Vec<String>,
}

impl RawRow {
    /// Cell text for a column index. Short records read as blank.
    pub fn cell(&self, idx: usize) -> &str {
        self.cells.get(idx).map(String::as_str).unwrap_or("")
    }
}

/// An input file as read from disk, before any cleaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    /// Label used in user-facing messages (e.g. `PublicEquity`).
    pub label: String,
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn new(label: impl Into<String>, headers: Vec<String>, rows: Vec<RawRow>) -> Self {
        Self {
            label: label.into(),
            headers,
            rows,
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read a whole input file into a `RawTable`.
///
/// Spreadsheet extensions go through `io::xlsx`; anything else is CSV.
pub fn read_table(path: &Path, label: &str) -> Result<RawTable, PipelineError> {
    if crate::io::xlsx::is_spreadsheet(path) {
        return crate::io::xlsx::read_sheet(path, label);
    }
    let file = File::open(path).map_err(|e| PipelineError::Parse {
        label: label.to_string(),
        reason: format!("failed to open '{}': {e}", path.display()),
    })?;
    let table = read_table_from_reader(file, label)?;
    debug!(label, path = %path.display(), rows = table.len(), "read input table");
    Ok(table)
}

pub fn read_table_from_reader<R: Read>(source: R, label: &str) -> Result<RawTable, PipelineError> {
    let mut reader = reader_builder().from_reader(source);

    let headers = normalize_headers(reader.headers().map_err(|e| parse_error(label, e))?);

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| parse_error(label, e))?;
        if is_blank_record(&record) {
            continue;
        }
        let line = record.position().map(|p| p.line() as usize).unwrap_or(idx + 2);
        rows.push(RawRow {
            line,
            cells: record.iter().map(str::to_string).collect(),
        });
    }

    Ok(RawTable::new(label, headers, rows))
}

fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    // Ragged records are malformed input, so keep the reader strict.
    builder.flexible(false).trim(csv::Trim::All);
    builder
}

fn normalize_headers(headers: &StringRecord) -> Vec<String> {
    headers.iter().map(normalize_header_name).collect()
}

pub(crate) fn normalize_header_name(name: &str) -> String {
    // Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on the
    // first header. If we don't strip it, column validation will incorrectly
    // report the first column as missing.
    name.trim_start_matches('\u{feff}').trim().to_string()
}

fn is_blank_record(record: &StringRecord) -> bool {
    record.iter().all(|cell| cell.trim().is_empty())
}

fn parse_error(label: &str, err: csv::Error) -> PipelineError {
    PipelineError::Parse {
        label: label.to_string(),
        reason: err.to_string(),
    }
}
