//! Row-level cleaning.
//!
//! Two passes, in this order:
//!
//! 1. **Deduplication**: when the table has a `Holding Identifier` column, every
//!    row whose identifier occurs more than once is removed (all occurrences).
//! 2. **Typed cleaning** over the remaining rows: each declared field is coerced
//!    to its `FieldType`, and a row with any invalid cell is rejected.
//!
//! Nothing is dropped silently. Both groups land in `RejectedRows` so they can
//! be shown to the user.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use crate::domain::{COL_HOLDING_ID, FieldType};
use crate::error::PipelineError;
use crate::io::ingest::{RawRow, RawTable};
use crate::validate::columns::check_columns;

/// A typed cell of a cleaned row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Float(f64),
}

/// A row that passed cleaning. `values` follows the table's field order.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanRow {
    pub line: usize,
    pub values: Vec<Value>,
}

/// Output of `clean`: declared fields only, every cell well-typed.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanTable {
    pub label: String,
    pub fields: Vec<(String, FieldType)>,
    pub rows: Vec<CleanRow>,
}

impl CleanTable {
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(f, _)| f == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn text<'a>(&self, row: &'a CleanRow, name: &str) -> Option<&'a str> {
        match row.values.get(self.field_index(name)?)? {
            Value::Text(s) => Some(s),
            Value::Float(_) => None,
        }
    }

    pub fn float(&self, row: &CleanRow, name: &str) -> Option<f64> {
        match row.values.get(self.field_index(name)?)? {
            Value::Float(v) => Some(*v),
            Value::Text(_) => None,
        }
    }
}

/// Why a cell made its row invalid.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectionReason {
    /// Missing or whitespace-only value.
    Blank { field: String },
    /// A text field holding something that parses as a number.
    NumericText { field: String, value: String },
    /// A float field whose value doesn't parse as a finite number.
    NotANumber { field: String, value: String },
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::Blank { field } => write!(f, "`{field}` is blank"),
            RejectionReason::NumericText { field, value } => {
                write!(f, "`{field}` expects text but got number '{value}'")
            }
            RejectionReason::NotANumber { field, value } => {
                write!(f, "`{field}` expects a number but got '{value}'")
            }
        }
    }
}

/// A row removed by typed cleaning, with one reason per failing cell.
#[derive(Debug, Clone, PartialEq)]
pub struct RowRejection {
    pub row: RawRow,
    pub reasons: Vec<RejectionReason>,
}

/// The audit side-channel of `clean`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RejectedRows {
    pub label: String,
    /// Input headers, so the raw rows can be displayed as a table.
    pub headers: Vec<String>,
    /// Rows sharing a `Holding Identifier` with another row.
    pub duplicates: Vec<RawRow>,
    /// Rows with at least one invalid cell (after deduplication).
    pub invalid: Vec<RowRejection>,
}

impl RejectedRows {
    pub fn is_empty(&self) -> bool {
        self.duplicates.is_empty() && self.invalid.is_empty()
    }

    pub fn total(&self) -> usize {
        self.duplicates.len() + self.invalid.len()
    }
}

/// Clean `table` against `field_types`.
///
/// Fails only when a declared field isn't a column at all; row problems are
/// returned in `RejectedRows`.
pub fn clean(
    table: &RawTable,
    field_types: &[(&str, FieldType)],
    source_label: &str,
) -> Result<(CleanTable, RejectedRows), PipelineError> {
    let required: Vec<&str> = field_types.iter().map(|(name, _)| *name).collect();
    check_columns(&table.headers, &required, source_label)?;

    let mut rejected = RejectedRows {
        label: source_label.to_string(),
        headers: table.headers.clone(),
        ..RejectedRows::default()
    };

    let survivors = match table.column_index(COL_HOLDING_ID) {
        Some(id_idx) => {
            let (kept, duplicates) = split_duplicates(&table.rows, id_idx);
            if !duplicates.is_empty() {
                warn!(
                    label = source_label,
                    rows = duplicates.len(),
                    "Found duplicate 'Holding Identifiers' in file: {source_label}"
                );
            }
            rejected.duplicates = duplicates;
            kept
        }
        None => table.rows.iter().collect(),
    };

    // Column indices resolved once; `check_columns` guarantees they exist.
    let columns: Vec<(usize, &str, FieldType)> = field_types
        .iter()
        .filter_map(|(name, ty)| table.column_index(name).map(|idx| (idx, *name, *ty)))
        .collect();

    let mut rows = Vec::with_capacity(survivors.len());
    for raw in survivors {
        let mut values = Vec::with_capacity(columns.len());
        let mut reasons = Vec::new();

        for &(idx, name, ty) in &columns {
            match coerce_cell(raw.cell(idx), name, ty) {
                Ok(v) => values.push(v),
                Err(reason) => reasons.push(reason),
            }
        }

        if reasons.is_empty() {
            rows.push(CleanRow { line: raw.line, values });
        } else {
            rejected.invalid.push(RowRejection {
                row: raw.clone(),
                reasons,
            });
        }
    }

    if !rejected.invalid.is_empty() {
        warn!(
            label = source_label,
            rows = rejected.invalid.len(),
            "Invalid data detected in file: {source_label}"
        );
    }
    debug!(
        label = source_label,
        read = table.len(),
        kept = rows.len(),
        rejected = rejected.total(),
        "cleaned table"
    );

    let cleaned = CleanTable {
        label: source_label.to_string(),
        fields: field_types.iter().map(|(n, t)| (n.to_string(), *t)).collect(),
        rows,
    };
    Ok((cleaned, rejected))
}

/// Split rows into (unique-identifier rows, every row of a repeated identifier).
fn split_duplicates(rows: &[RawRow], id_idx: usize) -> (Vec<&RawRow>, Vec<RawRow>) {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        *counts.entry(row.cell(id_idx).trim()).or_default() += 1;
    }

    let mut kept = Vec::with_capacity(rows.len());
    let mut duplicates = Vec::new();
    for row in rows {
        if counts.get(row.cell(id_idx).trim()).copied().unwrap_or(0) > 1 {
            duplicates.push(row.clone());
        } else {
            kept.push(row);
        }
    }
    (kept, duplicates)
}

fn coerce_cell(raw: &str, field: &str, ty: FieldType) -> Result<Value, RejectionReason> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(RejectionReason::Blank {
            field: field.to_string(),
        });
    }

    match ty {
        FieldType::String => {
            if looks_numeric(text) {
                Err(RejectionReason::NumericText {
                    field: field.to_string(),
                    value: text.to_string(),
                })
            } else {
                Ok(Value::Text(text.to_string()))
            }
        }
        FieldType::Float => parse_finite(text).map(Value::Float).ok_or_else(|| RejectionReason::NotANumber {
            field: field.to_string(),
            value: text.to_string(),
        }),
    }
}

/// Any spelling that parses to a number, infinities included. `nan` is text.
fn looks_numeric(s: &str) -> bool {
    s.parse::<f64>().is_ok_and(|v| !v.is_nan())
}

/// `Some` only for finite numbers.
fn parse_finite(s: &str) -> Option<f64> {
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}
