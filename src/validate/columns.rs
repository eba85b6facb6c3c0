//! Required-column checks.
//!
//! This is the pre-submission gate: a file that fails here never reaches
//! cleaning.

use tracing::warn;

use crate::error::PipelineError;
use crate::io::ingest::RawTable;

/// Required names absent from `headers`, in required order.
pub fn missing_columns(headers: &[String], required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|name| !headers.iter().any(|h| h == *name))
        .map(|name| name.to_string())
        .collect()
}

/// `true` when every required field is a column of `table`.
///
/// Misses are reported through the log, never raised.
pub fn validate(table: &RawTable, required: &[&str]) -> bool {
    let missing = missing_columns(&table.headers, required);
    if missing.is_empty() {
        return true;
    }
    warn!(label = %table.label, missing = %missing.join(", "), "missing required columns");
    false
}

/// Same check as `validate`, as a typed error carrying the missing names.
pub fn check_columns(headers: &[String], required: &[&str], label: &str) -> Result<(), PipelineError> {
    let missing = missing_columns(headers, required);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::Schema {
            label: label.to_string(),
            missing,
        })
    }
}
