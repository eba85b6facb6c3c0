//! Error types.
//!
//! - `AppError` is what the binary sees: a message plus a process exit code.
//! - `PipelineError` is the typed taxonomy raised by the pipeline stages.
//!
//! Row-level problems are never errors; they are collected as
//! `validate::RowRejection` values and reported alongside the results.

use thiserror::Error;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Fatal pipeline failures. Any of these aborts the current run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// One or more required columns are missing from an input file.
    #[error("Missing columns in {label}: {}", missing.join(", "))]
    Schema { label: String, missing: Vec<String> },

    /// The input file could not be read or is not well-formed CSV.
    #[error("Error reading file {label}: {reason}")]
    Parse { label: String, reason: String },

    /// A universe reference table could not be loaded.
    #[error("Error loading reference data '{label}': {reason}")]
    Reference { label: String, reason: String },

    /// The output workbook/report could not be written or read back.
    #[error("Error exporting results to '{path}': {reason}")]
    Export { path: String, reason: String },

    /// Submit was attempted before every input passed column validation.
    #[error("Please upload and validate all files before submitting (pending: {})", pending.join(", "))]
    NotReady { pending: Vec<String> },
}

impl PipelineError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Schema { .. } | Self::NotReady { .. } => 2,
            Self::Parse { .. } => 3,
            Self::Reference { .. } => 4,
            Self::Export { .. } => 5,
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}
