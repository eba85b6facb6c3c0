//! Submission lifecycle.
//!
//! A `Session` holds the three input slots and the run state:
//!
//! ```text
//! AwaitingInputs --(all three valid)--> ReadyToSubmit --submit--> Processing
//!       ^                                     ^                       |
//!       +------------- input change ----------+            Complete / Failed
//! ```
//!
//! Any input change re-validates that slot and re-derives readiness, dropping
//! results from an earlier run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::app::pipeline::{RunOutput, run_pipeline};
use crate::domain::{InputKind, RunConfig, RunInputs};
use crate::error::PipelineError;
use crate::io::ingest::read_table;
use crate::io::universe::ReferenceData;
use crate::validate::{missing_columns, validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    AwaitingInputs,
    ReadyToSubmit,
    Processing,
    Complete,
    Failed,
}

/// Column-validation result of one attached file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputStatus {
    Valid,
    MissingColumns(Vec<String>),
    Unreadable(String),
}

#[derive(Debug, Clone)]
struct InputSlot {
    path: PathBuf,
    status: InputStatus,
}

#[derive(Debug)]
pub struct Session {
    slots: BTreeMap<InputKind, InputSlot>,
    state: RunState,
    output: Option<RunOutput>,
    last_error: Option<PipelineError>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            slots: BTreeMap::new(),
            state: RunState::AwaitingInputs,
            output: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn status(&self, kind: InputKind) -> Option<&InputStatus> {
        self.slots.get(&kind).map(|s| &s.status)
    }

    /// Results of the last successful run. `None` unless `Complete`.
    pub fn output(&self) -> Option<&RunOutput> {
        self.output.as_ref()
    }

    /// Cause of the last failed run.
    pub fn last_error(&self) -> Option<&PipelineError> {
        self.last_error.as_ref()
    }

    /// Attach (or replace) an input file and validate its columns.
    ///
    /// The slot is kept even when validation fails, so the caller can show
    /// per-file feedback. The error is also returned.
    pub fn attach(&mut self, kind: InputKind, path: impl AsRef<Path>) -> Result<(), PipelineError> {
        let path = path.as_ref().to_path_buf();
        let required = kind.required_fields();

        let (status, result) = match read_table(&path, kind.label()) {
            Ok(table) if validate(&table, &required) => (InputStatus::Valid, Ok(())),
            Ok(table) => {
                let missing = missing_columns(&table.headers, &required);
                let err = PipelineError::Schema {
                    label: kind.label().to_string(),
                    missing: missing.clone(),
                };
                (InputStatus::MissingColumns(missing), Err(err))
            }
            Err(err) => (InputStatus::Unreadable(err.to_string()), Err(err)),
        };

        self.slots.insert(kind, InputSlot { path, status });
        self.input_changed();
        result
    }

    pub fn detach(&mut self, kind: InputKind) {
        if self.slots.remove(&kind).is_some() {
            self.input_changed();
        }
    }

    /// Inputs that are missing or failed validation, in input order.
    pub fn pending(&self) -> Vec<String> {
        InputKind::ALL
            .iter()
            .filter(|k| !matches!(self.status(**k), Some(InputStatus::Valid)))
            .map(|k| k.label().to_string())
            .collect()
    }

    pub fn is_ready(&self) -> bool {
        self.pending().is_empty()
    }

    /// Run the pipeline over the attached inputs.
    ///
    /// Fails with `NotReady` (state unchanged) unless all three inputs are
    /// valid. A pipeline failure moves the session to `Failed` and exposes no
    /// results.
    pub fn submit(&mut self, reference: &ReferenceData, config: &RunConfig) -> Result<&RunOutput, PipelineError> {
        let inputs = self.inputs().ok_or_else(|| PipelineError::NotReady {
            pending: self.pending(),
        })?;

        self.state = RunState::Processing;
        self.output = None;
        self.last_error = None;
        info!("processing submission");

        match run_pipeline(&inputs, reference, config) {
            Ok(output) => {
                self.state = RunState::Complete;
                Ok(&*self.output.insert(output))
            }
            Err(err) => {
                warn!(error = %err, "run failed");
                self.state = RunState::Failed;
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    fn inputs(&self) -> Option<RunInputs> {
        let path = |kind: InputKind| {
            self.slots
                .get(&kind)
                .filter(|s| s.status == InputStatus::Valid)
                .map(|s| s.path.clone())
        };
        Some(RunInputs {
            portfolio: path(InputKind::Portfolio)?,
            public_equity: path(InputKind::PublicEquity)?,
            fixed_income: path(InputKind::FixedIncome)?,
        })
    }

    fn input_changed(&mut self) {
        self.output = None;
        self.last_error = None;
        self.state = if self.is_ready() {
            RunState::ReadyToSubmit
        } else {
            RunState::AwaitingInputs
        };
    }
}
