//! Universe reference tables (per-asset value and emissions).
//!
//! The pipeline only ever *queries* reference data by identifier, through
//! `UniverseSource`. `Universe` is the CSV-backed implementation; it is loaded
//! once and shared read-only across both holdings streams.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::info;

use crate::domain::{
    AssetStream, COL_IDENTIFIER, COL_SCOPE1, COL_SCOPE2, COL_SCOPE3, COL_VALUE, Scopes, UniverseRecord,
};
use crate::error::PipelineError;
use crate::io::ingest::read_table_from_reader;
use crate::validate::missing_columns;

/// Read-only lookup of reference records by asset identifier.
pub trait UniverseSource: Sync {
    /// Every record for `identifier`, in table order. Empty when unknown.
    fn lookup(&self, identifier: &str) -> &[UniverseRecord];
}

/// In-memory reference table keyed by identifier.
///
/// Duplicate identifiers are kept; a join against them fans out.
#[derive(Debug, Clone, Default)]
pub struct Universe {
    label: String,
    by_id: HashMap<String, Vec<UniverseRecord>>,
    len: usize,
}

impl Universe {
    pub fn from_records(label: impl Into<String>, records: impl IntoIterator<Item = UniverseRecord>) -> Self {
        let mut by_id: HashMap<String, Vec<UniverseRecord>> = HashMap::new();
        let mut len = 0;
        for record in records {
            len += 1;
            by_id.entry(record.identifier.clone()).or_default().push(record);
        }
        Self {
            label: label.into(),
            by_id,
            len,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl UniverseSource for Universe {
    fn lookup(&self, identifier: &str) -> &[UniverseRecord] {
        self.by_id.get(identifier).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Both reference tables of a run.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub public_equity: Universe,
    pub fixed_income: Universe,
}

impl ReferenceData {
    /// Load `public_universe.csv` and `fixed_income_universe.csv` from `dir`.
    pub fn load(dir: &Path) -> Result<Self, PipelineError> {
        let public_equity = load_universe(&dir.join(AssetStream::PublicEquity.universe_file_name()))?;
        let fixed_income = load_universe(&dir.join(AssetStream::FixedIncome.universe_file_name()))?;
        info!(
            dir = %dir.display(),
            public_equity = public_equity.len(),
            fixed_income = fixed_income.len(),
            "loaded reference data"
        );
        Ok(Self {
            public_equity,
            fixed_income,
        })
    }

    pub fn for_stream(&self, stream: AssetStream) -> &Universe {
        match stream {
            AssetStream::PublicEquity => &self.public_equity,
            AssetStream::FixedIncome => &self.fixed_income,
        }
    }
}

pub fn load_universe(path: &Path) -> Result<Universe, PipelineError> {
    let label = path.display().to_string();
    let file = File::open(path).map_err(|e| PipelineError::Reference {
        label: label.clone(),
        reason: e.to_string(),
    })?;
    read_universe(file, &label)
}

/// Parse a universe table with columns `Identifier, Value, Scope1, Scope2, Scope3`.
///
/// Blank numeric cells read as `None`. Non-numeric text in a numeric cell is
/// malformed reference data and fails the load.
pub fn read_universe<R: Read>(source: R, label: &str) -> Result<Universe, PipelineError> {
    let table = read_table_from_reader(source, label).map_err(|e| PipelineError::Reference {
        label: label.to_string(),
        reason: e.to_string(),
    })?;

    let required = [COL_IDENTIFIER, COL_VALUE, COL_SCOPE1, COL_SCOPE2, COL_SCOPE3];
    let missing = missing_columns(&table.headers, &required);
    if !missing.is_empty() {
        return Err(PipelineError::Reference {
            label: label.to_string(),
            reason: format!("missing columns: {}", missing.join(", ")),
        });
    }
    let idx: Vec<usize> = required.iter().filter_map(|name| table.column_index(name)).collect();

    let mut records = Vec::with_capacity(table.len());
    for row in &table.rows {
        let num = |i: usize| -> Result<Option<f64>, PipelineError> {
            parse_opt_f64(row.cell(idx[i])).map_err(|value| PipelineError::Reference {
                label: label.to_string(),
                reason: format!("line {}: `{}` is not a number: '{value}'", row.line, required[i]),
            })
        };
        records.push(UniverseRecord {
            identifier: row.cell(idx[0]).to_string(),
            asset_value: num(1)?,
            emissions: Scopes::new(num(2)?, num(3)?, num(4)?),
        });
    }

    Ok(Universe::from_records(label, records))
}

fn parse_opt_f64(s: &str) -> Result<Option<f64>, String> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        Ok(_) => Ok(None),
        Err(_) => Err(s.to_string()),
    }
}
