//! Result exports.
//!
//! The workbook is written as `.xlsx` (three named sheets, see `io::xlsx`)
//! when the output path ends in `.xlsx`, and otherwise as a single CSV file
//! with three named sections:
//!
//! ```text
//! [Fund Aggregation]
//! Fund,Financed Scope1,Financed Scope2,Financed Scope3
//! FundA,100,50,20
//!
//! [Asset Class Aggregation]
//! ...
//! ```
//!
//! Numbers are written in shortest round-trip form, so `read_workbook` gives
//! back exactly what was written. The JSON report carries the same tables plus
//! run metadata.
//!
//! Every output is first written to a temporary file next to its target and
//! only renamed into place by `StagedFile::publish`. A run that fails halfway
//! leaves the previous outputs untouched.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::info;

use crate::domain::{AggregatedResult, AssetClassAggregate, FundAggregate, Scopes, TotalEmissions};
use crate::error::PipelineError;
use crate::io::xlsx;

pub const SECTION_FUND: &str = "Fund Aggregation";
pub const SECTION_ASSET_CLASS: &str = "Asset Class Aggregation";
pub const SECTION_TOTAL: &str = "Total Emissions";

pub(crate) const FUND_HEADER: [&str; 4] = ["Fund", "Financed Scope1", "Financed Scope2", "Financed Scope3"];
pub(crate) const ASSET_CLASS_HEADER: [&str; 4] =
    ["Asset Class", "Financed Scope1", "Financed Scope2", "Financed Scope3"];
pub(crate) const TOTAL_HEADER: [&str; 3] = ["Total Scope1", "Total Scope2", "Total Scope3"];

/// An output written to a temporary file, not yet visible at its target path.
///
/// Dropping it without `publish` removes the temporary file.
#[derive(Debug)]
pub struct StagedFile {
    temp: NamedTempFile,
    target: PathBuf,
}

impl StagedFile {
    /// Create an empty temporary file in the target's directory.
    pub fn new(target: &Path) -> Result<Self, PipelineError> {
        let dir = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let temp = NamedTempFile::new_in(dir).map_err(|e| export_error(target, e))?;
        Ok(Self {
            temp,
            target: target.to_path_buf(),
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename the temporary file onto the target path.
    pub fn publish(self) -> Result<PathBuf, PipelineError> {
        let target = self.target;
        self.temp
            .persist(&target)
            .map_err(|e| export_error(&target, e.error))?;
        info!(path = %target.display(), "wrote output");
        Ok(target)
    }

    fn file(&mut self) -> &mut std::fs::File {
        self.temp.as_file_mut()
    }
}

/// Write the workbook (format chosen by extension) to a staged file.
pub fn stage_workbook(path: &Path, result: &AggregatedResult) -> Result<StagedFile, PipelineError> {
    let mut staged = StagedFile::new(path)?;
    if xlsx::is_xlsx(path) {
        let bytes = xlsx::workbook_bytes(result).map_err(|e| export_error(path, e))?;
        staged.file().write_all(&bytes).map_err(|e| export_error(path, e))?;
    } else {
        write_workbook_to(staged.file(), result).map_err(|e| export_error(path, e))?;
    }
    Ok(staged)
}

/// Write the workbook straight to `path`.
pub fn write_workbook(path: &Path, result: &AggregatedResult) -> Result<(), PipelineError> {
    stage_workbook(path, result)?.publish()?;
    Ok(())
}

pub fn write_workbook_to<W: Write>(sink: W, result: &AggregatedResult) -> Result<(), csv::Error> {
    let mut w = csv::WriterBuilder::new().flexible(true).from_writer(sink);

    w.write_record([section_marker(SECTION_FUND)])?;
    w.write_record(FUND_HEADER)?;
    for row in &result.by_fund {
        w.write_record(scope_record(&row.fund, row.financed))?;
    }
    w.write_record([""])?;

    w.write_record([section_marker(SECTION_ASSET_CLASS)])?;
    w.write_record(ASSET_CLASS_HEADER)?;
    for row in &result.by_asset_class {
        w.write_record(scope_record(&row.asset_class, row.financed))?;
    }
    w.write_record([""])?;

    w.write_record([section_marker(SECTION_TOTAL)])?;
    w.write_record(TOTAL_HEADER)?;
    let t = result.totals.total;
    w.write_record([t.scope1.to_string(), t.scope2.to_string(), t.scope3.to_string()])?;

    w.flush()?;
    Ok(())
}

/// Read a workbook written by `write_workbook`.
pub fn read_workbook(path: &Path) -> Result<AggregatedResult, PipelineError> {
    let parsed = if xlsx::is_xlsx(path) {
        xlsx::read_workbook_sheets(path)
    } else {
        let file = std::fs::File::open(path).map_err(|e| export_error(path, e))?;
        read_workbook_from(file)
    };
    parsed.map_err(|reason| PipelineError::Export {
        path: path.display().to_string(),
        reason,
    })
}

pub fn read_workbook_from<R: Read>(source: R) -> Result<AggregatedResult, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let mut result = AggregatedResult::default();
    let mut seen_total = false;
    let mut section: Option<String> = None;
    let mut expect_header = false;

    for record in reader.records() {
        let record = record.map_err(|e| e.to_string())?;
        let first = record.get(0).unwrap_or("");
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        if record.iter().all(str::is_empty) {
            continue;
        }
        // Markers are single-field records; data rows always carry four fields.
        if let Some(name) = parse_section_marker(first).filter(|_| record.len() == 1) {
            section = Some(name.to_string());
            expect_header = true;
            continue;
        }
        if expect_header {
            expect_header = false;
            let name = section.as_deref().unwrap_or_default();
            let header = section_header(name).ok_or_else(|| format!("line {line}: unknown section [{name}]"))?;
            if !record.iter().eq(header.iter().copied()) {
                return Err(format!("line {line}: expected header '{}' in [{name}]", header.join(",")));
            }
            continue;
        }

        match section.as_deref() {
            Some(SECTION_FUND) => {
                let (fund, financed) = parse_scope_record(&record, line)?;
                result.by_fund.push(FundAggregate { fund, financed });
            }
            Some(SECTION_ASSET_CLASS) => {
                let (asset_class, financed) = parse_scope_record(&record, line)?;
                result.by_asset_class.push(AssetClassAggregate { asset_class, financed });
            }
            Some(SECTION_TOTAL) => {
                let total = Scopes::new(
                    parse_num(record.get(0), line)?,
                    parse_num(record.get(1), line)?,
                    parse_num(record.get(2), line)?,
                );
                result.totals = TotalEmissions { total };
                seen_total = true;
            }
            Some(other) => return Err(format!("line {line}: unknown section [{other}]")),
            None => return Err(format!("line {line}: data before the first section marker")),
        }
    }

    if !seen_total {
        return Err(format!("missing [{SECTION_TOTAL}] section"));
    }
    Ok(result)
}

fn section_header(name: &str) -> Option<&'static [&'static str]> {
    match name {
        SECTION_FUND => Some(&FUND_HEADER),
        SECTION_ASSET_CLASS => Some(&ASSET_CLASS_HEADER),
        SECTION_TOTAL => Some(&TOTAL_HEADER),
        _ => None,
    }
}

/// Per-file rejected-row counts, as carried in the JSON report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedCount {
    pub file: String,
    pub duplicates: usize,
    pub invalid: usize,
}

/// JSON form of a run's results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportFile {
    pub tool: String,
    pub generated_at: String,
    pub inputs: Vec<String>,
    pub rejected: Vec<RejectedCount>,
    pub fund_aggregation: Vec<FundAggregate>,
    pub asset_class_aggregation: Vec<AssetClassAggregate>,
    pub total_emissions: TotalEmissions,
}

impl ReportFile {
    pub fn new(result: &AggregatedResult, inputs: Vec<String>, rejected: Vec<RejectedCount>) -> Self {
        Self {
            tool: "ecotrack".to_string(),
            generated_at: Local::now().to_rfc3339(),
            inputs,
            rejected,
            fund_aggregation: result.by_fund.clone(),
            asset_class_aggregation: result.by_asset_class.clone(),
            total_emissions: result.totals,
        }
    }
}

/// Write the JSON report to a staged file.
pub fn stage_json_report(path: &Path, report: &ReportFile) -> Result<StagedFile, PipelineError> {
    let mut staged = StagedFile::new(path)?;
    serde_json::to_writer_pretty(staged.file(), report).map_err(|e| export_error(path, e))?;
    Ok(staged)
}

pub fn write_json_report(path: &Path, report: &ReportFile) -> Result<(), PipelineError> {
    stage_json_report(path, report)?.publish()?;
    Ok(())
}

pub fn read_json_report(path: &Path) -> Result<ReportFile, PipelineError> {
    let file = std::fs::File::open(path).map_err(|e| export_error(path, e))?;
    serde_json::from_reader(file).map_err(|e| export_error(path, e))
}

fn section_marker(name: &str) -> String {
    format!("[{name}]")
}

fn parse_section_marker(cell: &str) -> Option<&str> {
    cell.strip_prefix('[')?.strip_suffix(']')
}

fn scope_record(key: &str, s: Scopes<f64>) -> [String; 4] {
    [key.to_string(), s.scope1.to_string(), s.scope2.to_string(), s.scope3.to_string()]
}

fn parse_scope_record(record: &csv::StringRecord, line: u64) -> Result<(String, Scopes<f64>), String> {
    let key = record
        .get(0)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("line {line}: missing key"))?;
    let scopes = Scopes::new(
        parse_num(record.get(1), line)?,
        parse_num(record.get(2), line)?,
        parse_num(record.get(3), line)?,
    );
    Ok((key.to_string(), scopes))
}

fn parse_num(cell: Option<&str>, line: u64) -> Result<f64, String> {
    let cell = cell.ok_or_else(|| format!("line {line}: missing value"))?;
    cell.parse::<f64>()
        .map_err(|_| format!("line {line}: invalid number '{cell}'"))
}

fn export_error(path: &Path, err: impl std::fmt::Display) -> PipelineError {
    PipelineError::Export {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}
