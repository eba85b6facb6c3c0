//! Shared pipeline logic used by the session and the CLI front-end.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! ingest -> clean -> join -> ownership/financed emissions -> aggregate -> export
//!
//! The two holdings streams are independent until aggregation, so they are
//! processed side by side with `rayon::join`. Reference data is only read.

use std::path::PathBuf;

use tracing::info;

use crate::domain::{
    AggregatedResult, AssetStream, EnrichedHolding, InputKind, PortfolioRecord, RunConfig, RunInputs,
};
use crate::emissions::{compute_financed_emissions, compute_ownership};
use crate::error::PipelineError;
use crate::io::export::{RejectedCount, ReportFile, stage_json_report, stage_workbook};
use crate::io::ingest::{RawTable, read_table};
use crate::io::universe::ReferenceData;
use crate::merge::merge_holdings;
use crate::report::{CoverageSummary, aggregate};
use crate::validate::{RejectedRows, check_columns, clean, holding_records, portfolio_records};

/// One holdings stream after calculation.
#[derive(Debug, Clone)]
pub struct StreamOutput {
    pub stream: AssetStream,
    pub rejected: RejectedRows,
    pub rows: Vec<EnrichedHolding>,
}

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub portfolio: Vec<PortfolioRecord>,
    pub portfolio_rejected: RejectedRows,
    pub public_equity: StreamOutput,
    pub fixed_income: StreamOutput,
    pub aggregates: AggregatedResult,
    pub coverage: CoverageSummary,
    /// Files written by the export step (empty when not exported).
    pub exported: Vec<PathBuf>,
}

impl RunOutput {
    /// Rejected-row audits in input order: portfolio, public equity, fixed income.
    pub fn rejected(&self) -> [&RejectedRows; 3] {
        [
            &self.portfolio_rejected,
            &self.public_equity.rejected,
            &self.fixed_income.rejected,
        ]
    }
}

/// Execute the full pipeline, including the export step.
pub fn run_pipeline(
    inputs: &RunInputs,
    reference: &ReferenceData,
    config: &RunConfig,
) -> Result<RunOutput, PipelineError> {
    let mut output = compute(inputs, reference)?;
    output.exported = export(&output, config)?;
    Ok(output)
}

/// Everything up to (not including) export.
pub fn compute(inputs: &RunInputs, reference: &ReferenceData) -> Result<RunOutput, PipelineError> {
    // 1) Ingest. Any unreadable file aborts before cleaning starts.
    let portfolio_raw = ingest(inputs, InputKind::Portfolio)?;
    let public_raw = ingest(inputs, InputKind::PublicEquity)?;
    let fixed_raw = ingest(inputs, InputKind::FixedIncome)?;

    // 2) Portfolio is the shared join target.
    let (portfolio_clean, portfolio_rejected) = clean(
        &portfolio_raw,
        InputKind::Portfolio.field_types(),
        InputKind::Portfolio.label(),
    )?;
    let portfolio = portfolio_records(&portfolio_clean)?;

    // 3) Clean -> join -> calculate, per stream.
    let (public_equity, fixed_income) = rayon::join(
        || process_stream(AssetStream::PublicEquity, &public_raw, reference, &portfolio),
        || process_stream(AssetStream::FixedIncome, &fixed_raw, reference, &portfolio),
    );
    let public_equity = public_equity?;
    let fixed_income = fixed_income?;

    // 4) Aggregate.
    let aggregates = aggregate(&public_equity.rows, &fixed_income.rows);
    let coverage = CoverageSummary::new(&public_equity.rows, &fixed_income.rows);

    info!(
        funds = aggregates.by_fund.len(),
        asset_classes = aggregates.by_asset_class.len(),
        scope1 = aggregates.totals.total.scope1,
        scope2 = aggregates.totals.total.scope2,
        scope3 = aggregates.totals.total.scope3,
        "aggregated financed emissions"
    );

    Ok(RunOutput {
        portfolio,
        portfolio_rejected,
        public_equity,
        fixed_income,
        aggregates,
        coverage,
        exported: Vec::new(),
    })
}

/// Write the workbook and, if configured, the JSON report.
///
/// Both are staged first and published only once both are written, so a
/// failure leaves no new output behind.
pub fn export(output: &RunOutput, config: &RunConfig) -> Result<Vec<PathBuf>, PipelineError> {
    let workbook = stage_workbook(&config.output, &output.aggregates)?;

    let report = match &config.json_report {
        Some(path) => {
            let inputs = InputKind::ALL.iter().map(|k| k.label().to_string()).collect();
            let rejected = output
                .rejected()
                .iter()
                .map(|r| RejectedCount {
                    file: r.label.clone(),
                    duplicates: r.duplicates.len(),
                    invalid: r.invalid.len(),
                })
                .collect();
            Some(stage_json_report(path, &ReportFile::new(&output.aggregates, inputs, rejected))?)
        }
        None => None,
    };

    let workbook_path = workbook.publish()?;
    let mut written = vec![workbook_path.clone()];
    if let Some(report) = report {
        match report.publish() {
            Ok(path) => written.push(path),
            Err(err) => {
                // Don't leave a workbook from a run that reports failure.
                let _ = std::fs::remove_file(&workbook_path);
                return Err(err);
            }
        }
    }

    Ok(written)
}

fn ingest(inputs: &RunInputs, kind: InputKind) -> Result<RawTable, PipelineError> {
    let table = read_table(inputs.path(kind), kind.label())?;
    // The file may have changed since it was validated; check again.
    check_columns(&table.headers, &kind.required_fields(), kind.label())?;
    Ok(table)
}

fn process_stream(
    stream: AssetStream,
    raw: &RawTable,
    reference: &ReferenceData,
    portfolio: &[PortfolioRecord],
) -> Result<StreamOutput, PipelineError> {
    let kind = match stream {
        AssetStream::PublicEquity => InputKind::PublicEquity,
        AssetStream::FixedIncome => InputKind::FixedIncome,
    };

    let (cleaned, rejected) = clean(raw, kind.field_types(), kind.label())?;
    let holdings = holding_records(&cleaned)?;

    let rows = merge_holdings(&holdings, reference.for_stream(stream), portfolio);
    let rows = compute_financed_emissions(compute_ownership(rows));

    info!(
        stream = stream.display_name(),
        read = raw.len(),
        cleaned = holdings.len(),
        rejected = rejected.total(),
        rows = rows.len(),
        "processed holdings stream"
    );

    Ok(StreamOutput { stream, rejected, rows })
}
