//! Input validation: required columns, then row cleaning.
//!
//! - `columns`: the pre-submission gate (`validate`, `missing_columns`)
//! - `clean`: deduplication + typed cleaning with an audit side-channel
//!
//! The typed converters at the bottom turn a `CleanTable` into domain records.

pub mod clean;
pub mod columns;

pub use clean::*;
pub use columns::*;

use crate::domain::{
    COL_ASSET_CLASS, COL_ASSET_WEIGHT, COL_FUND, COL_FUND_NAME, COL_FUND_VALUE, COL_HOLDING_ID, HoldingRecord,
    PortfolioRecord,
};
use crate::error::PipelineError;

pub fn portfolio_records(table: &CleanTable) -> Result<Vec<PortfolioRecord>, PipelineError> {
    table
        .rows
        .iter()
        .map(|row| {
            Ok(PortfolioRecord {
                fund_name: required_text(table, row, COL_FUND_NAME)?,
                fund_value: required_float(table, row, COL_FUND_VALUE)?,
            })
        })
        .collect()
}

pub fn holding_records(table: &CleanTable) -> Result<Vec<HoldingRecord>, PipelineError> {
    table
        .rows
        .iter()
        .map(|row| {
            Ok(HoldingRecord {
                line: row.line,
                identifier: required_text(table, row, COL_HOLDING_ID)?,
                fund: required_text(table, row, COL_FUND)?,
                asset_weight: required_float(table, row, COL_ASSET_WEIGHT)?,
                asset_class: required_text(table, row, COL_ASSET_CLASS)?,
            })
        })
        .collect()
}

fn required_text(table: &CleanTable, row: &CleanRow, name: &str) -> Result<String, PipelineError> {
    table
        .text(row, name)
        .map(str::to_string)
        .ok_or_else(|| schema_miss(table, name))
}

fn required_float(table: &CleanTable, row: &CleanRow, name: &str) -> Result<f64, PipelineError> {
    table.float(row, name).ok_or_else(|| schema_miss(table, name))
}

// Only reachable when a table was cleaned against the wrong schema.
fn schema_miss(table: &CleanTable, name: &str) -> PipelineError {
    PipelineError::Schema {
        label: table.label.clone(),
        missing: vec![name.to_string()],
    }
}
