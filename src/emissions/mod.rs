//! Ownership and financed emissions per enriched holding.
//!
//! - `Ownership% = (AssetWeight × FundValue) / AssetValue`
//! - `FinancedScopeN = Ownership% × ScopeN`
//!
//! Missing operands propagate as `None`. A zero or missing asset value gives a
//! missing ownership rather than an infinity or a zero.

use crate::domain::EnrichedHolding;

/// Set `ownership` on every row.
pub fn compute_ownership(mut rows: Vec<EnrichedHolding>) -> Vec<EnrichedHolding> {
    for row in &mut rows {
        row.ownership = ownership(row.holding.asset_weight, row.fund_value, row.asset_value);
    }
    rows
}

/// Set `financed` on every row from `ownership` and the row's emissions.
pub fn compute_financed_emissions(mut rows: Vec<EnrichedHolding>) -> Vec<EnrichedHolding> {
    for row in &mut rows {
        let share = row.ownership;
        row.financed = row.emissions.map(|scope| financed(share, scope));
    }
    rows
}

pub fn ownership(asset_weight: f64, fund_value: Option<f64>, asset_value: Option<f64>) -> Option<f64> {
    let fund_value = fund_value?;
    let asset_value = asset_value.filter(|v| *v != 0.0)?;
    finite((asset_weight * fund_value) / asset_value)
}

pub fn financed(ownership: Option<f64>, scope: Option<f64>) -> Option<f64> {
    finite(ownership? * scope?)
}

fn finite(v: f64) -> Option<f64> {
    if v.is_finite() { Some(v) } else { None }
}
