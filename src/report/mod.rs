//! Aggregation of financed emissions, plus formatted terminal output.
//!
//! Aggregates sum missing values as zero. This differs from the per-row
//! arithmetic in `emissions`, where a missing operand stays missing: an
//! unmatched holding contributes nothing to a sum instead of poisoning it.

use std::collections::BTreeMap;

use crate::domain::{
    AggregatedResult, AssetClassAggregate, AssetStream, EnrichedHolding, FundAggregate, Scopes, TotalEmissions,
};

pub mod format;

pub use format::*;

/// Group both streams by fund and by asset class, then total.
///
/// `totals` is summed from the asset-class table. Keys come out in sorted order.
pub fn aggregate(public_equity: &[EnrichedHolding], fixed_income: &[EnrichedHolding]) -> AggregatedResult {
    let rows = || public_equity.iter().chain(fixed_income.iter());

    let by_fund = group_sum(rows(), |r| r.holding.fund.as_str())
        .into_iter()
        .map(|(fund, financed)| FundAggregate { fund, financed })
        .collect();

    let by_asset_class: Vec<AssetClassAggregate> = group_sum(rows(), |r| r.holding.asset_class.as_str())
        .into_iter()
        .map(|(asset_class, financed)| AssetClassAggregate { asset_class, financed })
        .collect();

    let total = by_asset_class
        .iter()
        .fold(Scopes::default(), |acc: Scopes<f64>, row| acc + row.financed);

    AggregatedResult {
        by_fund,
        by_asset_class,
        totals: TotalEmissions { total },
    }
}

/// Direct sum of financed emissions over rows, missing as zero.
pub fn sum_financed<'a>(rows: impl IntoIterator<Item = &'a EnrichedHolding>) -> Scopes<f64> {
    rows.into_iter()
        .fold(Scopes::default(), |acc: Scopes<f64>, r| acc + r.financed.or_zero())
}

fn group_sum<'a>(
    rows: impl Iterator<Item = &'a EnrichedHolding>,
    key: impl Fn(&'a EnrichedHolding) -> &'a str,
) -> BTreeMap<String, Scopes<f64>> {
    let mut groups: BTreeMap<String, Scopes<f64>> = BTreeMap::new();
    for row in rows {
        let entry = groups.entry(key(row).to_string()).or_default();
        *entry = *entry + row.financed.or_zero();
    }
    groups
}

/// Join/calculation gaps of one stream. These rows show up as zero
/// contributions in the aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamCoverage {
    pub stream: AssetStream,
    pub rows: usize,
    pub universe_misses: usize,
    pub portfolio_misses: usize,
    pub missing_ownership: usize,
}

impl StreamCoverage {
    pub fn from_rows(stream: AssetStream, rows: &[EnrichedHolding]) -> Self {
        Self {
            stream,
            rows: rows.len(),
            universe_misses: rows.iter().filter(|r| !r.universe_matched).count(),
            portfolio_misses: rows.iter().filter(|r| r.fund_value.is_none()).count(),
            missing_ownership: rows.iter().filter(|r| r.ownership.is_none()).count(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.universe_misses == 0 && self.portfolio_misses == 0 && self.missing_ownership == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverageSummary {
    pub public_equity: StreamCoverage,
    pub fixed_income: StreamCoverage,
}

impl CoverageSummary {
    pub fn new(public_equity: &[EnrichedHolding], fixed_income: &[EnrichedHolding]) -> Self {
        Self {
            public_equity: StreamCoverage::from_rows(AssetStream::PublicEquity, public_equity),
            fixed_income: StreamCoverage::from_rows(AssetStream::FixedIncome, fixed_income),
        }
    }

    pub fn streams(&self) -> [&StreamCoverage; 2] {
        [&self.public_equity, &self.fixed_income]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HoldingRecord;
    use proptest::prelude::*;

    fn row(fund: &str, class: &str, financed: Scopes<Option<f64>>) -> EnrichedHolding {
        EnrichedHolding {
            holding: HoldingRecord {
                line: 2,
                identifier: format!("{fund}-{class}"),
                fund: fund.to_string(),
                asset_weight: 1.0,
                asset_class: class.to_string(),
            },
            universe_matched: financed.scope1.is_some(),
            asset_value: None,
            emissions: Scopes::missing(),
            fund_value: Some(1.0),
            ownership: financed.scope1.map(|_| 1.0),
            financed,
        }
    }

    fn some(a: f64, b: f64, c: f64) -> Scopes<Option<f64>> {
        Scopes::new(Some(a), Some(b), Some(c))
    }

    #[test]
    fn aggregates_across_both_streams() {
        let public = vec![row("FundA", "Equity", some(100.0, 50.0, 20.0)), row("FundB", "Equity", some(1.0, 1.0, 1.0))];
        let fixed = vec![row("FundA", "Bonds", some(10.0, 5.0, 2.0))];

        let agg = aggregate(&public, &fixed);

        assert_eq!(agg.by_fund.len(), 2);
        assert_eq!(agg.by_fund[0].fund, "FundA");
        assert_eq!(agg.by_fund[0].financed, Scopes::new(110.0, 55.0, 22.0));
        assert_eq!(agg.by_asset_class[0].asset_class, "Bonds");
        assert_eq!(agg.by_asset_class[1].financed, Scopes::new(101.0, 51.0, 21.0));
        assert_eq!(agg.totals.total, Scopes::new(111.0, 56.0, 23.0));
    }

    #[test]
    fn missing_financed_values_sum_as_zero() {
        let public = vec![row("FundA", "Equity", some(5.0, 5.0, 5.0)), row("FundA", "Equity", Scopes::missing())];
        let agg = aggregate(&public, &[]);
        assert_eq!(agg.by_fund[0].financed, Scopes::new(5.0, 5.0, 5.0));
        assert_eq!(agg.totals.total, Scopes::new(5.0, 5.0, 5.0));
    }

    #[test]
    fn empty_streams_give_empty_tables_and_zero_totals() {
        let agg = aggregate(&[], &[]);
        assert!(agg.by_fund.is_empty());
        assert!(agg.by_asset_class.is_empty());
        assert_eq!(agg.totals.total, Scopes::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn coverage_counts_gaps() {
        let mut unmatched = row("FundA", "Equity", Scopes::missing());
        unmatched.fund_value = None;
        let cov = StreamCoverage::from_rows(AssetStream::PublicEquity, &[row("FundA", "Equity", some(1.0, 1.0, 1.0)), unmatched]);
        assert_eq!(cov.rows, 2);
        assert_eq!(cov.universe_misses, 1);
        assert_eq!(cov.portfolio_misses, 1);
        assert_eq!(cov.missing_ownership, 1);
        assert!(!cov.is_complete());
    }

    fn arb_scope() -> impl Strategy<Value = Option<f64>> {
        prop::option::of(-1.0e6..1.0e6f64)
    }

    fn arb_row() -> impl Strategy<Value = EnrichedHolding> {
        (
            prop::sample::select(vec!["FundA", "FundB", "FundC"]),
            prop::sample::select(vec!["Equity", "Bonds"]),
            arb_scope(),
            arb_scope(),
            arb_scope(),
        )
            .prop_map(|(fund, class, s1, s2, s3)| row(fund, class, Scopes::new(s1, s2, s3)))
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-4 + 1e-9 * a.abs().max(b.abs())
    }

    proptest! {
        #[test]
        fn totals_match_direct_sum(
            public in prop::collection::vec(arb_row(), 0..40),
            fixed in prop::collection::vec(arb_row(), 0..40),
        ) {
            let agg = aggregate(&public, &fixed);
            let direct = sum_financed(public.iter().chain(fixed.iter()));
            let via_funds = agg
                .by_fund
                .iter()
                .fold(Scopes::default(), |acc: Scopes<f64>, f| acc + f.financed);

            for (t, d) in agg.totals.total.to_array().into_iter().zip(direct.to_array()) {
                prop_assert!(close(t, d), "totals {t} != direct {d}");
            }
            for (f, d) in via_funds.to_array().into_iter().zip(direct.to_array()) {
                prop_assert!(close(f, d), "fund sum {f} != direct {d}");
            }
        }
    }
}
