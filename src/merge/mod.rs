//! Reference joins.
//!
//! Holdings are left-joined twice:
//!
//! 1. with the stream's universe on `Holding Identifier = Identifier`
//! 2. with the portfolio on `Fund = FundName`
//!
//! Unmatched holdings are kept with `None` in the joined fields. Duplicate keys
//! on the right-hand side fan rows out (one output row per match), the same as
//! a relational left join.

use std::collections::HashMap;

use tracing::debug;

use crate::domain::{EnrichedHolding, HoldingRecord, PortfolioRecord, Scopes};
use crate::io::universe::UniverseSource;

/// Left join holdings with a universe table, then with the portfolio.
pub fn merge_holdings(
    holdings: &[HoldingRecord],
    universe: &dyn UniverseSource,
    portfolio: &[PortfolioRecord],
) -> Vec<EnrichedHolding> {
    let with_universe = join_universe(holdings, universe);
    join_portfolio(with_universe, portfolio)
}

/// Left join on identifier. Fund fields are left unset.
pub fn join_universe(holdings: &[HoldingRecord], universe: &dyn UniverseSource) -> Vec<EnrichedHolding> {
    let mut out = Vec::with_capacity(holdings.len());
    let mut misses = 0usize;

    for holding in holdings {
        let matches = universe.lookup(&holding.identifier);
        if matches.is_empty() {
            misses += 1;
            out.push(unmatched(holding));
            continue;
        }
        for record in matches {
            out.push(EnrichedHolding {
                holding: holding.clone(),
                universe_matched: true,
                asset_value: record.asset_value,
                emissions: record.emissions,
                fund_value: None,
                ownership: None,
                financed: Scopes::missing(),
            });
        }
    }

    debug!(holdings = holdings.len(), rows = out.len(), misses, "joined universe");
    out
}

/// Left join on fund name, setting `fund_value`.
pub fn join_portfolio(rows: Vec<EnrichedHolding>, portfolio: &[PortfolioRecord]) -> Vec<EnrichedHolding> {
    let mut by_fund: HashMap<&str, Vec<f64>> = HashMap::new();
    for record in portfolio {
        by_fund.entry(record.fund_name.as_str()).or_default().push(record.fund_value);
    }

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        match by_fund.get(row.holding.fund.as_str()) {
            Some(values) => {
                for &value in values {
                    out.push(EnrichedHolding {
                        fund_value: Some(value),
                        ..row.clone()
                    });
                }
            }
            None => out.push(row),
        }
    }
    out
}

fn unmatched(holding: &HoldingRecord) -> EnrichedHolding {
    EnrichedHolding {
        holding: holding.clone(),
        universe_matched: false,
        asset_value: None,
        emissions: Scopes::missing(),
        fund_value: None,
        ownership: None,
        financed: Scopes::missing(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UniverseRecord;
    use crate::io::universe::Universe;

    fn holding(id: &str, fund: &str) -> HoldingRecord {
        HoldingRecord {
            line: 2,
            identifier: id.to_string(),
            fund: fund.to_string(),
            asset_weight: 0.5,
            asset_class: "Equity".to_string(),
        }
    }

    fn universe_record(id: &str, value: f64) -> UniverseRecord {
        UniverseRecord {
            identifier: id.to_string(),
            asset_value: Some(value),
            emissions: Scopes::new(Some(10.0), Some(5.0), Some(1.0)),
        }
    }

    fn fund(name: &str, value: f64) -> PortfolioRecord {
        PortfolioRecord {
            fund_name: name.to_string(),
            fund_value: value,
        }
    }

    #[test]
    fn unmatched_holdings_are_kept_with_missing_fields() {
        let universe = Universe::from_records("u", vec![universe_record("ID1", 100.0)]);
        let rows = merge_holdings(
            &[holding("ID1", "FundA"), holding("ID9", "FundZ")],
            &universe,
            &[fund("FundA", 1000.0)],
        );

        assert_eq!(rows.len(), 2);
        assert!(rows[0].universe_matched);
        assert_eq!(rows[0].asset_value, Some(100.0));
        assert_eq!(rows[0].fund_value, Some(1000.0));

        assert!(!rows[1].universe_matched);
        assert_eq!(rows[1].asset_value, None);
        assert_eq!(rows[1].emissions, Scopes::missing());
        assert_eq!(rows[1].fund_value, None);
    }

    #[test]
    fn duplicate_reference_keys_fan_out() {
        let universe = Universe::from_records("u", vec![universe_record("ID1", 100.0), universe_record("ID1", 200.0)]);
        let rows = merge_holdings(
            &[holding("ID1", "FundA")],
            &universe,
            &[fund("FundA", 1.0), fund("FundA", 2.0)],
        );

        let pairs: Vec<(Option<f64>, Option<f64>)> = rows.iter().map(|r| (r.asset_value, r.fund_value)).collect();
        assert_eq!(
            pairs,
            vec![
                (Some(100.0), Some(1.0)),
                (Some(100.0), Some(2.0)),
                (Some(200.0), Some(1.0)),
                (Some(200.0), Some(2.0)),
            ]
        );
    }

    #[test]
    fn fund_match_is_exact() {
        let universe = Universe::from_records("u", vec![universe_record("ID1", 100.0)]);
        let rows = merge_holdings(&[holding("ID1", "funda")], &universe, &[fund("FundA", 1.0)]);
        assert_eq!(rows[0].fund_value, None);
        assert!(rows[0].universe_matched);
    }
}
