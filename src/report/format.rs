//! Terminal rendering of a run: the aggregate tables, the rows each input file
//! lost to cleaning, and the join gaps that were counted as zero.
//!
//! Everything here returns a `String`; printing is left to `app`.

use crate::domain::{AggregatedResult, Scopes};
use crate::report::CoverageSummary;
use crate::validate::RejectedRows;

/// Rejected rows shown per group unless the caller asks for all of them.
pub const REJECTED_PREVIEW_ROWS: usize = 20;

const KEY_WIDTH: usize = 28;
const NUM_WIDTH: usize = 18;

/// The three aggregate tables, one after another.
pub fn format_aggregates(result: &AggregatedResult) -> String {
    let mut out = String::new();

    out.push_str("Fund Aggregation:\n");
    out.push_str(&scope_table(
        "Fund",
        ["Financed Scope1", "Financed Scope2", "Financed Scope3"],
        result.by_fund.iter().map(|r| (r.fund.as_str(), r.financed)),
    ));
    out.push('\n');

    out.push_str("Asset Class Aggregation:\n");
    out.push_str(&scope_table(
        "Asset Class",
        ["Financed Scope1", "Financed Scope2", "Financed Scope3"],
        result.by_asset_class.iter().map(|r| (r.asset_class.as_str(), r.financed)),
    ));
    out.push('\n');

    out.push_str("Total Portfolio Emissions:\n");
    out.push_str(&scope_table(
        "",
        ["Total Scope1", "Total Scope2", "Total Scope3"],
        std::iter::once(("Total", result.totals.total)),
    ));

    out
}

/// Warnings plus the offending rows for one input file.
///
/// Returns an empty string when nothing was rejected.
pub fn format_rejected(rejected: &RejectedRows, show_all: bool) -> String {
    let mut out = String::new();
    let limit = if show_all { usize::MAX } else { REJECTED_PREVIEW_ROWS };

    if !rejected.duplicates.is_empty() {
        out.push_str(&format!(
            "Warning: Found duplicate 'Holding Identifiers' in file: {}. \
             These rows were removed from the analysis ({}):\n",
            rejected.label,
            rejected.duplicates.len()
        ));
        out.push_str(&raw_table(
            &rejected.headers,
            rejected.duplicates.iter().map(|r| (r.line, r.cells.as_slice(), String::new())),
            limit,
        ));
    }

    if !rejected.invalid.is_empty() {
        out.push_str(&format!(
            "Warning: Invalid data detected in file: {}. \
             These rows were removed from the analysis ({}):\n",
            rejected.label,
            rejected.invalid.len()
        ));
        out.push_str(&raw_table(
            &rejected.headers,
            rejected.invalid.iter().map(|r| {
                let reasons: Vec<String> = r.reasons.iter().map(ToString::to_string).collect();
                (r.row.line, r.row.cells.as_slice(), reasons.join("; "))
            }),
            limit,
        ));
    }

    out
}

/// Per-stream join coverage. Empty when every row matched.
pub fn format_coverage(coverage: &CoverageSummary) -> String {
    let mut out = String::new();
    for c in coverage.streams() {
        if c.is_complete() {
            continue;
        }
        out.push_str(&format!(
            "Note: {} rows={} | no universe match={} | no fund match={} | no ownership={} (counted as 0)\n",
            c.stream.display_name(),
            c.rows,
            c.universe_misses,
            c.portfolio_misses,
            c.missing_ownership,
        ));
    }
    out
}

fn scope_table<'a>(
    key_header: &str,
    headers: [&str; 3],
    rows: impl Iterator<Item = (&'a str, Scopes<f64>)>,
) -> String {
    let mut out = String::new();
    push_line(
        &mut out,
        format!(
            "{:<kw$} {:>nw$} {:>nw$} {:>nw$}",
            key_header,
            headers[0],
            headers[1],
            headers[2],
            kw = KEY_WIDTH,
            nw = NUM_WIDTH
        ),
    );
    push_line(
        &mut out,
        format!(
            "{:-<kw$} {:-<nw$} {:-<nw$} {:-<nw$}",
            "",
            "",
            "",
            "",
            kw = KEY_WIDTH,
            nw = NUM_WIDTH
        ),
    );

    let mut any = false;
    for (key, s) in rows {
        any = true;
        push_line(
            &mut out,
            format!(
                "{:<kw$} {:>nw$.4} {:>nw$.4} {:>nw$.4}",
                truncate(key, KEY_WIDTH),
                s.scope1,
                s.scope2,
                s.scope3,
                kw = KEY_WIDTH,
                nw = NUM_WIDTH
            ),
        );
    }
    if !any {
        out.push_str("(no rows)\n");
    }
    out
}

fn raw_table<'a>(
    headers: &[String],
    rows: impl ExactSizeIterator<Item = (usize, &'a [String], String)>,
    limit: usize,
) -> String {
    let mut out = String::new();
    let total = rows.len();

    let mut header = format!("{:>6}", "line");
    for h in headers {
        header.push_str(&format!(" | {}", truncate(h, 20)));
    }
    header.push_str(" | reason");
    push_line(&mut out, header);

    for (line, cells, reason) in rows.take(limit) {
        let mut s = format!("{line:>6}");
        for i in 0..headers.len() {
            s.push_str(&format!(" | {}", truncate(cells.get(i).map(String::as_str).unwrap_or(""), 20)));
        }
        if !reason.is_empty() {
            s.push_str(&format!(" | {reason}"));
        }
        push_line(&mut out, s);
    }
    if total > limit {
        out.push_str(&format!("... {} more (use --show-rows to list all)\n", total - limit));
    }
    out
}

fn push_line(out: &mut String, line: String) {
    out.push_str(line.trim_end());
    out.push('\n');
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AssetClassAggregate, AssetStream, FundAggregate, TotalEmissions};
    use crate::io::ingest::RawRow;
    use crate::report::StreamCoverage;
    use crate::validate::{RejectionReason, RowRejection};

    #[test]
    fn aggregates_render_all_three_sections() {
        let result = AggregatedResult {
            by_fund: vec![FundAggregate {
                fund: "FundA".to_string(),
                financed: Scopes::new(100.0, 50.0, 20.0),
            }],
            by_asset_class: vec![AssetClassAggregate {
                asset_class: "Equity".to_string(),
                financed: Scopes::new(100.0, 50.0, 20.0),
            }],
            totals: TotalEmissions {
                total: Scopes::new(100.0, 50.0, 20.0),
            },
        };

        let text = format_aggregates(&result);
        assert!(text.contains("Fund Aggregation:"));
        assert!(text.contains("Asset Class Aggregation:"));
        assert!(text.contains("Total Scope3"));
        assert!(text.contains("FundA"));
        assert!(text.contains("100.0000"));
    }

    #[test]
    fn rejected_rows_render_with_reasons_and_cap() {
        let invalid: Vec<RowRejection> = (0..25)
            .map(|i| RowRejection {
                row: RawRow {
                    line: i + 2,
                    cells: vec!["ID".to_string(), "123".to_string()],
                },
                reasons: vec![RejectionReason::NumericText {
                    field: "Fund".to_string(),
                    value: "123".to_string(),
                }],
            })
            .collect();
        let rejected = RejectedRows {
            label: "public_equity".to_string(),
            headers: vec!["Holding Identifier".to_string(), "Fund".to_string()],
            duplicates: Vec::new(),
            invalid,
        };

        let text = format_rejected(&rejected, false);
        assert!(text.starts_with("Warning: Invalid data detected in file: public_equity."));
        assert!(text.contains("expects text but got number '123'"));
        assert!(text.contains("... 5 more"));
        assert!(!format_rejected(&rejected, true).contains("more"));
    }

    #[test]
    fn nothing_rejected_renders_nothing() {
        assert!(format_rejected(&RejectedRows::default(), false).is_empty());
    }

    #[test]
    fn complete_coverage_renders_nothing() {
        let full = StreamCoverage {
            stream: AssetStream::PublicEquity,
            rows: 3,
            universe_misses: 0,
            portfolio_misses: 0,
            missing_ownership: 0,
        };
        let gap = StreamCoverage {
            stream: AssetStream::FixedIncome,
            universe_misses: 1,
            missing_ownership: 1,
            ..full
        };
        let text = format_coverage(&CoverageSummary {
            public_equity: full,
            fixed_income: gap,
        });
        assert!(!text.contains("Public Equity"));
        assert!(text.contains("Fixed Income rows=3 | no universe match=1"));
    }
}
