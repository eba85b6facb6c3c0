//! Spreadsheet input and output.
//!
//! Input files may be `.xlsx` (or another format calamine opens) instead of
//! CSV: the first worksheet is read into the same `RawTable` the CSV path
//! produces. The results workbook becomes three named sheets when the output
//! path ends in `.xlsx`.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use calamine::{Data, Reader, Sheets, open_workbook_auto};
use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use tracing::debug;

use crate::domain::{AggregatedResult, AssetClassAggregate, FundAggregate, Scopes, TotalEmissions};
use crate::error::PipelineError;
use crate::io::export::{
    ASSET_CLASS_HEADER, FUND_HEADER, SECTION_ASSET_CLASS, SECTION_FUND, SECTION_TOTAL, TOTAL_HEADER,
};
use crate::io::ingest::{RawRow, RawTable, normalize_header_name};

const SPREADSHEET_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// `true` when `path` names a spreadsheet calamine can read.
pub fn is_spreadsheet(path: &Path) -> bool {
    extension(path).is_some_and(|ext| SPREADSHEET_EXTENSIONS.contains(&ext.as_str()))
}

/// `true` when the results workbook at `path` should be written as `.xlsx`.
pub fn is_xlsx(path: &Path) -> bool {
    extension(path).is_some_and(|ext| ext == "xlsx")
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Read the first worksheet of a spreadsheet into a `RawTable`.
///
/// The first row is the header. Numbers come through as their shortest
/// decimal text, so the cleaning pass sees the same values as for CSV.
pub fn read_sheet(path: &Path, label: &str) -> Result<RawTable, PipelineError> {
    let parse_error = |reason: String| PipelineError::Parse {
        label: label.to_string(),
        reason,
    };

    let mut workbook = open_workbook_auto(path)
        .map_err(|e| parse_error(format!("failed to open '{}': {e}", path.display())))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| parse_error("workbook has no worksheets".to_string()))?
        .map_err(|e| parse_error(e.to_string()))?;

    // Line numbers follow the sheet's row numbers, 1-based.
    let first_row = range.start().map_or(0, |(row, _)| row as usize);
    let mut rows_iter = range.rows();
    let headers: Vec<String> = rows_iter
        .next()
        .map(|cells| cells.iter().map(|c| normalize_header_name(&cell_text(c))).collect())
        .unwrap_or_default();

    let mut rows = Vec::new();
    for (idx, cells) in rows_iter.enumerate() {
        let cells: Vec<String> = cells.iter().map(cell_text).collect();
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        rows.push(RawRow {
            line: first_row + idx + 2,
            cells,
        });
    }

    let table = RawTable::new(label, headers, rows);
    debug!(label, path = %path.display(), rows = table.len(), "read input sheet");
    Ok(table)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    }
}

fn cell_number(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(v) => Some(*v),
        Data::Int(v) => Some(*v as f64),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Render the three aggregate tables as an `.xlsx` file in memory.
pub fn workbook_bytes(result: &AggregatedResult) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();

    write_scope_sheet(
        workbook.add_worksheet(),
        SECTION_FUND,
        &FUND_HEADER,
        result.by_fund.iter().map(|r| (r.fund.as_str(), r.financed)),
    )?;
    write_scope_sheet(
        workbook.add_worksheet(),
        SECTION_ASSET_CLASS,
        &ASSET_CLASS_HEADER,
        result.by_asset_class.iter().map(|r| (r.asset_class.as_str(), r.financed)),
    )?;

    let totals = workbook.add_worksheet();
    totals.set_name(SECTION_TOTAL)?;
    write_header(totals, &TOTAL_HEADER)?;
    for (col, value) in result.totals.total.to_array().into_iter().enumerate() {
        totals.write_number(1, col as u16, value)?;
    }

    workbook.save_to_buffer()
}

fn write_scope_sheet<'a>(
    sheet: &mut Worksheet,
    name: &str,
    header: &[&str],
    rows: impl Iterator<Item = (&'a str, Scopes<f64>)>,
) -> Result<(), XlsxError> {
    sheet.set_name(name)?;
    write_header(sheet, header)?;
    for (idx, (key, scopes)) in rows.enumerate() {
        let row = idx as u32 + 1;
        sheet.write_string(row, 0, key)?;
        for (col, value) in scopes.to_array().into_iter().enumerate() {
            sheet.write_number(row, col as u16 + 1, value)?;
        }
    }
    Ok(())
}

fn write_header(sheet: &mut Worksheet, header: &[&str]) -> Result<(), XlsxError> {
    for (col, name) in header.iter().enumerate() {
        sheet.write_string(0, col as u16, *name)?;
    }
    Ok(())
}

/// Read a workbook written by `workbook_bytes`.
pub fn read_workbook_sheets(path: &Path) -> Result<AggregatedResult, String> {
    let mut workbook = open_workbook_auto(path).map_err(|e| e.to_string())?;

    let by_fund = scope_rows(&mut workbook, SECTION_FUND, &FUND_HEADER)?
        .into_iter()
        .map(|(fund, financed)| FundAggregate { fund, financed })
        .collect();
    let by_asset_class = scope_rows(&mut workbook, SECTION_ASSET_CLASS, &ASSET_CLASS_HEADER)?
        .into_iter()
        .map(|(asset_class, financed)| AssetClassAggregate { asset_class, financed })
        .collect();

    let rows = sheet_rows(&mut workbook, SECTION_TOTAL, &TOTAL_HEADER)?;
    let cells = rows
        .first()
        .ok_or_else(|| format!("sheet '{SECTION_TOTAL}' has no totals row"))?;
    let number = |col: usize| {
        cells
            .get(col)
            .and_then(cell_number)
            .ok_or_else(|| format!("sheet '{SECTION_TOTAL}': invalid number in column {}", col + 1))
    };
    let total = Scopes::new(number(0)?, number(1)?, number(2)?);

    Ok(AggregatedResult {
        by_fund,
        by_asset_class,
        totals: TotalEmissions { total },
    })
}

fn scope_rows(
    workbook: &mut Sheets<BufReader<File>>,
    name: &str,
    header: &[&str],
) -> Result<Vec<(String, Scopes<f64>)>, String> {
    sheet_rows(workbook, name, header)?
        .into_iter()
        .enumerate()
        .map(|(idx, cells)| {
            let row = idx + 2;
            let key = cells
                .first()
                .map(cell_text)
                .filter(|k| !k.is_empty())
                .ok_or_else(|| format!("sheet '{name}' row {row}: missing key"))?;
            let number = |col: usize| {
                cells
                    .get(col)
                    .and_then(cell_number)
                    .ok_or_else(|| format!("sheet '{name}' row {row}: invalid number in column {}", col + 1))
            };
            Ok((key, Scopes::new(number(1)?, number(2)?, number(3)?)))
        })
        .collect()
}

/// Data rows of sheet `name` after checking its header row.
fn sheet_rows(workbook: &mut Sheets<BufReader<File>>, name: &str, header: &[&str]) -> Result<Vec<Vec<Data>>, String> {
    let range = workbook
        .worksheet_range(name)
        .map_err(|e| format!("sheet '{name}': {e}"))?;
    let mut rows = range.rows();

    let found: Vec<String> = rows.next().map(|r| r.iter().map(cell_text).collect()).unwrap_or_default();
    if !found.iter().map(String::as_str).eq(header.iter().copied()) {
        return Err(format!("sheet '{name}': expected header '{}'", header.join(",")));
    }

    Ok(rows
        .filter(|r| r.iter().any(|c| !cell_text(c).is_empty()))
        .map(<[Data]>::to_vec)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AggregatedResult {
        AggregatedResult {
            by_fund: vec![
                FundAggregate {
                    fund: "FundA".to_string(),
                    financed: Scopes::new(100.0, 50.0, 20.0),
                },
                FundAggregate {
                    fund: "FundB".to_string(),
                    financed: Scopes::new(0.1 + 0.2, 1.0 / 3.0, 0.0),
                },
            ],
            by_asset_class: vec![AssetClassAggregate {
                asset_class: "Equity".to_string(),
                financed: Scopes::new(100.3, 50.333_333_333_333_336, 20.0),
            }],
            totals: TotalEmissions {
                total: Scopes::new(100.3, 50.333_333_333_333_336, 20.0),
            },
        }
    }

    #[test]
    fn extensions_pick_the_format() {
        assert!(is_spreadsheet(Path::new("Portfolio.XLSX")));
        assert!(is_spreadsheet(Path::new("in/old.xls")));
        assert!(!is_spreadsheet(Path::new("Portfolio.csv")));
        assert!(is_xlsx(Path::new("Emissions_Analysis.xlsx")));
        assert!(!is_xlsx(Path::new("Emissions_Analysis")));
    }

    #[test]
    fn workbook_sheets_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Emissions_Analysis.xlsx");
        std::fs::write(&path, workbook_bytes(&sample()).unwrap()).unwrap();

        let back = read_workbook_sheets(&path).unwrap();
        let result = sample();
        assert_eq!(back.by_fund.len(), 2);
        assert_eq!(back.by_fund[1].fund, "FundB");
        for (a, b) in result.by_fund.iter().zip(&back.by_fund) {
            for (x, y) in a.financed.to_array().into_iter().zip(b.financed.to_array()) {
                assert!((x - y).abs() < 1e-12);
            }
        }
        assert_eq!(back.by_asset_class[0].asset_class, "Equity");
        for (x, y) in result.totals.total.to_array().into_iter().zip(back.totals.total.to_array()) {
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[test]
    fn input_sheet_reads_like_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("PublicEquity.xlsx");

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        write_header(sheet, &["Holding Identifier", " Fund ", "Asset Weight", "Asset Class"]).unwrap();
        sheet.write_string(1, 0, "ID1").unwrap();
        sheet.write_string(1, 1, "FundA").unwrap();
        sheet.write_number(1, 2, 0.5).unwrap();
        sheet.write_string(1, 3, "Equity").unwrap();
        sheet.write_string(3, 0, "ID2").unwrap();
        sheet.write_string(3, 1, "FundB").unwrap();
        sheet.write_number(3, 2, 1000.0).unwrap();
        sheet.write_number(3, 3, 7.0).unwrap();
        workbook.save(&path).unwrap();

        let table = read_sheet(&path, "PublicEquity").unwrap();
        assert_eq!(table.headers, vec!["Holding Identifier", "Fund", "Asset Weight", "Asset Class"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].cells, vec!["ID1", "FundA", "0.5", "Equity"]);
        assert_eq!(table.rows[0].line, 2);
        assert_eq!(table.rows[1].line, 4);
        assert_eq!(table.rows[1].cell(2), "1000");
        assert_eq!(table.rows[1].cell(3), "7");
    }

    #[test]
    fn missing_sheet_header_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hand_edited.xlsx");

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(SECTION_FUND).unwrap();
        sheet.write_string(0, 0, "FundA").unwrap();
        sheet.write_number(0, 1, 1.0).unwrap();
        workbook.save(&path).unwrap();

        let err = read_workbook_sheets(&path).unwrap_err();
        assert!(err.contains("expected header"));
    }

    #[test]
    fn unreadable_input_sheet_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Portfolio.xlsx");
        std::fs::write(&path, "not a zip archive").unwrap();

        let err = read_sheet(&path, "Portfolio").unwrap_err();
        assert!(matches!(err, PipelineError::Parse { ref label, .. } if label == "Portfolio"));
    }
}
