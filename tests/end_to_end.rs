use std::fs;
use std::path::Path;

use ecotrack::app::{RunState, Session};
use ecotrack::domain::{InputKind, RunConfig, Scopes};
use ecotrack::error::PipelineError;
use ecotrack::io::export::{read_json_report, read_workbook};
use ecotrack::io::universe::ReferenceData;

fn write(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

fn write_universes(dir: &Path) {
    write(
        dir,
        "public_universe.csv",
        "Identifier,Value,Scope1,Scope2,Scope3\nAAPL,4000,400,200,100\nMSFT,2000,,10,5\n",
    );
    write(
        dir,
        "fixed_income_universe.csv",
        "Identifier,Value,Scope1,Scope2,Scope3\nBOND1,1000,30,20,10\n",
    );
}

fn config(dir: &Path) -> RunConfig {
    RunConfig {
        universe_dir: dir.to_path_buf(),
        output: dir.join("Emissions_Analysis.csv"),
        json_report: Some(dir.join("report.json")),
        show_all_rows: false,
    }
}

#[test]
fn full_run_from_files_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    write_universes(dir.path());

    let portfolio = write(dir.path(), "portfolio.csv", "\u{feff}FundName,FundValue\nGrowth,1000\nIncome,500\n");
    let public = write(
        dir.path(),
        "public.csv",
        "Holding Identifier,Fund,Asset Weight,Asset Class\n\
         AAPL,Growth,0.8,Equity\n\
         MSFT,Growth,0.2,Equity\n\
         DUP,Growth,0.1,Equity\n\
         DUP,Income,0.1,Equity\n\
         BAD,Growth,lots,Equity\n",
    );
    let fixed = write(
        dir.path(),
        "fixed.csv",
        "Holding Identifier,Fund,Asset Weight,Asset Class\nBOND1,Income,1.0,Bonds\nNOPE,Income,0.5,Bonds\n",
    );

    let reference = ReferenceData::load(dir.path()).unwrap();
    let mut session = Session::new();
    session.attach(InputKind::Portfolio, &portfolio).unwrap();
    session.attach(InputKind::PublicEquity, &public).unwrap();
    session.attach(InputKind::FixedIncome, &fixed).unwrap();
    assert_eq!(session.state(), RunState::ReadyToSubmit);

    let cfg = config(dir.path());
    let output = session.submit(&reference, &cfg).unwrap();

    // AAPL: 0.8 * 1000 / 4000 = 0.2 -> 80, 40, 20
    // MSFT: 0.2 * 1000 / 2000 = 0.1 -> None, 1, 0.5
    // BOND1: 1.0 * 500 / 1000 = 0.5 -> 15, 10, 5
    let growth = &output.aggregates.by_fund[0];
    assert_eq!(growth.fund, "Growth");
    assert!((growth.financed.scope1 - 80.0).abs() < 1e-9);
    assert!((growth.financed.scope2 - 41.0).abs() < 1e-9);
    assert!((growth.financed.scope3 - 20.5).abs() < 1e-9);

    let income = &output.aggregates.by_fund[1];
    assert_eq!(income.fund, "Income");
    assert!((income.financed.scope1 - 15.0).abs() < 1e-9);

    let total = output.aggregates.totals.total;
    assert!((total.scope1 - 95.0).abs() < 1e-9);
    assert!((total.scope2 - 51.0).abs() < 1e-9);
    assert!((total.scope3 - 25.5).abs() < 1e-9);

    assert_eq!(output.public_equity.rejected.duplicates.len(), 2);
    assert_eq!(output.public_equity.rejected.invalid.len(), 1);
    assert_eq!(output.coverage.fixed_income.universe_misses, 1);
    assert_eq!(output.exported.len(), 2);

    let aggregates = output.aggregates.clone();
    assert_eq!(session.state(), RunState::Complete);

    let workbook = read_workbook(&cfg.output).unwrap();
    assert_eq!(workbook, aggregates);

    let report = read_json_report(cfg.json_report.as_deref().unwrap()).unwrap();
    assert_eq!(report.total_emissions.total, aggregates.totals.total);
    assert_eq!(report.rejected[1].duplicates, 2);
}

#[test]
fn missing_reference_table_is_a_reference_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ReferenceData::load(dir.path()).unwrap_err();
    assert!(matches!(err, PipelineError::Reference { .. }));
    assert_eq!(err.exit_code(), 4);
}

#[test]
fn schema_failure_blocks_submit() {
    let dir = tempfile::tempdir().unwrap();
    write_universes(dir.path());
    let reference = ReferenceData::load(dir.path()).unwrap();

    let mut session = Session::new();
    let holdings = "Holding Identifier,Fund,Asset Weight\nAAPL,Growth,1.0\n";
    let err = session
        .attach(InputKind::PublicEquity, write(dir.path(), "public.csv", holdings))
        .unwrap_err();
    assert_eq!(err.to_string(), "Missing columns in PublicEquity: Asset Class");

    let err = session.submit(&reference, &config(dir.path())).unwrap_err();
    assert!(matches!(err, PipelineError::NotReady { .. }));
    assert!(!dir.path().join("Emissions_Analysis.csv").exists());
}

#[test]
fn empty_holdings_produce_zero_totals() {
    let dir = tempfile::tempdir().unwrap();
    write_universes(dir.path());
    let reference = ReferenceData::load(dir.path()).unwrap();
    let header = "Holding Identifier,Fund,Asset Weight,Asset Class\n";

    let mut session = Session::new();
    session
        .attach(InputKind::Portfolio, write(dir.path(), "p.csv", "FundName,FundValue\nGrowth,1000\n"))
        .unwrap();
    session
        .attach(InputKind::PublicEquity, write(dir.path(), "pe.csv", header))
        .unwrap();
    session
        .attach(InputKind::FixedIncome, write(dir.path(), "fi.csv", header))
        .unwrap();

    let output = session.submit(&reference, &config(dir.path())).unwrap();
    assert!(output.aggregates.by_fund.is_empty());
    assert_eq!(output.aggregates.totals.total, Scopes::new(0.0, 0.0, 0.0));
}

#[test]
fn spreadsheet_inputs_and_xlsx_workbook() {
    let dir = tempfile::tempdir().unwrap();
    write_universes(dir.path());
    let reference = ReferenceData::load(dir.path()).unwrap();

    let portfolio = dir.path().join("Portfolio.xlsx");
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "FundName").unwrap();
    sheet.write_string(0, 1, "FundValue").unwrap();
    sheet.write_string(1, 0, "Growth").unwrap();
    sheet.write_number(1, 1, 1000.0).unwrap();
    workbook.save(&portfolio).unwrap();

    let header = "Holding Identifier,Fund,Asset Weight,Asset Class\n";
    let mut session = Session::new();
    session.attach(InputKind::Portfolio, &portfolio).unwrap();
    session
        .attach(
            InputKind::PublicEquity,
            write(dir.path(), "pe.csv", &format!("{header}AAPL,Growth,0.8,Equity\n")),
        )
        .unwrap();
    session
        .attach(InputKind::FixedIncome, write(dir.path(), "fi.csv", header))
        .unwrap();

    let cfg = RunConfig {
        output: dir.path().join("Emissions_Analysis.xlsx"),
        json_report: None,
        ..config(dir.path())
    };
    let output = session.submit(&reference, &cfg).unwrap();
    assert!((output.aggregates.totals.total.scope1 - 80.0).abs() < 1e-9);

    let back = read_workbook(&cfg.output).unwrap();
    assert_eq!(back.by_fund.len(), 1);
    assert_eq!(back.by_fund[0].fund, "Growth");
    assert!((back.totals.total.scope2 - 40.0).abs() < 1e-9);
}
