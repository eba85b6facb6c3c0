//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - attaches and validates the three input files
//! - loads the universe reference tables
//! - submits the run and prints results/warnings
//! - writes the workbook (and optional JSON report)

use std::path::PathBuf;

use clap::Parser;

use crate::cli::{Command, InputArgs, RunArgs, ShowArgs};
use crate::domain::{InputKind, RunConfig};
use crate::error::AppError;
use crate::io::universe::ReferenceData;

pub mod pipeline;
pub mod session;

pub use session::{InputStatus, RunState, Session};

const DEFAULT_UNIVERSE_DIR: &str = "data";
const DEFAULT_OUTPUT: &str = "Emissions_Analysis.xlsx";

/// Entry point for the `ecotrack` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    crate::logging::init(cli.verbose);

    match cli.command {
        Command::Check(args) => handle_check(&args),
        Command::Run(args) => handle_run(args),
        Command::Show(args) => handle_show(&args),
    }
}

fn handle_check(args: &InputArgs) -> Result<(), AppError> {
    let session = attach_inputs(args);
    if session.is_ready() {
        println!("All input files passed column validation.");
        return Ok(());
    }
    Err(AppError::new(2, "Please upload and validate all files before submitting."))
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args);
    let mut session = attach_inputs(&args.inputs);
    if !session.is_ready() {
        return Err(AppError::new(2, "Please upload and validate all files before submitting."));
    }

    let reference = ReferenceData::load(&config.universe_dir)?;
    let output = session.submit(&reference, &config)?;

    for rejected in output.rejected() {
        let text = crate::report::format_rejected(rejected, config.show_all_rows);
        if !text.is_empty() {
            println!("{text}");
        }
    }

    println!("{}", crate::report::format_aggregates(&output.aggregates));

    let coverage = crate::report::format_coverage(&output.coverage);
    if !coverage.is_empty() {
        println!("{coverage}");
    }

    for path in &output.exported {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn handle_show(args: &ShowArgs) -> Result<(), AppError> {
    let result = crate::io::export::read_workbook(&args.workbook)?;
    println!("{}", crate::report::format_aggregates(&result));
    Ok(())
}

/// Attach all three files, printing per-file validation feedback.
fn attach_inputs(args: &InputArgs) -> Session {
    let mut session = Session::new();
    let files = [
        (InputKind::Portfolio, &args.portfolio),
        (InputKind::PublicEquity, &args.public_equity),
        (InputKind::FixedIncome, &args.fixed_income),
    ];
    for (kind, path) in files {
        if let Err(err) = session.attach(kind, path) {
            eprintln!("{err}");
        }
    }
    session
}

/// Resolve the run configuration from flags, then `.env`/environment, then defaults.
pub fn run_config_from_args(args: &RunArgs) -> RunConfig {
    dotenvy::dotenv().ok();

    let universe_dir = args
        .universe_dir
        .clone()
        .or_else(|| env_path("ECOTRACK_UNIVERSE_DIR"))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_UNIVERSE_DIR));
    let output = args
        .output
        .clone()
        .or_else(|| env_path("ECOTRACK_OUTPUT"))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

    RunConfig {
        universe_dir,
        output,
        json_report: args.json.clone(),
        show_all_rows: args.show_rows,
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key).filter(|v| !v.is_empty()).map(PathBuf::from)
}
