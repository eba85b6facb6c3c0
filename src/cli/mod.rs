//! Command-line parsing for the financed-emissions tool.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the pipeline code.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "ecotrack", version, about = "Financed emissions analysis for investment portfolios")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check that the three input files have their required columns.
    Check(InputArgs),
    /// Validate, join, calculate and aggregate; print results and write the workbook.
    Run(RunArgs),
    /// Print the tables of a previously exported workbook.
    Show(ShowArgs),
}

/// The three input files.
#[derive(Debug, Args, Clone)]
pub struct InputArgs {
    /// Portfolio file, CSV or spreadsheet (`FundName`, `FundValue`).
    #[arg(long, value_name = "FILE")]
    pub portfolio: PathBuf,

    /// Public-equity holdings (`Holding Identifier`, `Fund`, `Asset Weight`, `Asset Class`).
    #[arg(long = "public-equity", value_name = "FILE")]
    pub public_equity: PathBuf,

    /// Fixed-income holdings (same columns as public equity).
    #[arg(long = "fixed-income", value_name = "FILE")]
    pub fixed_income: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub inputs: InputArgs,

    /// Directory with `public_universe.csv` and `fixed_income_universe.csv`.
    ///
    /// Defaults to `$ECOTRACK_UNIVERSE_DIR`, then `data/`.
    #[arg(long = "universe-dir", value_name = "DIR")]
    pub universe_dir: Option<PathBuf>,

    /// Workbook output path (`.xlsx` for sheets, anything else for sectioned CSV).
    ///
    /// Defaults to `$ECOTRACK_OUTPUT`, then `Emissions_Analysis.xlsx`.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Also write a JSON report.
    #[arg(long, value_name = "JSON")]
    pub json: Option<PathBuf>,

    /// List every rejected row instead of a preview.
    #[arg(long = "show-rows")]
    pub show_rows: bool,
}

/// Options for printing a saved workbook.
#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Workbook produced by `ecotrack run` (`.xlsx` or sectioned CSV).
    #[arg(long, value_name = "FILE")]
    pub workbook: PathBuf,
}
