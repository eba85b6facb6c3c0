//! `ecotrack` library crate.
//!
//! The binary (`ecotrack`) is a thin wrapper around this library so that:
//!
//! - the pipeline is testable without spawning processes
//! - stages are reusable (e.g., a future web front-end or notebook bindings)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod domain;
pub mod emissions;
pub mod error;
pub mod io;
pub mod logging;
pub mod merge;
pub mod report;
pub mod validate;
