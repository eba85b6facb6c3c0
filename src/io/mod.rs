//! Input/output helpers.
//!
//! - ingest of the three input files (`ingest`)
//! - spreadsheet input/output (`xlsx`)
//! - universe reference tables (`universe`)
//! - workbook/JSON exports and read-back (`export`)

pub mod export;
pub mod ingest;
pub mod universe;
pub mod xlsx;

pub use export::*;
pub use ingest::*;
pub use universe::*;
