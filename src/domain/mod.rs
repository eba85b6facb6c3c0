//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - input schemas (`InputKind`, `FieldType`, column names)
//! - typed records (`PortfolioRecord`, `HoldingRecord`, `UniverseRecord`)
//! - per-row outputs (`EnrichedHolding`) and aggregates (`AggregatedResult`)

pub mod types;

pub use types::*;
