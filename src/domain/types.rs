//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - passed between the pipeline stages by value
//! - rendered to the terminal
//! - exported to CSV/JSON and read back

use std::ops::Add;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const COL_FUND_NAME: &str = "FundName";
pub const COL_FUND_VALUE: &str = "FundValue";
pub const COL_HOLDING_ID: &str = "Holding Identifier";
pub const COL_FUND: &str = "Fund";
pub const COL_ASSET_WEIGHT: &str = "Asset Weight";
pub const COL_ASSET_CLASS: &str = "Asset Class";

pub const COL_IDENTIFIER: &str = "Identifier";
pub const COL_VALUE: &str = "Value";
pub const COL_SCOPE1: &str = "Scope1";
pub const COL_SCOPE2: &str = "Scope2";
pub const COL_SCOPE3: &str = "Scope3";

/// Declared type of an input column, used by the cleaning pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Free text. Blank and numeric-looking values are rejected.
    String,
    /// Floating point. Values that fail to parse are rejected.
    Float,
}

/// The three user-supplied input files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum InputKind {
    Portfolio,
    PublicEquity,
    FixedIncome,
}

impl InputKind {
    pub const ALL: [InputKind; 3] = [InputKind::Portfolio, InputKind::PublicEquity, InputKind::FixedIncome];

    /// Label used in user-facing messages.
    pub fn label(self) -> &'static str {
        match self {
            InputKind::Portfolio => "Portfolio",
            InputKind::PublicEquity => "PublicEquity",
            InputKind::FixedIncome => "FixedIncome",
        }
    }

    /// Column name -> declared type, in schema order.
    pub fn field_types(self) -> &'static [(&'static str, FieldType)] {
        match self {
            InputKind::Portfolio => &[(COL_FUND_NAME, FieldType::String), (COL_FUND_VALUE, FieldType::Float)],
            InputKind::PublicEquity | InputKind::FixedIncome => &[
                (COL_HOLDING_ID, FieldType::String),
                (COL_FUND, FieldType::String),
                (COL_ASSET_WEIGHT, FieldType::Float),
                (COL_ASSET_CLASS, FieldType::String),
            ],
        }
    }

    pub fn required_fields(self) -> Vec<&'static str> {
        self.field_types().iter().map(|(name, _)| *name).collect()
    }

    /// The holdings stream this input feeds, if any.
    pub fn stream(self) -> Option<AssetStream> {
        match self {
            InputKind::Portfolio => None,
            InputKind::PublicEquity => Some(AssetStream::PublicEquity),
            InputKind::FixedIncome => Some(AssetStream::FixedIncome),
        }
    }
}

/// The two holdings streams. Each one joins against its own universe table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetStream {
    PublicEquity,
    FixedIncome,
}

impl AssetStream {
    pub fn display_name(self) -> &'static str {
        match self {
            AssetStream::PublicEquity => "Public Equity",
            AssetStream::FixedIncome => "Fixed Income",
        }
    }

    /// File name of the stream's universe table inside the universe directory.
    pub fn universe_file_name(self) -> &'static str {
        match self {
            AssetStream::PublicEquity => "public_universe.csv",
            AssetStream::FixedIncome => "fixed_income_universe.csv",
        }
    }
}

/// One value per emissions scope.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Scopes<T> {
    pub scope1: T,
    pub scope2: T,
    pub scope3: T,
}

impl<T> Scopes<T> {
    pub fn new(scope1: T, scope2: T, scope3: T) -> Self {
        Self { scope1, scope2, scope3 }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Scopes<U> {
        Scopes {
            scope1: f(self.scope1),
            scope2: f(self.scope2),
            scope3: f(self.scope3),
        }
    }

    pub fn to_array(self) -> [T; 3] {
        [self.scope1, self.scope2, self.scope3]
    }
}

impl Scopes<Option<f64>> {
    pub fn missing() -> Self {
        Self::new(None, None, None)
    }

    /// Missing values count as zero. Only aggregation uses this.
    pub fn or_zero(self) -> Scopes<f64> {
        self.map(|v| v.unwrap_or(0.0))
    }
}

impl Add for Scopes<f64> {
    type Output = Scopes<f64>;

    fn add(self, rhs: Self) -> Self::Output {
        Scopes {
            scope1: self.scope1 + rhs.scope1,
            scope2: self.scope2 + rhs.scope2,
            scope3: self.scope3 + rhs.scope3,
        }
    }
}

/// A fund and its monetary value.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioRecord {
    pub fund_name: String,
    pub fund_value: f64,
}

/// One holding of a public-equity or fixed-income file.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldingRecord {
    /// Source line in the input file (1-based, header is line 1).
    pub line: usize,
    pub identifier: String,
    pub fund: String,
    /// Fraction of the fund's value held in this asset.
    pub asset_weight: f64,
    pub asset_class: String,
}

/// Reference emissions data for one asset.
///
/// Blank reference cells stay `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct UniverseRecord {
    pub identifier: String,
    pub asset_value: Option<f64>,
    pub emissions: Scopes<Option<f64>>,
}

/// A holding after the reference joins, plus the computed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedHolding {
    pub holding: HoldingRecord,
    /// `false` when the identifier had no match in the universe table.
    pub universe_matched: bool,
    pub asset_value: Option<f64>,
    pub emissions: Scopes<Option<f64>>,
    /// `None` when the fund had no match in the portfolio.
    pub fund_value: Option<f64>,
    /// Not clamped: values outside [0, 1] flag a data-quality problem upstream.
    pub ownership: Option<f64>,
    pub financed: Scopes<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundAggregate {
    pub fund: String,
    pub financed: Scopes<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetClassAggregate {
    pub asset_class: String,
    pub financed: Scopes<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TotalEmissions {
    pub total: Scopes<f64>,
}

/// The three aggregate tables of a run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub by_fund: Vec<FundAggregate>,
    pub by_asset_class: Vec<AssetClassAggregate>,
    pub totals: TotalEmissions,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags, `.env`/environment, and defaults.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Directory holding `public_universe.csv` and `fixed_income_universe.csv`.
    pub universe_dir: PathBuf,
    /// Sectioned CSV workbook written on success.
    pub output: PathBuf,
    /// Optional JSON report.
    pub json_report: Option<PathBuf>,
    /// Print every rejected row instead of a capped preview.
    pub show_all_rows: bool,
}

/// The three input files of a run.
#[derive(Debug, Clone)]
pub struct RunInputs {
    pub portfolio: PathBuf,
    pub public_equity: PathBuf,
    pub fixed_income: PathBuf,
}

impl RunInputs {
    pub fn path(&self, kind: InputKind) -> &PathBuf {
        match kind {
            InputKind::Portfolio => &self.portfolio,
            InputKind::PublicEquity => &self.public_equity,
            InputKind::FixedIncome => &self.fixed_income,
        }
    }
}
