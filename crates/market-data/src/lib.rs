//! Market-data provider: loads the flat CSV tables a replay session is built
//! from. Everything here is a read-only, stateless view over `data_dir` —
//! callers are expected to cache the results per instrument themselves (the
//! raw-bar and factor tables are immutable once loaded, see the session
//! manager's concurrency notes).

pub mod bars;
pub mod picker;
pub mod stocks;

use std::path::PathBuf;
use thiserror::Error;

pub use core_types::{AdjustmentFactor, ExDividendEvent, RawBar};

#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("no bar data available for instrument {0}")]
    NoData(String),

    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("invalid sector: {0}")]
    InvalidSector(String),

    #[error("invalid year range: {0}")]
    InvalidYearRange(String),

    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error reading {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// One row of `stock_list.csv` — the MDP's instrument index.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StockListing {
    pub code: String,
    pub name: String,
}

/// Sector filter accepted by `random_pick`, matching the code-prefix scheme
/// the market-data downloader uses for A-share boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sector {
    All,
    Main,
    Gem,
    Sme,
}

impl std::str::FromStr for Sector {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Sector::All),
            "main" => Ok(Sector::Main),
            "gem" => Ok(Sector::Gem),
            "sme" => Ok(Sector::Sme),
            other => Err(MarketDataError::InvalidSector(other.to_string())),
        }
    }
}

impl Sector {
    /// Whether `code` belongs to this board, per the downloader's prefix
    /// convention (main: 60xxxx/000xxx, gem: 30xxxx, sme: 002xxx).
    pub fn matches(&self, code: &str) -> bool {
        match self {
            Sector::All => true,
            Sector::Main => code.starts_with("60") || code.starts_with("000"),
            Sector::Gem => code.starts_with("30"),
            Sector::Sme => code.starts_with("002"),
        }
    }
}

/// Read-only view over the on-disk MDP layout rooted at `data_dir`:
/// `stock_list.csv`, `stock_names.json`, `kline_raw/{code}.csv`,
/// `factor/{code}.csv`, `ex_dividend/{code}.csv`.
#[derive(Debug, Clone)]
pub struct MarketDataStore {
    data_dir: PathBuf,
}

impl MarketDataStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &std::path::Path {
        &self.data_dir
    }
}
