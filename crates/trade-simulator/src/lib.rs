//! Trade Simulator (T) — a FIFO lot-tracking ledger enforcing T+1
//! settlement, commission/stamp-tax schedules, lot-wise cost basis, and
//! incremental mark-to-market against a replay session's revealed price.

pub mod commission;
pub mod engine;
pub mod error;
pub mod models;

pub use engine::TradeLedger;
pub use error::TradeError;
pub use models::*;
