use chrono::NaiveDate;
use core_types::{Bar, CommissionSettings, TradeAction};
use market_data::Sector;
use replay_engine::{MaSeries, Progress, TradeMarker, VolumePoint};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trade_simulator::{Report, TradeRecord};

/// How a session's `(instrument, start_date)` pair is resolved at `start`.
#[derive(Debug, Clone)]
pub enum StartMode {
    Random { sector: Sector, year_range: String },
    Specified { stock_code: String, start_date: NaiveDate },
}

impl StartMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StartMode::Random { .. } => "random",
            StartMode::Specified { .. } => "specified",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StartParams {
    pub user: String,
    pub mode: StartMode,
    pub initial_capital: Decimal,
    pub commission: CommissionSettings,
}

/// Returned by `start`, mirroring `POST /api/training/start`'s response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartedSession {
    pub session_id: String,
    pub stock_code: String,
    pub start_date: NaiveDate,
    pub mode: String,
}

/// Returned by `data()`, mirroring `GET /api/training/{id}/data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub stock_name: String,
    pub kline_data: Vec<Bar>,
    pub volume_data: Vec<VolumePoint>,
    pub ma_data: Vec<MaSeries>,
    pub progress: Progress,
    pub trade_markers: Vec<TradeMarker>,
}

/// Returned by `set_adjustment()`, mirroring `POST /api/training/{id}/adjustment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentRefresh {
    pub kline_data: Vec<Bar>,
    pub volume_data: Vec<VolumePoint>,
    pub ma_data: Vec<MaSeries>,
}

/// Returned by `advance()`, mirroring `POST /api/training/{id}/next`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdvanceOutcome {
    Continue {
        finished: bool,
        new_bar: Bar,
        new_volume: VolumePoint,
        progress: Progress,
    },
    Finished {
        finished: bool,
        report: Report,
    },
}

/// Returned by `trade()`, mirroring `POST /api/training/{id}/trade`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub success: bool,
    pub trade: TradeRecord,
    pub trade_markers: Vec<TradeMarker>,
}

/// Returned by `history()`, mirroring `GET /api/training/{id}/history`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionHistory {
    pub trade_history: Vec<TradeRecord>,
    pub progress: Progress,
    pub trade_markers: Vec<TradeMarker>,
}

pub use core_types::AdjustmentMode;
pub use trade_simulator::PositionSummary;

/// Lightweight handle returned by `list()` / used for health reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub user: String,
    pub instrument: String,
    pub mode: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TradeRequest {
    pub action: TradeAction,
    pub quantity: i64,
}
