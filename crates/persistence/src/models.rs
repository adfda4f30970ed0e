use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Ended,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Ended => "ended",
        };
        f.write_str(s)
    }
}

/// Data needed to insert a fresh row into `training_sessions`.
#[derive(Debug, Clone)]
pub struct SessionStartData {
    pub session_id: String,
    pub instrument: String,
    pub instrument_name: String,
    pub start_date: NaiveDate,
    pub mode: String,
    pub initial_capital: rust_decimal::Decimal,
    pub commission_settings_json: String,
}

/// A per-bar account snapshot, written on advance when snapshotting is
/// enabled and always at session completion.
#[derive(Debug, Clone)]
pub struct BarSnapshotData {
    pub bar_id: i64,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub total_assets: rust_decimal::Decimal,
    pub available_cash: rust_decimal::Decimal,
    pub position_value: rust_decimal::Decimal,
    pub floating_pnl: rust_decimal::Decimal,
    pub total_shares: i64,
    pub average_cost: rust_decimal::Decimal,
}

/// A single trade event, mirrored into `trade_history`.
#[derive(Debug, Clone)]
pub struct TradeData {
    pub bar_id: i64,
    pub trade_date: NaiveDate,
    pub action: String,
    pub quantity_lots: i64,
    pub price: rust_decimal::Decimal,
    pub amount: rust_decimal::Decimal,
    pub commission: rust_decimal::Decimal,
    pub stamp_tax: rust_decimal::Decimal,
    pub net_amount: rust_decimal::Decimal,
    pub total_assets_before: rust_decimal::Decimal,
    pub total_assets_after: rust_decimal::Decimal,
}

/// Terminal figures handed to `complete_session`, rolling statistics and
/// finalizing the session row.
#[derive(Debug, Clone)]
pub struct SessionCompletion {
    pub end_date: NaiveDate,
    pub final_capital: rust_decimal::Decimal,
    pub total_return: rust_decimal::Decimal,
    pub max_drawdown: rust_decimal::Decimal,
    pub total_trades: i64,
    pub trade_win_rate: rust_decimal::Decimal,
    pub session_win_rate: rust_decimal::Decimal,
    pub total_bars: i64,
    pub completed_bars: i64,
    pub total_commission: rust_decimal::Decimal,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TrainingSessionRow {
    pub session_id: String,
    pub instrument: String,
    pub instrument_name: String,
    pub start_date: String,
    pub end_date: Option<String>,
    pub mode: String,
    pub initial_capital: String,
    pub final_capital: Option<String>,
    pub total_return: Option<String>,
    pub max_drawdown: Option<String>,
    pub total_trades: i64,
    pub trade_win_rate: Option<String>,
    pub session_win_rate: Option<String>,
    pub total_bars: i64,
    pub completed_bars: i64,
    pub status: String,
    pub commission_settings_json: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BarHistoryRow {
    pub session_id: String,
    pub bar_id: i64,
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub total_assets: String,
    pub available_cash: String,
    pub position_value: String,
    pub floating_pnl: String,
    pub total_shares: i64,
    pub average_cost: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TradeHistoryRow {
    pub session_id: String,
    pub bar_id: i64,
    pub trade_date: String,
    pub action: String,
    pub quantity_lots: i64,
    pub price: String,
    pub amount: String,
    pub commission: String,
    pub stamp_tax: String,
    pub net_amount: String,
    pub total_assets_before: String,
    pub total_assets_after: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PositionLotRow {
    pub instrument: String,
    pub quantity_shares: i64,
    pub cost_price: String,
    pub buy_date: String,
    pub buy_bar_id: i64,
    pub available_date: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDetail {
    pub session: TrainingSessionRow,
    pub bars: Vec<BarHistoryRow>,
    pub trades: Vec<TradeHistoryRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserStatisticsRow {
    pub username: String,
    pub total_sessions: i64,
    pub completed_sessions: i64,
    pub total_trades: i64,
    pub total_return_sum: String,
    pub best_return: String,
    pub worst_return: String,
    pub avg_trade_win_rate: String,
    pub avg_session_win_rate: String,
    pub total_commission_paid: String,
    pub last_updated: DateTime<Utc>,
}

/// Derived view over `user_statistics`, with `avg_return`/`success_rate`
/// computed rather than stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStatistics {
    pub username: String,
    pub total_sessions: i64,
    pub completed_sessions: i64,
    pub total_trades: i64,
    pub best_return: rust_decimal::Decimal,
    pub worst_return: rust_decimal::Decimal,
    pub avg_trade_win_rate: rust_decimal::Decimal,
    pub avg_session_win_rate: rust_decimal::Decimal,
    pub total_commission_paid: rust_decimal::Decimal,
    pub avg_return: rust_decimal::Decimal,
    pub success_rate: rust_decimal::Decimal,
}

impl UserStatistics {
    pub fn zero(username: impl Into<String>) -> Self {
        use rust_decimal::Decimal;
        Self {
            username: username.into(),
            total_sessions: 0,
            completed_sessions: 0,
            total_trades: 0,
            best_return: Decimal::ZERO,
            worst_return: Decimal::ZERO,
            avg_trade_win_rate: Decimal::ZERO,
            avg_session_win_rate: Decimal::ZERO,
            total_commission_paid: Decimal::ZERO,
            avg_return: Decimal::ZERO,
            success_rate: Decimal::ZERO,
        }
    }
}
