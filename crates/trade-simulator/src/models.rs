use chrono::{DateTime, NaiveDate, Utc};
use core_types::TradeAction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotStatus {
    Active,
    Sold,
}

/// A FIFO-consumable position lot. `quantity_shares` is always a multiple of
/// 100 at creation and stays so as it is partially consumed on sell;
/// `status = Sold` iff `quantity_shares == 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionLot {
    pub instrument: String,
    pub quantity_shares: i64,
    pub cost_price: Decimal,
    pub buy_date: NaiveDate,
    pub buy_bar_id: i64,
    pub available_date: NaiveDate,
    pub status: LotStatus,
}

impl PositionLot {
    pub fn quantity_lots(&self) -> i64 {
        self.quantity_shares / 100
    }
}

/// An append-only trade record. For buys `stamp_tax = 0` and `net_amount =
/// amount + commission` (cash outflow); for sells `net_amount = amount -
/// commission - stamp_tax` (cash inflow).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub instrument: String,
    pub action: TradeAction,
    pub quantity_lots: i64,
    pub price: Decimal,
    pub amount: Decimal,
    pub commission: Decimal,
    pub stamp_tax: Decimal,
    pub net_amount: Decimal,
    pub trade_date: NaiveDate,
    pub bar_id: i64,
    pub timestamp: DateTime<Utc>,
}

/// A summary of the open position, derived from the active lots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSummary {
    pub total_shares: i64,
    pub total_cost: Decimal,
    pub average_cost: Decimal,
    pub market_value: Decimal,
    pub floating_pnl: Decimal,
    pub pnl_percent: Decimal,
    pub lots: Vec<PositionLot>,
}

/// Account snapshot returned by `account_info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    pub total_assets: Decimal,
    pub available_cash: Decimal,
    pub position_value: Decimal,
    pub floating_pnl: Decimal,
    pub initial_capital: Decimal,
    pub total_return: Decimal,
    pub current_bar_id: i64,
    pub max_buyable_lots: i64,
    pub position_summary: PositionSummary,
}

/// Post-session performance report, as returned by `generate_report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub account: AccountInfo,
    pub instrument: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_trades: i64,
    pub trade_win_rate: Decimal,
    pub win_count: i64,
    pub total_sell_trades: i64,
    pub session_win_rate: Decimal,
    pub total_commission: Decimal,
    pub total_stamp_tax: Decimal,
}
