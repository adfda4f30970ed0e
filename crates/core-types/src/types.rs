use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One day's OHLCV record for one instrument, as supplied by the market-data
/// provider before any adjustment is applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub turnover: f64,
    pub amplitude: f64,
    pub change_pct: f64,
    pub change_amount: f64,
    pub turnover_rate: f64,
}

/// `(date, factor)` pair joined onto a raw-bar series by date. `factor > 0`;
/// a missing factor for a given date defaults to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentFactor {
    pub date: NaiveDate,
    pub factor: f64,
}

/// An ex-dividend event, loaded alongside the bar/factor tables but not yet
/// consumed by the adjustment math (the factor table is authoritative — see
/// the design notes on factor semantics).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExDividendEvent {
    pub date: NaiveDate,
    pub cash_dividend: f64,
    pub split_ratio: f64,
}

/// Midnight UTC of `date`, as unix seconds — the `time` coordinate chart
/// payloads are keyed on.
pub fn unix_seconds(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
        .and_utc()
        .timestamp()
}

/// Adjusted OHLC + raw volume at one coordinate in a session's visible
/// window, with the bar-id coordinate and preview flag attached.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bar {
    pub bar_id: i64,
    pub time: i64,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub is_preview: bool,
}

/// Price adjustment mode applied when reading bars out of a replay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentMode {
    None,
    Forward,
    Backward,
    DynamicForward,
}

impl Default for AdjustmentMode {
    fn default() -> Self {
        AdjustmentMode::DynamicForward
    }
}

impl std::str::FromStr for AdjustmentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(AdjustmentMode::None),
            "forward" => Ok(AdjustmentMode::Forward),
            "backward" => Ok(AdjustmentMode::Backward),
            "dynamic_forward" => Ok(AdjustmentMode::DynamicForward),
            other => Err(format!("unknown adjustment mode: {other}")),
        }
    }
}

impl std::fmt::Display for AdjustmentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AdjustmentMode::None => "none",
            AdjustmentMode::Forward => "forward",
            AdjustmentMode::Backward => "backward",
            AdjustmentMode::DynamicForward => "dynamic_forward",
        };
        f.write_str(s)
    }
}

/// Volume bar colour, derived from comparing adjusted close against adjusted
/// open for the same bar (up -> red, down -> green, flat -> black, matching
/// the CN-market convention the source chart used).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeColor {
    Up,
    Down,
    Flat,
}

impl VolumeColor {
    pub fn hex(&self) -> &'static str {
        match self {
            VolumeColor::Up => "#ff4d4f",
            VolumeColor::Down => "#008000",
            VolumeColor::Flat => "#000000",
        }
    }

    pub fn from_open_close(open: f64, close: f64) -> Self {
        if close > open {
            VolumeColor::Up
        } else if close < open {
            VolumeColor::Down
        } else {
            VolumeColor::Flat
        }
    }
}

/// Commission/stamp-tax schedule a user trades under, pushed into a fresh
/// `TradeLedger` at session start. Shared between `user-store` (where it is
/// part of the persisted config document) and `session-manager` (which reads
/// it to construct T) without either depending on the other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommissionSettings {
    pub commission_rate: f64,
    pub min_commission: f64,
    pub stamp_tax_rate: f64,
}

impl Default for CommissionSettings {
    fn default() -> Self {
        Self {
            commission_rate: 0.0003,
            min_commission: 5.0,
            stamp_tax_rate: 0.001,
        }
    }
}

/// Trade action as recorded by the trade simulator and replay marker log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
}

impl std::str::FromStr for TradeAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "buy" => Ok(TradeAction::Buy),
            "sell" => Ok(TradeAction::Sell),
            other => Err(format!("invalid trade action: {other}")),
        }
    }
}

impl std::fmt::Display for TradeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeAction::Buy => f.write_str("buy"),
            TradeAction::Sell => f.write_str("sell"),
        }
    }
}
