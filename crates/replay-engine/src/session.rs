//! Replay session: a deterministic, cursor-based state machine over one
//! instrument's daily bars, with a pre-session look-back window and
//! per-read price adjustment.

use chrono::{DateTime, NaiveDate, Utc};
use core_types::{unix_seconds, AdjustmentFactor, AdjustmentMode, Bar, RawBar, TradeAction, VolumeColor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::ReplayError;
use crate::indicators::{self, BollPoint, KdjPoint, MacdPoint};

const PREVIEW_WINDOW: usize = 80;

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// One marker of an executed trade, plotted against the bar it happened on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TradeMarker {
    pub bar_id: i64,
    #[serde(rename = "type")]
    pub kind: TradeAction,
    pub price: f64,
    pub time: DateTime<Utc>,
}

/// Volume bar with its up/down/flat colour, for chart rendering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VolumePoint {
    pub bar_id: i64,
    pub is_preview: bool,
    pub time: i64,
    pub date: NaiveDate,
    pub volume: f64,
    pub color: &'static str,
}

/// One point of a moving-average series.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MaPoint {
    pub bar_id: i64,
    pub is_preview: bool,
    pub time: i64,
    pub date: NaiveDate,
    pub value: f64,
}

/// A named moving-average series (`ma(periods)` returns one per period).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaSeries {
    pub period: usize,
    pub points: Vec<MaPoint>,
}

macro_rules! indicator_point {
    ($name:ident { $($field:ident: $ty:ty),* $(,)? }) => {
        #[derive(Debug, Clone, Copy, Serialize, Deserialize)]
        pub struct $name {
            pub bar_id: i64,
            pub is_preview: bool,
            $(pub $field: Option<$ty>,)*
        }
    };
}

indicator_point!(MacdSeriesPoint { dif: f64, dea: f64, histogram: f64 });
indicator_point!(KdjSeriesPoint { k: f64, d: f64, j: f64 });
indicator_point!(RsiSeriesPoint { rsi_6: f64, rsi_12: f64, rsi_24: f64 });
indicator_point!(BollSeriesPoint { middle: f64, upper: f64, lower: f64 });

/// Result of `indicator(kind)` — empty/`Unknown` for an unrecognised kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "UPPERCASE")]
pub enum IndicatorSeries {
    Macd(Vec<MacdSeriesPoint>),
    Kdj(Vec<KdjSeriesPoint>),
    Rsi(Vec<RsiSeriesPoint>),
    Boll(Vec<BollSeriesPoint>),
    Unknown,
}

/// Progress through the training portion of a session (excludes preview bars).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Progress {
    pub training_current: i64,
    pub training_total: i64,
    pub training_progress: f64,
}

/// A deterministic, cursor-based replay over one instrument.
#[derive(Debug, Clone)]
pub struct ReplaySession {
    full_data: Vec<RawBar>,
    factors: Vec<f64>,
    preview_bars: usize,
    current_index: usize,
    max_index: usize,
    mode: AdjustmentMode,
    markers: Vec<TradeMarker>,
}

impl ReplaySession {
    /// Build a session per §4.1: locate the first bar on/after `start_date`,
    /// pull up to 80 bars of look-back before it, and left-join the factor
    /// table onto the resulting slice (missing factors default to 1.0).
    pub fn new(
        instrument: &str,
        raw_bars: &[RawBar],
        factor_bars: &[AdjustmentFactor],
        start_date: NaiveDate,
    ) -> Result<Self, ReplayError> {
        if raw_bars.is_empty() {
            return Err(ReplayError::NoData(instrument.to_string()));
        }
        let s = raw_bars
            .iter()
            .position(|b| b.date >= start_date)
            .ok_or_else(|| ReplayError::NoDataAfterStart(instrument.to_string()))?;
        let p = s.saturating_sub(PREVIEW_WINDOW);

        let full_data = raw_bars[p..].to_vec();
        let preview_bars = s - p;
        let max_index = full_data.len() - 1;

        let factor_map: HashMap<NaiveDate, f64> =
            factor_bars.iter().map(|f| (f.date, f.factor)).collect();
        let factors = full_data
            .iter()
            .map(|b| factor_map.get(&b.date).copied().unwrap_or(1.0))
            .collect();

        Ok(Self {
            full_data,
            factors,
            preview_bars,
            current_index: preview_bars,
            max_index,
            mode: AdjustmentMode::default(),
            markers: Vec::new(),
        })
    }

    fn bar_id_offset(&self) -> i64 {
        1 - self.preview_bars as i64
    }

    pub fn bar_id_at(&self, index: usize) -> i64 {
        index as i64 + self.bar_id_offset()
    }

    pub fn current_bar_id(&self) -> i64 {
        self.bar_id_at(self.current_index)
    }

    fn is_preview_at(&self, index: usize) -> bool {
        self.bar_id_at(index) <= 0
    }

    /// Adjustment ratio for `index`, relative to `reference_index`, per the
    /// mode-specific formula in §4.1.1.
    fn ratio(&self, index: usize, reference_index: usize) -> f64 {
        match self.mode {
            AdjustmentMode::None => 1.0,
            AdjustmentMode::Backward => self.factors[index] / self.factors[0],
            AdjustmentMode::Forward | AdjustmentMode::DynamicForward => {
                self.factors[index] / self.factors[reference_index]
            }
        }
    }

    fn adjusted_bar(&self, index: usize) -> Bar {
        let raw = &self.full_data[index];
        let r = self.ratio(index, self.current_index);
        Bar {
            bar_id: self.bar_id_at(index),
            time: unix_seconds(raw.date),
            date: raw.date,
            open: round2(raw.open * r),
            high: round2(raw.high * r),
            low: round2(raw.low * r),
            close: round2(raw.close * r),
            volume: raw.volume,
            is_preview: self.is_preview_at(index),
        }
    }

    /// Adjusted close series over `0..=current_index`, recomputed fresh
    /// every call under `dynamic_forward` (no cached vector is kept —
    /// the value of a past bar is not stable, only bar_id/date are).
    fn adjusted_closes(&self) -> Vec<f64> {
        (0..=self.current_index)
            .map(|i| round2(self.full_data[i].close * self.ratio(i, self.current_index)))
            .collect()
    }

    fn adjusted_highs(&self) -> Vec<f64> {
        (0..=self.current_index)
            .map(|i| round2(self.full_data[i].high * self.ratio(i, self.current_index)))
            .collect()
    }

    fn adjusted_lows(&self) -> Vec<f64> {
        (0..=self.current_index)
            .map(|i| round2(self.full_data[i].low * self.ratio(i, self.current_index)))
            .collect()
    }

    pub fn visible_bars(&self) -> Vec<Bar> {
        (0..=self.current_index).map(|i| self.adjusted_bar(i)).collect()
    }

    pub fn volume_series(&self) -> Vec<VolumePoint> {
        (0..=self.current_index)
            .map(|i| {
                let bar = self.adjusted_bar(i);
                let color = VolumeColor::from_open_close(bar.open, bar.close);
                VolumePoint {
                    bar_id: bar.bar_id,
                    is_preview: bar.is_preview,
                    time: bar.time,
                    date: bar.date,
                    volume: bar.volume,
                    color: color.hex(),
                }
            })
            .collect()
    }

    pub fn ma(&self, periods: &[usize]) -> Vec<MaSeries> {
        let closes = self.adjusted_closes();
        periods
            .iter()
            .map(|&period| {
                let values = indicators::sma(&closes, period);
                let points = values
                    .into_iter()
                    .enumerate()
                    .filter_map(|(i, v)| {
                        v.map(|value| MaPoint {
                            bar_id: self.bar_id_at(i),
                            is_preview: self.is_preview_at(i),
                            time: unix_seconds(self.full_data[i].date),
                            date: self.full_data[i].date,
                            value,
                        })
                    })
                    .collect();
                MaSeries { period, points }
            })
            .collect()
    }

    /// `MACD` / `KDJ` / `RSI` / `BOLL`, case-insensitive; unknown kinds
    /// come back as `IndicatorSeries::Unknown` rather than an error.
    pub fn indicator(&self, kind: &str) -> IndicatorSeries {
        match kind.to_ascii_uppercase().as_str() {
            "MACD" => {
                let closes = self.adjusted_closes();
                let points = indicators::macd(&closes, 12, 26, 9);
                IndicatorSeries::Macd(
                    points
                        .into_iter()
                        .enumerate()
                        .map(|(i, MacdPoint { dif, dea, histogram })| MacdSeriesPoint {
                            bar_id: self.bar_id_at(i),
                            is_preview: self.is_preview_at(i),
                            dif: Some(dif),
                            dea: Some(dea),
                            histogram: Some(histogram),
                        })
                        .collect(),
                )
            }
            "KDJ" => {
                let highs = self.adjusted_highs();
                let lows = self.adjusted_lows();
                let closes = self.adjusted_closes();
                let points = indicators::kdj(&highs, &lows, &closes, 9, 3, 3);
                IndicatorSeries::Kdj(
                    points
                        .into_iter()
                        .enumerate()
                        .map(|(i, p)| {
                            let p: Option<KdjPoint> = p;
                            KdjSeriesPoint {
                                bar_id: self.bar_id_at(i),
                                is_preview: self.is_preview_at(i),
                                k: p.map(|v| v.k),
                                d: p.map(|v| v.d),
                                j: p.map(|v| v.j),
                            }
                        })
                        .collect(),
                )
            }
            "RSI" => {
                let closes = self.adjusted_closes();
                let r6 = indicators::rsi(&closes, 6);
                let r12 = indicators::rsi(&closes, 12);
                let r24 = indicators::rsi(&closes, 24);
                let points = (0..closes.len())
                    .map(|i| RsiSeriesPoint {
                        bar_id: self.bar_id_at(i),
                        is_preview: self.is_preview_at(i),
                        rsi_6: r6[i],
                        rsi_12: r12[i],
                        rsi_24: r24[i],
                    })
                    .collect();
                IndicatorSeries::Rsi(points)
            }
            "BOLL" => {
                let closes = self.adjusted_closes();
                let points = indicators::bollinger(&closes, 20, 2.0);
                IndicatorSeries::Boll(
                    points
                        .into_iter()
                        .enumerate()
                        .map(|(i, p)| {
                            let p: Option<BollPoint> = p;
                            BollSeriesPoint {
                                bar_id: self.bar_id_at(i),
                                is_preview: self.is_preview_at(i),
                                middle: p.map(|v| v.middle),
                                upper: p.map(|v| v.upper),
                                lower: p.map(|v| v.lower),
                            }
                        })
                        .collect(),
                )
            }
            _ => IndicatorSeries::Unknown,
        }
    }

    pub fn current_bar(&self) -> Option<Bar> {
        if self.current_index < self.full_data.len() {
            Some(self.adjusted_bar(self.current_index))
        } else {
            None
        }
    }

    pub fn current_volume(&self) -> Option<f64> {
        self.full_data.get(self.current_index).map(|b| b.volume)
    }

    pub fn current_date(&self) -> Option<NaiveDate> {
        self.full_data.get(self.current_index).map(|b| b.date)
    }

    pub fn previous_close(&self) -> Option<f64> {
        if self.current_index == 0 {
            return None;
        }
        let i = self.current_index - 1;
        Some(round2(self.full_data[i].close * self.ratio(i, self.current_index)))
    }

    pub fn add_trade_marker(&mut self, action: TradeAction, price: f64) {
        self.markers.push(TradeMarker {
            bar_id: self.current_bar_id(),
            kind: action,
            price,
            time: Utc::now(),
        });
    }

    pub fn trade_markers(&self) -> Vec<TradeMarker> {
        self.markers.clone()
    }

    /// Advance the cursor by one bar. Returns `false` (without moving) once
    /// `current_index` is already at `max_index`.
    pub fn next_bar(&mut self) -> bool {
        if self.current_index >= self.max_index {
            return false;
        }
        self.current_index += 1;
        true
    }

    pub fn has_next(&self) -> bool {
        self.current_index < self.max_index
    }

    pub fn progress(&self) -> Progress {
        let training_current = (self.current_index as i64 - self.preview_bars as i64).max(0);
        let training_total = self.max_index as i64 - self.preview_bars as i64;
        let training_progress = if training_total == 0 {
            0.0
        } else {
            100.0 * training_current as f64 / training_total as f64
        };
        Progress {
            training_current,
            training_total,
            training_progress,
        }
    }

    pub fn set_adjustment(&mut self, mode: &str) -> Result<(), ReplayError> {
        self.mode = AdjustmentMode::from_str(mode).map_err(ReplayError::InvalidMode)?;
        Ok(())
    }

    pub fn adjustment_mode(&self) -> AdjustmentMode {
        self.mode
    }

    pub fn reset(&mut self) {
        self.current_index = self.preview_bars;
        self.markers.clear();
    }

    /// Move the cursor to the largest index whose date is `<= d`. Never
    /// drops below `preview_bars`, preserving the `preview_bars <=
    /// current_index` invariant even when `d` falls inside the look-back
    /// window.
    pub fn jump_to_date(&mut self, d: NaiveDate) -> bool {
        let found = self.full_data.iter().rposition(|b| b.date <= d);
        match found {
            Some(i) => {
                self.current_index = i.max(self.preview_bars);
                true
            }
            None => false,
        }
    }

    pub fn preview_bars(&self) -> usize {
        self.preview_bars
    }

    pub fn max_index(&self) -> usize {
        self.max_index
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(date: NaiveDate, close: f64) -> RawBar {
        RawBar {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
            turnover: 0.0,
            amplitude: 0.0,
            change_pct: 0.0,
            change_amount: 0.0,
            turnover_rate: 0.0,
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn construction_preview_window() {
        let mut raw = Vec::new();
        for i in 0..100 {
            raw.push(bar(d(2024, 1, 1) + chrono::Duration::days(i), 10.0 + i as f64));
        }
        let start = d(2024, 1, 1) + chrono::Duration::days(90);
        let session = ReplaySession::new("000001", &raw, &[], start).unwrap();
        assert_eq!(session.preview_bars(), 80);
        assert_eq!(session.current_bar_id(), 1);
    }

    #[test]
    fn dynamic_forward_rescales_on_advance() {
        let raw = vec![
            bar(d(2024, 1, 1), 10.0),
            bar(d(2024, 1, 2), 11.0),
            bar(d(2024, 1, 3), 12.0),
            bar(d(2024, 1, 4), 13.0),
        ];
        let factors = vec![
            AdjustmentFactor { date: d(2024, 1, 1), factor: 1.0 },
            AdjustmentFactor { date: d(2024, 1, 2), factor: 1.1 },
            AdjustmentFactor { date: d(2024, 1, 3), factor: 1.21 },
            AdjustmentFactor { date: d(2024, 1, 4), factor: 1.331 },
        ];
        let mut session = ReplaySession::new("000001", &raw, &factors, d(2024, 1, 1)).unwrap();
        session.next_bar();
        session.next_bar();
        let closes: Vec<f64> = session.visible_bars().iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![8.26, 10.0, 12.0]);

        session.next_bar();
        let closes: Vec<f64> = session.visible_bars().iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![7.51, 9.09, 10.91]);
    }

    #[test]
    fn next_bar_stops_at_max_index() {
        let raw = vec![bar(d(2024, 1, 1), 10.0), bar(d(2024, 1, 2), 11.0)];
        let mut session = ReplaySession::new("000001", &raw, &[], d(2024, 1, 1)).unwrap();
        assert!(session.next_bar());
        assert!(!session.next_bar());
    }

    #[test]
    fn bar_id_sign_matches_preview_flag() {
        let raw: Vec<RawBar> = (0..5)
            .map(|i| bar(d(2024, 1, 1) + chrono::Duration::days(i), 10.0))
            .collect();
        let session = ReplaySession::new("000001", &raw, &[], d(2024, 1, 4)).unwrap();
        for (i, b) in session.visible_bars().iter().enumerate() {
            assert_eq!(b.is_preview, b.bar_id <= 0);
            assert_eq!(b.bar_id, session.bar_id_at(i));
        }
    }
}
