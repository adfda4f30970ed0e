//! Replay Engine (R) — a deterministic, cursor-based state machine over a
//! single instrument's daily bars: pre-session look-back window, dynamic
//! price adjustment, derived indicator series, and a stable bar-id
//! coordinate.

pub mod error;
pub mod indicators;
pub mod session;

pub use error::ReplayError;
pub use session::{
    BollSeriesPoint, IndicatorSeries, KdjSeriesPoint, MaPoint, MaSeries, MacdSeriesPoint, Progress,
    ReplaySession, RsiSeriesPoint, TradeMarker, VolumePoint,
};
