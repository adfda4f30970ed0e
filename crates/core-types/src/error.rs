use thiserror::Error;

/// Errors shared across the replay/trade/persistence boundary — anything
/// tied to the shape of bar data itself rather than to one component's
/// internal state.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("no bar data available for instrument {0}")]
    NoData(String),

    #[error("no bar data on or after start date for instrument {0}")]
    NoDataAfterStart(String),

    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("invalid date: {0}")]
    InvalidDate(String),
}
