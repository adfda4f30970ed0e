use thiserror::Error;

/// Errors raised while constructing or driving a [`crate::session::ReplaySession`].
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("no bar data available for instrument {0}")]
    NoData(String),

    #[error("no bar data on or after start date for instrument {0}")]
    NoDataAfterStart(String),

    #[error("invalid adjustment mode: {0}")]
    InvalidMode(String),
}
