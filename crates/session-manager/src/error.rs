use thiserror::Error;

/// Errors raised by the session manager (S) — wraps the component errors of
/// R/T/P plus the resource-absence and input-validation cases that are S's
/// own responsibility (§7).
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("invalid instrument or start date: {0}")]
    InvalidInstrumentOrDate(String),

    #[error(transparent)]
    MarketData(#[from] market_data::MarketDataError),

    #[error(transparent)]
    Replay(#[from] replay_engine::ReplayError),

    #[error(transparent)]
    Trade(#[from] trade_simulator::TradeError),

    #[error(transparent)]
    Persistence(#[from] persistence::PersistenceError),
}
