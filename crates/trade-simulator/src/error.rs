use thiserror::Error;

/// Domain violations raised by [`crate::engine::TradeLedger`]. All of these
/// are reported to the caller with no state change — they never leave the
/// ledger partially updated.
#[derive(Error, Debug)]
pub enum TradeError {
    #[error("quantity must be a positive number of lots")]
    InvalidQuantity,

    #[error("order of {requested} lots exceeds max buyable of {max_buyable} lots")]
    ExceedsMaxBuyable { requested: i64, max_buyable: i64 },

    #[error("insufficient funds: need {required}, have {available}")]
    InsufficientFunds {
        required: rust_decimal::Decimal,
        available: rust_decimal::Decimal,
    },

    #[error("insufficient available shares: need {requested_shares}, available {available_shares}")]
    InsufficientAvailableShares {
        requested_shares: i64,
        available_shares: i64,
    },
}
