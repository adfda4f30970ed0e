//! Session Manager (S) — owns the process-wide `{session_id -> (R, T,
//! metadata)}` mapping, serialising operations per session while letting
//! independent sessions run fully concurrently (§4.4, §5).

pub mod error;
pub mod manager;
pub mod provider;
pub mod types;

pub use error::SessionError;
pub use manager::SessionManager;
pub use provider::MarketDataProvider;
pub use types::*;
