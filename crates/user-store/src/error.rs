use thiserror::Error;

/// Errors raised by the user/config store (U).
#[derive(Error, Debug)]
pub enum UserStoreError {
    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("username is empty")]
    EmptyUsername,

    #[error("user already exists: {0}")]
    AlreadyExists(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Persistence(#[from] persistence::PersistenceError),
}
