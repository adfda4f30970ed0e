use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use market_data::MarketDataError;
use persistence::PersistenceError;
use replay_engine::ReplayError;
use session_manager::SessionError;
use user_store::UserStoreError;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Errors surfaced across the HTTP/JSON edge, mapped to the three status
/// classes the external interface promises (§6/§7): bad input, missing
/// resource, unexpected failure.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(err) => {
                tracing::error!(error = %err, "unhandled api-server error");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::SessionNotFound(id) => AppError::NotFound(format!("session not found: {id}")),
            SessionError::InvalidInstrumentOrDate(msg) => AppError::BadRequest(msg),
            SessionError::MarketData(e) => e.into(),
            SessionError::Replay(e) => e.into(),
            SessionError::Trade(e) => AppError::BadRequest(e.to_string()),
            SessionError::Persistence(e) => e.into(),
        }
    }
}

impl From<MarketDataError> for AppError {
    fn from(err: MarketDataError) -> Self {
        match err {
            MarketDataError::NoData(_)
            | MarketDataError::UnknownInstrument(_)
            | MarketDataError::InvalidSector(_)
            | MarketDataError::InvalidYearRange(_) => AppError::BadRequest(err.to_string()),
            MarketDataError::Io { .. } | MarketDataError::Csv { .. } => {
                AppError::Internal(anyhow::anyhow!(err))
            }
        }
    }
}

impl From<ReplayError> for AppError {
    fn from(err: ReplayError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<PersistenceError> for AppError {
    fn from(err: PersistenceError) -> Self {
        AppError::Internal(anyhow::anyhow!(err))
    }
}

impl From<UserStoreError> for AppError {
    fn from(err: UserStoreError) -> Self {
        match err {
            UserStoreError::UserNotFound(u) => AppError::NotFound(format!("user not found: {u}")),
            UserStoreError::EmptyUsername => AppError::BadRequest("username is empty".into()),
            UserStoreError::AlreadyExists(u) => {
                AppError::BadRequest(format!("user already exists: {u}"))
            }
            UserStoreError::Io(_) | UserStoreError::Serde(_) | UserStoreError::Persistence(_) => {
                AppError::Internal(anyhow::anyhow!(err))
            }
        }
    }
}
