use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use core_types::{CommissionSettings, TradeAction};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use market_data::Sector;
use session_manager::{AdvanceOutcome, SessionError, StartMode, StartParams};

use crate::users_routes::MessageResponse;
use crate::{AppError, AppState};

pub fn training_routes() -> Router<AppState> {
    Router::new()
        .route("/api/training/start", post(start_training))
        .route("/api/training/:id/data", get(get_data))
        .route("/api/training/:id/next", post(advance))
        .route("/api/training/:id/adjustment", post(set_adjustment))
        .route("/api/training/:id/trade", post(trade))
        .route("/api/training/:id/account", get(account))
        .route("/api/training/:id/indicators/:kind", get(indicator))
        .route("/api/training/:id/end", post(end_session))
        .route("/api/training/:id/reset", post(reset_session))
        .route("/api/training/:id/history", get(history))
        .route("/api/health", get(health))
}

#[derive(Deserialize)]
pub struct StartTrainingRequest {
    pub user: String,
    pub mode: String,
    pub initial_capital: f64,
    pub sector: Option<String>,
    pub year_range: Option<String>,
    pub stock_code: Option<String>,
    pub start_date: Option<String>,
}

async fn start_training(
    State(state): State<AppState>,
    Json(req): Json<StartTrainingRequest>,
) -> Result<Json<session_manager::StartedSession>, AppError> {
    let mode = match req.mode.as_str() {
        "random" => {
            let sector: Sector = req
                .sector
                .as_deref()
                .unwrap_or("all")
                .parse()
                .map_err(|e: market_data::MarketDataError| AppError::BadRequest(e.to_string()))?;
            let year_range = req
                .year_range
                .ok_or_else(|| AppError::BadRequest("year_range is required in random mode".into()))?;
            StartMode::Random { sector, year_range }
        }
        "specified" => {
            let stock_code = req
                .stock_code
                .ok_or_else(|| AppError::BadRequest("stock_code is required in specified mode".into()))?;
            let start_date = req
                .start_date
                .ok_or_else(|| AppError::BadRequest("start_date is required in specified mode".into()))?;
            let start_date = NaiveDate::parse_from_str(&start_date, "%Y-%m-%d")
                .map_err(|e| AppError::BadRequest(format!("invalid start_date: {e}")))?;
            StartMode::Specified {
                stock_code,
                start_date,
            }
        }
        other => return Err(AppError::BadRequest(format!("invalid mode: {other}"))),
    };

    if req.initial_capital <= 0.0 {
        return Err(AppError::BadRequest("initial_capital must be positive".into()));
    }
    let initial_capital = Decimal::from_f64(req.initial_capital)
        .ok_or_else(|| AppError::BadRequest("invalid initial_capital".into()))?;

    let config = state.users.get_config(&req.user)?;
    let commission = CommissionSettings {
        commission_rate: config.settings.commission_rate,
        min_commission: config.settings.min_commission,
        stamp_tax_rate: config.settings.stamp_tax_rate,
    };

    let started = state
        .sessions
        .start(StartParams {
            user: req.user,
            mode,
            initial_capital,
            commission,
        })
        .await?;
    Ok(Json(started))
}

async fn get_data(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<session_manager::SessionData>, AppError> {
    Ok(Json(state.sessions.data(&id).await?))
}

async fn advance(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AdvanceOutcome>, AppError> {
    Ok(Json(state.sessions.advance(&id).await?))
}

#[derive(Deserialize)]
pub struct AdjustmentRequest {
    pub adjustment: String,
}

async fn set_adjustment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AdjustmentRequest>,
) -> Result<Json<session_manager::AdjustmentRefresh>, AppError> {
    Ok(Json(state.sessions.set_adjustment(&id, &req.adjustment).await?))
}

#[derive(Deserialize)]
pub struct TradeRequestBody {
    pub action: String,
    pub quantity: i64,
}

/// Domain violations (insufficient funds, exceeds max buyable, …) are
/// reported inline as `{success:false, message}` rather than as an HTTP
/// error — per §7 they never change state and are always recoverable by
/// the client.
#[derive(Serialize)]
pub struct TradeFailure {
    pub success: bool,
    pub message: String,
}

async fn trade(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<TradeRequestBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let action: TradeAction = req
        .action
        .parse()
        .map_err(|e: String| AppError::BadRequest(e))?;

    match state.sessions.trade(&id, action, req.quantity).await {
        Ok(outcome) => Ok(Json(serde_json::to_value(outcome).expect("TradeOutcome is serializable"))),
        Err(SessionError::Trade(err)) => Ok(Json(
            serde_json::to_value(TradeFailure {
                success: false,
                message: err.to_string(),
            })
            .expect("TradeFailure is serializable"),
        )),
        Err(other) => Err(other.into()),
    }
}

async fn account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<trade_simulator::AccountInfo>, AppError> {
    Ok(Json(state.sessions.account(&id).await?))
}

async fn indicator(
    State(state): State<AppState>,
    Path((id, kind)): Path<(String, String)>,
) -> Result<Json<replay_engine::IndicatorSeries>, AppError> {
    Ok(Json(state.sessions.indicator(&id, &kind).await?))
}

async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<trade_simulator::Report>, AppError> {
    Ok(Json(state.sessions.end(&id).await?))
}

async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.sessions.reset(&id).await?;
    Ok(Json(MessageResponse {
        message: format!("session {id} reset"),
    }))
}

async fn history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<session_manager::SessionHistory>, AppError> {
    Ok(Json(state.sessions.history(&id).await?))
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: chrono::DateTime<Utc>,
    pub active_trainings: usize,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
        active_trainings: state.sessions.active_count(),
    })
}
