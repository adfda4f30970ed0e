use axum::extract::{Path, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use core_types::AdjustmentMode;
use persistence::UserStatistics;
use user_store::SettingsPatch;

use crate::{AppError, AppState};

pub fn users_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/:user", delete(delete_user))
        .route(
            "/api/users/:user/settings",
            get(get_settings).post(update_settings),
        )
        .route("/api/users/:user/statistics", get(get_statistics))
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
}

/// `GET /api/users` — directory scan, sorted.
async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.users.list_users()?))
}

/// `POST /api/users` — 400 if empty or already present.
async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.users.create(&req.username).await?;
    Ok(Json(MessageResponse {
        message: format!("user {} created", req.username),
    }))
}

/// `DELETE /api/users/{u}` — recursively removes the user's directory.
async fn delete_user(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let removed = state.users.delete(&user)?;
    if !removed {
        return Err(AppError::NotFound(format!("user not found: {user}")));
    }
    Ok(Json(MessageResponse {
        message: format!("user {user} deleted"),
    }))
}

/// Flat view of `config.json`'s `settings` + `preferences` groups, matching
/// the default fields listed in §4.5.
#[derive(Serialize)]
pub struct SettingsView {
    pub commission_rate: f64,
    pub min_commission: f64,
    pub stamp_tax_rate: f64,
    pub adjustment_mode: AdjustmentMode,
    pub default_initial_capital: f64,
    pub auto_save: bool,
    pub playback_speed: f64,
}

impl From<user_store::UserConfig> for SettingsView {
    fn from(config: user_store::UserConfig) -> Self {
        Self {
            commission_rate: config.settings.commission_rate,
            min_commission: config.settings.min_commission,
            stamp_tax_rate: config.settings.stamp_tax_rate,
            adjustment_mode: config.settings.adjustment_mode,
            default_initial_capital: config.settings.default_initial_capital,
            auto_save: config.preferences.auto_save,
            playback_speed: config.preferences.playback_speed,
        }
    }
}

async fn get_settings(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Json<SettingsView>, AppError> {
    let config = state.users.get_config(&user)?;
    Ok(Json(config.into()))
}

async fn update_settings(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<SettingsView>, AppError> {
    let config = state.users.update_config(&user, patch)?;
    Ok(Json(config.into()))
}

async fn get_statistics(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Json<UserStatistics>, AppError> {
    Ok(Json(state.users.statistics(&user).await?))
}
