use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use crate::config::AppConfig;
use crate::db::SettingsRepo;
use crate::errors::AppError;
use crate::handlers::AppState;

#[derive(Debug, Deserialize)]
pub struct SettingValue {
    pub value: String,
}

/// Stored override first, then the loaded configuration.
pub async fn get_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (value, source) = match SettingsRepo::get(&state.pool, AppConfig::canonical_key(&key)).await? {
        Some(value) => (value, "store"),
        None => match state.config.get(&key) {
            Some(value) => (value, "config"),
            None => return Err(AppError::not_found("Setting", &key)),
        },
    };

    Ok(Json(serde_json::json!({
        "key": key,
        "value": value,
        "source": source,
    })))
}

pub async fn put_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<SettingValue>,
) -> Result<Json<serde_json::Value>, AppError> {
    if key.trim().is_empty() {
        return Err(AppError::bad_request("setting key must not be empty"));
    }
    let key = SettingsRepo::store_override(&state.pool, &key, &body.value).await?;
    tracing::info!(%key, "setting stored");

    Ok(Json(serde_json::json!({
        "key": key,
        "value": body.value,
        "source": "store",
    })))
}
