use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::db::AlertRepo;
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::{Alert, AlertCheck, CreateAlertRequest};

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Alert>>, AppError> {
    let alerts = AlertRepo::list(&state.pool).await?;
    Ok(Json(alerts))
}

pub async fn create(
    State(state): State<AppState>,
    Json(create_req): Json<CreateAlertRequest>,
) -> Result<(StatusCode, Json<Alert>), AppError> {
    let alert = state.service.create_alert(&create_req).await?;
    Ok((StatusCode::CREATED, Json(alert)))
}

pub async fn check(State(state): State<AppState>) -> Result<Json<AlertCheck>, AppError> {
    let check = state.service.check_alerts().await?;
    Ok(Json(check))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let deleted = AlertRepo::delete_by_name(&state.pool, &name).await?;
    Ok(Json(serde_json::json!({ "name": name, "deleted": deleted })))
}
