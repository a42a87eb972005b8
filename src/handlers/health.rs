use axum::{extract::State, Json};

use crate::errors::AppError;
use crate::handlers::AppState;

pub async fn health_check(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    sqlx::query("SELECT 1").execute(&state.pool).await?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "subscription_id": state.service.account_id(),
    })))
}
