use axum::{
    extract::{Query, State},
    Json,
};

use crate::db::CostRepo;
use crate::errors::AppError;
use crate::handlers::AppState;
use crate::models::{CostQueryParams, CostRecord, CostReport, CostSummary, FetchRequest, Forecast, TrendAnalysis};
use crate::period;

const DEFAULT_HISTORY_DAYS: u32 = 30;

pub async fn get_summary(
    State(state): State<AppState>,
    Query(params): Query<CostQueryParams>,
) -> Result<Json<CostSummary>, AppError> {
    let summary = state.service.get_cost_summary(&params.filter()).await?;
    Ok(Json(summary))
}

pub async fn list_records(
    State(state): State<AppState>,
    Query(params): Query<CostQueryParams>,
) -> Result<Json<Vec<CostRecord>>, AppError> {
    let records = CostRepo::get_records(&state.pool, &params.filter()).await?;
    Ok(Json(records))
}

pub async fn get_current(State(state): State<AppState>) -> Result<Json<CostSummary>, AppError> {
    let summary = state.service.get_current_costs().await?;
    Ok(Json(summary))
}

/// Refreshes a period from the provider; defaults to the current month.
pub async fn fetch(
    State(state): State<AppState>,
    body: Option<Json<FetchRequest>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let month = period::current_month_range(period::today());
    let (start, end) = match body {
        Some(Json(req)) => (
            req.start_date.unwrap_or(month.start),
            req.end_date.unwrap_or_else(|| month.last_day()),
        ),
        None => (month.start, month.last_day()),
    };
    if start > end {
        return Err(AppError::bad_request(format!("start_date {start} is after end_date {end}")));
    }

    let stored = state.service.fetch_and_store_costs(start, end).await?;
    Ok(Json(serde_json::json!({
        "stored": stored,
        "start_date": start,
        "end_date": end,
    })))
}

pub async fn get_history(
    State(state): State<AppState>,
    Query(params): Query<CostQueryParams>,
) -> Result<Json<CostSummary>, AppError> {
    let days = params.days.unwrap_or(DEFAULT_HISTORY_DAYS);
    let summary = state.service.get_cost_history(days).await?;
    Ok(Json(summary))
}

pub async fn get_trend(State(state): State<AppState>) -> Result<Json<TrendAnalysis>, AppError> {
    let trend = state.service.get_trend_analysis().await?;
    Ok(Json(trend))
}

pub async fn get_forecast(
    State(state): State<AppState>,
    Query(params): Query<CostQueryParams>,
) -> Result<Json<Forecast>, AppError> {
    let forecast = if params.local.unwrap_or(false) {
        state.service.get_local_forecast().await?
    } else {
        state.service.get_forecast().await?
    };
    Ok(Json(forecast))
}

pub async fn get_report(State(state): State<AppState>) -> Result<Json<CostReport>, AppError> {
    let report = state.service.generate_report().await?;
    Ok(Json(report))
}
