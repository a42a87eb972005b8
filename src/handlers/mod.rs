pub mod alerts;
pub mod costs;
pub mod health;
pub mod settings;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use sqlx::SqlitePool;

use crate::config::AppConfig;
use crate::services::CostService;

/// Shared application state available to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CostService>,
    pub pool: SqlitePool,
    pub config: Arc<AppConfig>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        // Costs
        .route("/api/v1/costs/summary", get(costs::get_summary))
        .route("/api/v1/costs/records", get(costs::list_records))
        .route("/api/v1/costs/current", get(costs::get_current))
        .route("/api/v1/costs/fetch", post(costs::fetch))
        .route("/api/v1/costs/history", get(costs::get_history))
        .route("/api/v1/costs/trend", get(costs::get_trend))
        .route("/api/v1/costs/forecast", get(costs::get_forecast))
        .route("/api/v1/costs/report", get(costs::get_report))
        // Alerts
        .route("/api/v1/alerts", get(alerts::list).post(alerts::create))
        .route("/api/v1/alerts/check", get(alerts::check))
        .route("/api/v1/alerts/:name", delete(alerts::delete))
        // Settings
        .route(
            "/api/v1/settings/:key",
            get(settings::get_setting).put(settings::put_setting),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::TrendConfig;
    use crate::db::test_pool;
    use crate::services::costs::tests::{january_lines, FakeBilling};

    async fn app_with(billing: FakeBilling) -> Router {
        let pool = test_pool().await;
        let service = CostService::new(pool.clone(), Arc::new(billing), TrendConfig::default());
        router(AppState {
            service: Arc::new(service),
            pool,
            config: Arc::new(AppConfig::default()),
        })
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let app = app_with(FakeBilling::new(vec![])).await;
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["subscription_id"], "sub-1");
    }

    #[tokio::test]
    async fn test_fetch_then_summary_and_records() {
        let app = app_with(FakeBilling::new(january_lines())).await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/costs/fetch",
            Some(json!({ "start_date": "2024-01-01", "end_date": "2024-01-31" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stored"], 2);

        let (status, summary) = send(
            &app,
            "GET",
            "/api/v1/costs/summary?start_date=2024-01-01&end_date=2024-01-31",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["total_cost"], 80.0);
        assert_eq!(summary["by_service"]["VM"], 50.0);
        assert_eq!(summary["by_service"]["Storage"], 30.0);

        let (_, records) = send(&app, "GET", "/api/v1/costs/records?service=Storage", None).await;
        let records = records.as_array().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["date"], "2024-01-10");
    }

    #[tokio::test]
    async fn test_fetch_rejects_inverted_range() {
        let app = app_with(FakeBilling::new(vec![])).await;
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/costs/fetch",
            Some(json!({ "start_date": "2024-02-01", "end_date": "2024-01-01" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_provider_forecast_failure_is_bad_gateway() {
        let app = app_with(FakeBilling::new(vec![])).await;
        let (status, body) = send(&app, "GET", "/api/v1/costs/forecast", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["details"]["status"], 500);
    }

    #[tokio::test]
    async fn test_local_forecast_without_history_is_unprocessable() {
        let app = app_with(FakeBilling::new(vec![])).await;
        let (status, _) = send(&app, "GET", "/api/v1/costs/forecast?local=true", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_alert_lifecycle() {
        let app = app_with(FakeBilling::new(vec![])).await;

        let (status, body) = send(&app, "POST", "/api/v1/alerts", Some(json!({ "name": "bad", "threshold": 0 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("threshold"));

        let (status, created) =
            send(&app, "POST", "/api/v1/alerts", Some(json!({ "name": "monthly", "threshold": 500.0 }))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["subscription_id"], "sub-1");

        let (_, check) = send(&app, "GET", "/api/v1/alerts/check", None).await;
        assert_eq!(check["evaluations"][0]["status"], "OK");

        let (status, body) = send(&app, "DELETE", "/api/v1/alerts/monthly", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"], 1);

        let (status, body) = send(&app, "DELETE", "/api/v1/alerts/monthly", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"], 0);
    }

    #[tokio::test]
    async fn test_settings_store_then_config_fallback() {
        let app = app_with(FakeBilling::new(vec![])).await;

        let (status, body) = send(&app, "GET", "/api/v1/settings/http.timeout_secs", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["value"], "60");
        assert_eq!(body["source"], "config");

        let (status, _) = send(&app, "PUT", "/api/v1/settings/subscription", Some(json!({ "value": "sub-9" }))).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = send(&app, "GET", "/api/v1/settings/subscription", None).await;
        assert_eq!(body["value"], "sub-9");
        assert_eq!(body["source"], "store");

        let (status, body) = send(&app, "GET", "/api/v1/settings/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_put_setting_validates_key_and_value() {
        let app = app_with(FakeBilling::new(vec![])).await;

        let (status, body) = send(&app, "PUT", "/api/v1/settings/trend.history_months", Some(json!({ "value": "six" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");

        let (status, _) = send(&app, "PUT", "/api/v1/settings/unknown.key", Some(json!({ "value": "1" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, "PUT", "/api/v1/settings/subscription", Some(json!({ "value": "sub-2" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["key"], "azure.subscription_id");
        let (_, body) = send(&app, "GET", "/api/v1/settings/azure.subscription_id", None).await;
        assert_eq!(body["value"], "sub-2");
    }
}
