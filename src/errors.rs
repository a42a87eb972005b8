use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failures surfaced by the billing client, the store and the cost service.
#[derive(Debug, Error)]
pub enum CostError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("authentication error: {0}")]
    Authentication(String),

    #[error("failed to get token: {0}")]
    Token(String),

    #[error("request failed with status {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("invalid provider response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Forecast(#[from] crate::ml::forecast::ForecastError),
}

pub type CostResult<T> = Result<T, CostError>;

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub body: ApiError,
}

impl AppError {
    fn new(status: StatusCode, code: &str, msg: impl Into<String>) -> Self {
        Self {
            status,
            body: ApiError {
                code: code.into(),
                message: msg.into(),
                details: None,
            },
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg)
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{resource} with id '{id}' not found"),
        )
    }

    pub fn bad_gateway(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg)
    }

    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "UNPROCESSABLE", msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<CostError> for AppError {
    fn from(err: CostError) -> Self {
        match err {
            CostError::Configuration(msg) => Self::bad_request(msg),
            CostError::Authentication(_) | CostError::Token(_) => Self::unauthorized(err.to_string()),
            CostError::Upstream { status, body } => {
                let mut app = Self::bad_gateway(format!("provider returned status {status}"));
                app.body.details = Some(serde_json::json!({ "status": status, "body": body }));
                app
            }
            CostError::Transport(_) | CostError::Decode(_) => Self::bad_gateway(err.to_string()),
            CostError::Forecast(_) => Self::unprocessable(err.to_string()),
            CostError::Storage(ref db_err) => {
                tracing::error!("Database error: {:?}", db_err);
                Self::internal("Database error")
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        CostError::Storage(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_maps_to_bad_gateway_with_details() {
        let app: AppError = CostError::Upstream {
            status: 403,
            body: "forbidden".into(),
        }
        .into();
        assert_eq!(app.status, StatusCode::BAD_GATEWAY);
        let details = app.body.details.unwrap();
        assert_eq!(details["status"], 403);
        assert_eq!(details["body"], "forbidden");
    }

    #[test]
    fn test_configuration_maps_to_bad_request() {
        let app: AppError = CostError::Configuration("threshold must be greater than 0".into()).into();
        assert_eq!(app.status, StatusCode::BAD_REQUEST);
        assert_eq!(app.body.code, "BAD_REQUEST");
    }
}
