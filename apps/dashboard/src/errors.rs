use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::api_client::ApiError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Upstream error: {0}")]
    Upstream(#[from] ApiError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, retryable) = match &self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                false,
            ),
            AppError::Upstream(ApiError::AuthExpired) => (
                StatusCode::UNAUTHORIZED,
                "SESSION_EXPIRED",
                "Your session has expired. Please sign in again.".to_string(),
                false,
            ),
            AppError::Upstream(ApiError::NotFound) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "The requested resource does not exist".to_string(),
                false,
            ),
            AppError::Upstream(ApiError::InvalidRequest(msg)) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                false,
            ),
            AppError::Upstream(ApiError::Api { status, message })
                if (400..500).contains(status) && *status != 429 =>
            {
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "UPSTREAM_REJECTED",
                    message.clone(),
                    false,
                )
            }
            AppError::Upstream(e) => {
                tracing::error!("Upstream error: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_UNAVAILABLE",
                    "The job service could not be reached. Please try again.".to_string(),
                    e.is_transient(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    false,
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
                "retryable": retryable
            }
        }));

        (status, body).into_response()
    }
}
