use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use heatlens_core::error::PayloadError;

/// Application-level errors that map directly to HTTP responses.
///
/// Every variant implements [`IntoResponse`] so Axum handlers can use
/// `Result<impl IntoResponse, AppError>` as their return type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Pageview for an unknown or inactive site key.
    #[error("invalid site")]
    InvalidSite,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {message}")]
    BadRequest {
        message: String,
        field: Option<&'static str>,
    },

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("rate limited")]
    RateLimited,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn bad_request(message: impl Into<String>, field: &'static str) -> Self {
        AppError::BadRequest {
            message: message.into(),
            field: Some(field),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, field) = match &self {
            AppError::InvalidSite => (
                StatusCode::FORBIDDEN,
                "invalid_site",
                "Unknown or inactive site key".to_string(),
                Some("siteKey"),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            AppError::BadRequest { message, field } => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                message.clone(),
                *field,
            ),
            AppError::Payload(err) => (
                StatusCode::BAD_REQUEST,
                match err {
                    PayloadError::Malformed(_) => "malformed_payload",
                    PayloadError::EmptyBatch | PayloadError::BatchTooLarge { .. } => {
                        "invalid_batch"
                    }
                    _ => "validation_error",
                },
                err.to_string(),
                err.field(),
            ),
            AppError::LimitExceeded(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "limit_exceeded",
                msg.clone(),
                None,
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Not authenticated".to_string(),
                None,
            ),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Rate limit exceeded".to_string(),
                None,
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        (
            status,
            Json(json!({
                "error": {
                    "code": code,
                    "message": message,
                    "field": field
                }
            })),
        )
            .into_response()
    }
}
