//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::pipeline::batch_analysis::PipelineError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("User id required")]
    Unauthorized,
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error("No screenshots available: {0}")]
    NoScreenshots(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "USER_REQUIRED",
                "Missing x-user-id header".to_string(),
            ),
            ApiError::SessionNotFound(id) => (
                StatusCode::NOT_FOUND,
                "SESSION_NOT_FOUND",
                format!("Session {id} not found"),
            ),
            ApiError::NoScreenshots(id) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "NO_SCREENSHOTS_AVAILABLE",
                format!("Session {id} has no unprocessed screenshots"),
            ),
            ApiError::BadRequest(detail) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                detail.clone(),
            ),
            ApiError::Unavailable(detail) => {
                tracing::warn!(detail, "API dependency unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "UNAVAILABLE",
                    "The service is temporarily unavailable".to_string(),
                )
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::NoScreenshotsAvailable { session_id } => ApiError::NoScreenshots(session_id),
            PipelineError::SessionNotFound(id) => ApiError::SessionNotFound(id),
            PipelineError::SourceUnavailable(detail) => ApiError::Unavailable(detail),
            PipelineError::Cancelled => ApiError::Unavailable("request cancelled".into()),
        }
    }
}
