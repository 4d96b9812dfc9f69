//! API error type and response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use docflow_queue::QueueError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed submission, uncancellable state, unknown query parameter (400)
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid credential (401)
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not permitted (403)
    #[error("{0}")]
    Forbidden(String),

    /// Unknown task id (404)
    #[error("{0}")]
    NotFound(String),

    /// Storage or unexpected failure (500); the caller retries
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::TaskNotFound(id) => ApiError::NotFound(format!("Task not found: {}", id)),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}
