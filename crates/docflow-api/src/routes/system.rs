//! Service info, engine discovery and health.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::error;

use crate::state::AppState;

/// `GET /`
pub async fn service_info() -> Json<Value> {
    Json(json!({
        "service": "docflow",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Multi-tenant document-processing task queue",
    }))
}

/// `GET /api/v1/engines`
///
/// Registry snapshot; no authentication required.
pub async fn engines(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "engines": state.engines.snapshot(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// `GET /api/v1/health`
///
/// 200 while the store is reachable, 503 otherwise.
pub async fn health(State(state): State<AppState>) -> Response {
    match state.queue.stats().await {
        Ok(stats) => Json(json!({
            "status": "healthy",
            "database": "connected",
            "queue_stats": stats,
            "timestamp": Utc::now().to_rfc3339(),
        }))
        .into_response(),
        Err(err) => {
            error!(error = %err, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy", "error": err.to_string() })),
            )
                .into_response()
        }
    }
}
