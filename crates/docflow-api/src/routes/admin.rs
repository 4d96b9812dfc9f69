//! Administrative maintenance: retention cleanup and stale-lease recovery.

use std::path::Path;
use std::time::Duration;

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::auth::{CurrentUser, Permission};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CleanupQuery {
    pub days: Option<u64>,
}

/// `POST /api/v1/admin/cleanup`
///
/// Deletes terminal tasks older than `days` (default 7) and sweeps their
/// result directories, keeping row retention and on-disk retention on the
/// same window.
pub async fn cleanup(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<CleanupQuery>,
) -> Result<Json<Value>, ApiError> {
    user.require(Permission::QueueManage)?;

    let days = query.days.unwrap_or(7);
    let removed = state
        .queue
        .cleanup_old(Duration::from_secs(days * 24 * 3600))
        .await?;

    let mut swept = 0usize;
    for task in &removed {
        let Some(result_path) = task.result_path.as_deref() else {
            continue;
        };
        let dir = Path::new(result_path);
        // Only sweep directories the workers created under the output root.
        if !dir.starts_with(&state.config.output_root) || !dir.exists() {
            continue;
        }
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => swept += 1,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "Failed to sweep result directory");
            }
        }
    }

    info!(
        deleted = removed.len(),
        swept,
        days,
        user_id = %user.user_id,
        "Cleaned up old tasks"
    );

    Ok(Json(json!({
        "success": true,
        "deleted_count": removed.len(),
        "message": format!("Cleaned up tasks older than {} days", days),
    })))
}

#[derive(Debug, Deserialize)]
pub struct ResetStaleQuery {
    pub timeout_minutes: Option<u64>,
}

/// `POST /api/v1/admin/reset-stale`
///
/// Returns timed-out `processing` tasks to `pending`. This is the sole
/// recovery path for crashed or hung workers; the system never re-dispatches
/// in-flight work on its own.
pub async fn reset_stale(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ResetStaleQuery>,
) -> Result<Json<Value>, ApiError> {
    user.require(Permission::QueueManage)?;

    let timeout_minutes = query.timeout_minutes.unwrap_or(60);
    let reset_count = state
        .queue
        .reset_stale(Duration::from_secs(timeout_minutes * 60))
        .await?;

    info!(reset_count, timeout_minutes, user_id = %user.user_id, "Reset stale tasks");

    Ok(Json(json!({
        "success": true,
        "reset_count": reset_count,
        "message": format!(
            "Reset tasks processing for more than {} minutes",
            timeout_minutes
        ),
    })))
}
