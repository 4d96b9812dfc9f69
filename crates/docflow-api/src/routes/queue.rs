//! Queue statistics and task listing.

use axum::Json;
use axum::extract::{Query, State};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

use docflow_queue::{TaskFilter, TaskStatus};

use crate::auth::{CurrentUser, Permission};
use crate::error::ApiError;
use crate::state::AppState;

/// `GET /api/v1/queue/stats`
pub async fn stats(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Value>, ApiError> {
    user.require(Permission::QueueView)?;

    let stats = state.queue.stats().await?;
    let total = stats.total();
    Ok(Json(json!({
        "success": true,
        "stats": stats,
        "total": total,
        "timestamp": Utc::now().to_rfc3339(),
        "user": user.user_id,
    })))
}

const MAX_LIST_LIMIT: i64 = 1000;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

/// `GET /api/v1/queue/tasks`
///
/// Listing is open to any authenticated caller but filtered to the caller's
/// own rows unless they hold `TASK_VIEW_ALL`.
pub async fn list_tasks(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = query.limit.unwrap_or(100);
    if limit < 1 || limit > MAX_LIST_LIMIT {
        return Err(ApiError::Validation(format!(
            "Limit must be between 1 and {}",
            MAX_LIST_LIMIT
        )));
    }

    let status = query
        .status
        .as_deref()
        .map(|s| s.parse::<TaskStatus>())
        .transpose()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let can_view_all = user.has_permission(Permission::TaskViewAll);
    let filter = TaskFilter {
        status,
        user_id: (!can_view_all).then(|| user.user_id.clone()),
    };

    let tasks = state.queue.list(&filter, limit).await?;
    Ok(Json(json!({
        "success": true,
        "count": tasks.len(),
        "tasks": tasks,
        "can_view_all": can_view_all,
    })))
}
