//! Task submission, status and cancellation.

use std::path::{Path, PathBuf};

use axum::Json;
use axum::extract::{Multipart, Path as UrlPath, Query, State};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use docflow_queue::{NewTask, TaskStatus};

use crate::auth::{CurrentUser, Permission};
use crate::error::ApiError;
use crate::results::{self, ResultFormat};
use crate::state::AppState;

/// Form fields carried as booleans in the options bag.
const BOOL_OPTIONS: &[&str] = &["formula_enable", "table_enable", "keep_audio"];

/// `POST /api/v1/tasks/submit`
///
/// Multipart submission: `file` plus form fields. Known fields map onto the
/// task row (`backend`, `priority`); everything else is preserved verbatim
/// in the options bag for the engine to decode.
pub async fn submit(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    user.require(Permission::TaskSubmit)?;

    let mut upload: Option<(String, PathBuf)> = None;
    let mut backend = "auto".to_string();
    let mut priority: i64 = 0;

    let mut options = serde_json::Map::new();
    options.insert("lang".to_string(), json!("auto"));
    options.insert("method".to_string(), json!("auto"));
    options.insert("formula_enable".to_string(), json!(true));
    options.insert("table_enable".to_string(), json!(true));

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" {
            let original = field
                .file_name()
                .filter(|n| !n.is_empty())
                .ok_or_else(|| ApiError::Validation("File field is missing a filename".into()))?
                .to_string();

            // Unique task-scoped name; paths never collide across concurrent
            // submissions.
            let stored_name = format!("{}_{}", uuid::Uuid::new_v4().simple(), original);
            let path = state.config.upload_dir.join(stored_name);

            let mut out = tokio::fs::File::create(&path).await?;
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|e| ApiError::Validation(format!("Upload interrupted: {}", e)))?
            {
                out.write_all(&chunk).await?;
            }
            out.flush().await?;

            upload = Some((original, path));
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::Validation(format!("Malformed field '{}': {}", name, e)))?;

            match name.as_str() {
                "backend" => backend = text,
                "priority" => {
                    priority = text.parse().map_err(|_| {
                        ApiError::Validation("Field 'priority' must be an integer".into())
                    })?;
                }
                _ if BOOL_OPTIONS.contains(&name.as_str()) => {
                    options.insert(name, json!(parse_bool_field(&text)?));
                }
                _ => {
                    options.insert(name, json!(text));
                }
            }
        }
    }

    let (file_name, file_path) =
        upload.ok_or_else(|| ApiError::Validation("Missing 'file' field".into()))?;

    let task_id = state
        .queue
        .create(NewTask {
            file_name: file_name.clone(),
            file_path: file_path.to_string_lossy().into_owned(),
            backend: backend.clone(),
            options: Value::Object(options),
            priority,
            user_id: user.user_id.clone(),
        })
        .await?;

    info!(
        task_id = %task_id,
        file_name = %file_name,
        backend = %backend,
        priority,
        user_id = %user.user_id,
        "Task submitted"
    );

    Ok(Json(json!({
        "success": true,
        "task_id": task_id,
        "status": "pending",
        "message": "Task submitted successfully",
        "file_name": file_name,
        "user_id": user.user_id,
        "created_at": Utc::now().to_rfc3339(),
    })))
}

fn parse_bool_field(text: &str) -> Result<bool, ApiError> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(ApiError::Validation(format!(
            "Expected a boolean, got '{}'",
            other
        ))),
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub upload_images: bool,
    pub format: Option<String>,
}

/// `GET /api/v1/tasks/{task_id}`
///
/// Status plus, for completed tasks, inline content resolved lazily from the
/// result directory. Callers see only their own tasks unless they hold
/// `TASK_VIEW_ALL`.
pub async fn get_task(
    State(state): State<AppState>,
    user: CurrentUser,
    UrlPath(task_id): UrlPath<String>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Value>, ApiError> {
    let format = ResultFormat::parse(query.format.as_deref().unwrap_or("markdown"))?;

    let task = state
        .queue
        .get(&task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".into()))?;

    if !user.has_permission(Permission::TaskViewAll) && task.user_id != user.user_id {
        return Err(ApiError::Forbidden(
            "Permission denied: You can only view your own tasks".into(),
        ));
    }

    let mut response = json!({
        "success": true,
        "task_id": task.task_id,
        "status": task.status,
        "file_name": task.file_name,
        "backend": task.backend,
        "priority": task.priority,
        "error_message": task.error_message,
        "created_at": task.created_at,
        "started_at": task.started_at,
        "completed_at": task.completed_at,
        "worker_id": task.worker_id,
        "retry_count": task.retry_count,
        "user_id": task.user_id,
    });

    if task.status == TaskStatus::Completed {
        match task.result_path.as_deref() {
            None => {
                response["data"] = Value::Null;
                response["message"] = json!(
                    "Task completed but result files have been cleaned up (older than retention period)"
                );
            }
            Some(result_dir) => {
                let data = results::load_result_data(
                    Path::new(result_dir),
                    format,
                    query.upload_images,
                    state.images.as_deref(),
                )
                .await;
                response["data"] = data.unwrap_or(Value::Null);
            }
        }
    }

    Ok(Json(response))
}

/// `DELETE /api/v1/tasks/{task_id}`
///
/// Cancels a pending task and removes its inbound file. Tasks in any other
/// state are rejected with 400; a leased task runs to completion or
/// stale-recovery timeout.
pub async fn cancel_task(
    State(state): State<AppState>,
    user: CurrentUser,
    UrlPath(task_id): UrlPath<String>,
) -> Result<Json<Value>, ApiError> {
    let task = state
        .queue
        .get(&task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".into()))?;

    if !user.has_permission(Permission::TaskDeleteAll) && task.user_id != user.user_id {
        return Err(ApiError::Forbidden(
            "Permission denied: You can only cancel your own tasks".into(),
        ));
    }

    if !state.queue.cancel(&task_id).await? {
        // Re-read for an accurate message; the first read may have raced a lease.
        let status = state
            .queue
            .get(&task_id)
            .await?
            .map(|t| t.status.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        return Err(ApiError::Validation(format!(
            "Cannot cancel task in {} status",
            status
        )));
    }

    let inbound = Path::new(&task.file_path);
    if inbound.exists() {
        if let Err(err) = tokio::fs::remove_file(inbound).await {
            warn!(file = %inbound.display(), error = %err, "Failed to remove inbound file for cancelled task");
        }
    }

    info!(task_id = %task_id, user_id = %user.user_id, "Task cancelled");
    Ok(Json(json!({
        "success": true,
        "message": "Task cancelled successfully",
    })))
}
