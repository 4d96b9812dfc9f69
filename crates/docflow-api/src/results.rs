//! Lazy result resolution for completed tasks.
//!
//! Workers leave an engine-defined subtree under `output_root/<task_id>/`;
//! the gateway scans it on demand for the Markdown artifact (and optional
//! structured JSON) and returns content inline.

use std::path::Path;

use serde_json::{Value, json};
use tracing::warn;

use docflow_engine::engine::find_artifacts;

use crate::error::ApiError;
use crate::images::ImageUploader;

/// Response shape selector for `GET /tasks/{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultFormat {
    Markdown,
    Json,
    Both,
}

impl ResultFormat {
    pub fn parse(value: &str) -> Result<Self, ApiError> {
        match value {
            "markdown" => Ok(ResultFormat::Markdown),
            "json" => Ok(ResultFormat::Json),
            "both" => Ok(ResultFormat::Both),
            other => Err(ApiError::Validation(format!(
                "Unknown format '{}': expected markdown, json or both",
                other
            ))),
        }
    }

    fn wants_markdown(&self) -> bool {
        matches!(self, ResultFormat::Markdown | ResultFormat::Both)
    }

    fn wants_json(&self) -> bool {
        matches!(self, ResultFormat::Json | ResultFormat::Both)
    }
}

/// Assemble the `data` payload for a completed task.
///
/// Returns `None` (serialized as `data: null`) when the result directory is
/// missing or holds no Markdown artifact; a completed status query never
/// fails over content problems.
pub async fn load_result_data(
    result_dir: &Path,
    format: ResultFormat,
    upload_images: bool,
    uploader: Option<&ImageUploader>,
) -> Option<Value> {
    if !result_dir.exists() {
        warn!(result_dir = %result_dir.display(), "Result directory missing");
        return None;
    }

    let artifacts = find_artifacts(result_dir);
    let markdown_path = artifacts.markdown_path?;

    let mut data = serde_json::Map::new();
    data.insert("json_available".to_string(), json!(artifacts.json_path.is_some()));

    if format.wants_markdown() {
        let mut content = match tokio::fs::read_to_string(&markdown_path).await {
            Ok(content) => content,
            Err(err) => {
                warn!(file = %markdown_path.display(), error = %err, "Failed to read markdown artifact");
                return None;
            }
        };

        // Image references resolve against the artifact's sibling directory.
        let image_dir = markdown_path
            .parent()
            .map(|p| p.join("images"))
            .filter(|p| p.exists());

        let mut images_uploaded = false;
        if upload_images {
            if let (Some(dir), Some(uploader)) = (&image_dir, uploader) {
                content = uploader.rewrite_markdown(&content, dir).await;
                images_uploaded = true;
            }
        }

        data.insert(
            "markdown_file".to_string(),
            json!(markdown_path.file_name().and_then(|n| n.to_str())),
        );
        data.insert("content".to_string(), json!(content));
        data.insert("images_uploaded".to_string(), json!(images_uploaded));
        data.insert("has_images".to_string(), json!(image_dir.is_some()));
    }

    if format.wants_json() {
        match artifacts.json_path {
            Some(json_path) => match tokio::fs::read_to_string(&json_path).await {
                Ok(raw) => match serde_json::from_str::<Value>(&raw) {
                    Ok(parsed) => {
                        data.insert(
                            "json_file".to_string(),
                            json!(json_path.file_name().and_then(|n| n.to_str())),
                        );
                        data.insert("json_content".to_string(), parsed);
                    }
                    Err(err) => {
                        warn!(file = %json_path.display(), error = %err, "Malformed JSON artifact");
                    }
                },
                Err(err) => {
                    warn!(file = %json_path.display(), error = %err, "Failed to read JSON artifact");
                }
            },
            None => {
                data.insert(
                    "message".to_string(),
                    json!("JSON format not available for this backend"),
                );
            }
        }
    }

    Some(Value::Object(data))
}
