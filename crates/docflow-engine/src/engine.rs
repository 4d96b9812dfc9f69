//! The `Engine` trait and its data types.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::EngineError;

/// Artifacts produced by a parse run.
///
/// Engines write everything under the task's output directory; this struct
/// only points at the primary artifacts the gateway serves back to clients.
#[derive(Debug, Clone, Default)]
pub struct ParseOutput {
    pub markdown_path: Option<PathBuf>,
    pub json_path: Option<PathBuf>,
}

/// Registry snapshot entry, served by `GET /engines`.
#[derive(Debug, Clone, Serialize)]
pub struct EngineInfo {
    pub name: String,
    pub description: String,
    pub supported_extensions: Vec<String>,
    pub available: bool,
}

/// A processing engine.
///
/// Implementations must be `Send + Sync`; one instance is shared by every
/// worker in the process. `parse` is responsible for writing at least one
/// Markdown file under `output_dir`.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Stable engine name, matched against the submission's `backend` field.
    fn name(&self) -> &str;

    /// One-line human-readable description.
    fn description(&self) -> &str;

    /// File extensions (lowercase, without dot) this engine is built for.
    fn supported_extensions(&self) -> &[&str];

    /// Whether the engine's dependencies are present in this deployment.
    ///
    /// Probed at registration time and on `GET /engines`; the dispatcher
    /// fails tasks routed to an unavailable engine without invoking it.
    fn is_available(&self) -> bool;

    /// Process `input` and write artifacts under `output_dir`.
    async fn parse(
        &self,
        input: &Path,
        output_dir: &Path,
        options: &Value,
    ) -> Result<ParseOutput, EngineError>;
}

/// Locate the primary artifacts under an output directory.
///
/// Finds the first Markdown file (recursively) plus a structured JSON
/// artifact matching the known result patterns, skipping per-page debug
/// directories.
pub fn find_artifacts(output_dir: &Path) -> ParseOutput {
    let mut markdown_path = None;
    let mut json_path = None;

    for entry in walkdir::WalkDir::new(output_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        if markdown_path.is_none() && name.ends_with(".md") {
            markdown_path = Some(path.to_path_buf());
        }

        if json_path.is_none() && is_result_json(name) {
            let in_page_dir = path
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("page_"));
            if !in_page_dir {
                json_path = Some(path.to_path_buf());
            }
        }
    }

    ParseOutput {
        markdown_path,
        json_path,
    }
}

/// Whether a filename matches one of the structured-result JSON patterns.
pub fn is_result_json(name: &str) -> bool {
    name == "content.json" || name == "result.json" || name.ends_with("_content_list.json")
}
