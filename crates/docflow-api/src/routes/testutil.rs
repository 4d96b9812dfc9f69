//! Shared fixtures for router tests.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use docflow_engine::{EngineRegistry, MarkdownConvertEngine};
use docflow_queue::TaskQueue;

use crate::auth::{CurrentUser, Permission, StaticTokenAuth};
use crate::state::{ApiConfig, AppState};

pub(crate) const ADMIN_TOKEN: &str = "admin-token";
pub(crate) const ALICE_TOKEN: &str = "alice-token";
pub(crate) const BOB_TOKEN: &str = "bob-token";
pub(crate) const VIEWER_TOKEN: &str = "viewer-token";

pub(crate) struct TestContext {
    pub state: AppState,
    /// Owns the upload/output directories for the test's lifetime.
    _dir: TempDir,
}

impl TestContext {
    pub fn router(&self) -> Router {
        crate::routes::build_router(self.state.clone())
    }
}

pub(crate) async fn test_context() -> TestContext {
    let dir = tempfile::tempdir().unwrap();
    let upload_dir = dir.path().join("uploads");
    let output_root = dir.path().join("output");
    std::fs::create_dir_all(&upload_dir).unwrap();
    std::fs::create_dir_all(&output_root).unwrap();

    let queue = TaskQueue::connect_in_memory().await.unwrap();

    let mut registry = EngineRegistry::new();
    registry.register(MarkdownConvertEngine::new());

    let auth = StaticTokenAuth::new()
        .with_token(
            ADMIN_TOKEN,
            CurrentUser::new(
                "admin",
                "admin",
                [
                    Permission::TaskSubmit,
                    Permission::TaskViewAll,
                    Permission::TaskDeleteAll,
                    Permission::QueueView,
                    Permission::QueueManage,
                ],
            ),
        )
        .with_token(
            ALICE_TOKEN,
            CurrentUser::new(
                "alice",
                "user",
                [Permission::TaskSubmit, Permission::QueueView],
            ),
        )
        .with_token(
            BOB_TOKEN,
            CurrentUser::new("bob", "user", [Permission::TaskSubmit]),
        )
        .with_token(
            VIEWER_TOKEN,
            CurrentUser::new("viewer", "user", [Permission::QueueView]),
        );

    let state = AppState {
        queue,
        engines: Arc::new(registry),
        auth: auth.into_provider(),
        images: None,
        config: Arc::new(ApiConfig {
            upload_dir,
            output_root,
        }),
    };

    TestContext { state, _dir: dir }
}

pub(crate) fn request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

/// Build a multipart submission request.
pub(crate) fn multipart_request(
    uri: &str,
    token: &str,
    file: Option<(&str, &[u8])>,
    fields: &[(&str, &str)],
) -> Request<Body> {
    let boundary = "X-DOCFLOW-TEST-BOUNDARY";
    let mut body: Vec<u8> = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, content)) = file {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Fire one request and decode the JSON body.
pub(crate) async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}
