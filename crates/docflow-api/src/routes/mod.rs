//! Router assembly.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod admin;
pub mod queue;
pub mod system;
pub mod tasks;

#[cfg(test)]
pub(crate) mod testutil;

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        // Uploads stream to disk; the global body limit does not apply.
        .route(
            "/tasks/submit",
            post(tasks::submit).layer(DefaultBodyLimit::disable()),
        )
        .route(
            "/tasks/{task_id}",
            get(tasks::get_task).delete(tasks::cancel_task),
        )
        .route("/queue/stats", get(queue::stats))
        .route("/queue/tasks", get(queue::list_tasks))
        .route("/admin/cleanup", post(admin::cleanup))
        .route("/admin/reset-stale", post(admin::reset_stale))
        .route("/engines", get(system::engines))
        .route("/health", get(system::health));

    Router::new()
        .route("/", get(system::service_info))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
