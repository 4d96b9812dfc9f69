//! # REST Gateway
//!
//! HTTP surface over the task queue: multipart submission, status and result
//! retrieval, listing, cancellation, and administrative maintenance, all
//! gated by the permission model supplied by the auth collaborator.
//!
//! The gateway never talks to engines; it reads whatever artifacts the
//! workers left under the output root and serves them back inline.

pub mod auth;
pub mod error;
pub mod images;
pub mod results;
pub mod routes;
pub mod state;

pub use auth::{AuthProvider, CurrentUser, Permission, StaticTokenAuth};
pub use error::ApiError;
pub use routes::build_router;
pub use state::{ApiConfig, AppState};
