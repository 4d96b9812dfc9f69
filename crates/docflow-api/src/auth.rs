//! Authentication collaborator contract and the permission model.
//!
//! The gateway takes a bearer credential from the `Authorization` header and
//! resolves it through an [`AuthProvider`] to a `(user_id, role, permissions)`
//! triple. Token issuance, hashing and the user store live with the external
//! identity service; only the resolution predicate is consumed here.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// Named capabilities enforced by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    TaskSubmit,
    TaskViewAll,
    TaskDeleteAll,
    QueueView,
    QueueManage,
}

/// The resolved caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub user_id: String,
    pub role: String,
    pub permissions: HashSet<Permission>,
}

impl CurrentUser {
    pub fn new(
        user_id: impl Into<String>,
        role: impl Into<String>,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            role: role.into(),
            permissions: permissions.into_iter().collect(),
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    /// Reject the request with 403 unless the caller holds `permission`.
    pub fn require(&self, permission: Permission) -> Result<(), ApiError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "Permission denied: {:?} required",
                permission
            )))
        }
    }
}

/// Resolves bearer credentials to callers.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn resolve(&self, token: &str) -> Option<CurrentUser>;
}

/// Static token table, for deployments without the external identity service
/// and for tests. Loaded from a JSON file of `{token, user_id, role,
/// permissions}` entries.
#[derive(Default)]
pub struct StaticTokenAuth {
    tokens: HashMap<String, CurrentUser>,
}

#[derive(Deserialize)]
struct TokenEntry {
    token: String,
    user_id: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    permissions: Vec<Permission>,
}

impl StaticTokenAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, user: CurrentUser) -> Self {
        self.tokens.insert(token.into(), user);
        self
    }

    /// Load a token table from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ApiError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ApiError::Internal(format!("Failed to read token file: {}", e)))?;
        let entries: Vec<TokenEntry> = serde_json::from_str(&raw)
            .map_err(|e| ApiError::Internal(format!("Invalid token file: {}", e)))?;

        let mut auth = Self::new();
        for entry in entries {
            auth.tokens.insert(
                entry.token,
                CurrentUser::new(entry.user_id, entry.role, entry.permissions),
            );
        }
        Ok(auth)
    }

    pub fn into_provider(self) -> Arc<dyn AuthProvider> {
        Arc::new(self)
    }
}

#[async_trait]
impl AuthProvider for StaticTokenAuth {
    async fn resolve(&self, token: &str) -> Option<CurrentUser> {
        self.tokens.get(token).cloned()
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing credentials".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("Invalid authorization scheme".to_string()))?;

        state
            .auth
            .resolve(token)
            .await
            .ok_or_else(|| ApiError::Unauthorized("Invalid or expired credentials".to_string()))
    }
}
