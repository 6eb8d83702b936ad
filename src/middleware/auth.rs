//! API key authentication middleware.
//!
//! This middleware intercepts every request to:
//! 1. Let exempt paths (and everything, when auth is disabled) straight through
//! 2. Parse `Authorization: Bearer <api_key>`
//! 3. Match the key against the active bcrypt hashes
//! 4. Inject the caller's [`Identity`] into the request
//! 5. Record `last_used_at` in the background
//!
//! Lookup failures of any kind (store error, timeout) reject the request.

use crate::{
    error::AppError,
    models::api_key::{ApiKey, Permissions},
    services::{api_key_service::validate_api_key, key_generator::display_prefix},
    state::AppState,
    store::ApiKeyStore,
};
use axum::{
    extract::{Request, State},
    http::{HeaderValue, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Paths served without credentials.
pub const EXEMPT_PATHS: [&str; 6] = [
    "/",
    "/internal",
    "/health",
    "/api/health",
    "/api/auth/bootstrap",
    "/api/auth/status",
];

/// Namespace for internal callers; access to it is controlled at the network level.
pub const EXEMPT_PREFIX: &str = "/internal/";

/// Identity attached to authenticated requests.
///
/// Inserted into the request's extension map; handlers obtain it through the
/// [`Authenticated`](super::permissions::Authenticated) and
/// [`AdminOnly`](super::permissions::AdminOnly) extractors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// ID of the authenticated API key
    pub id: Uuid,

    pub name: String,

    pub permissions: Permissions,
}

impl From<&ApiKey> for Identity {
    fn from(key: &ApiKey) -> Self {
        Self {
            id: key.id,
            name: key.key_name.clone(),
            permissions: key.permissions.0,
        }
    }
}

pub fn is_exempt_path(path: &str) -> bool {
    EXEMPT_PATHS.contains(&path) || path.starts_with(EXEMPT_PREFIX)
}

/// Extract the key from an `Authorization` header value.
///
/// The header must consist of exactly two whitespace-separated tokens, the
/// first being `bearer` in any letter case.
///
/// # Errors
///
/// - `MissingAuthHeader`: no header
/// - `InvalidAuthFormat`: anything else that is not `Bearer <token>`
pub fn parse_bearer(header: Option<&HeaderValue>) -> Result<&str, AppError> {
    let header = header.ok_or(AppError::MissingAuthHeader)?;
    let value = header.to_str().map_err(|_| AppError::InvalidAuthFormat)?;

    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(AppError::InvalidAuthFormat),
    }
}

/// Record key usage without holding up the response.
///
/// Concurrent requests with the same key race here; the last write wins.
fn spawn_last_used_update(store: Arc<dyn ApiKeyStore>, key_id: Uuid) {
    tokio::spawn(async move {
        if let Err(e) = store.touch_last_used(key_id, Utc::now()).await {
            tracing::warn!(key_id = %key_id, error = %e, "Failed to update last_used_at");
        }
    });
}

/// API key authentication middleware function.
///
/// # Flow
///
/// 1. Pass through if authentication is disabled or the path is exempt
/// 2. Parse `Authorization: Bearer <key>`
/// 3. Verify `<key>` against every active key's bcrypt hash
/// 4. If found: inject `Identity`, schedule `last_used_at` update, call next handler
/// 5. If not found: return 401 Unauthorized error
///
/// The key lookup is bounded by `store_timeout`; a timeout or store error is
/// answered like an unknown key.
///
/// # Returns
///
/// - `Ok(Response)` if authenticated successfully (calls next handler)
/// - `Err(AppError)` with one of `MissingAuthHeader`, `InvalidAuthFormat`, `InvalidApiKey`
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !state.auth.enabled {
        return Ok(next.run(request).await);
    }

    let path = request.uri().path().to_owned();
    if is_exempt_path(&path) {
        return Ok(next.run(request).await);
    }

    let api_key = match parse_bearer(request.headers().get(AUTHORIZATION)) {
        Ok(key) => key.to_owned(),
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "Rejected request credentials");
            return Err(e);
        }
    };

    let lookup = tokio::time::timeout(
        state.auth.store_timeout,
        validate_api_key(state.store.as_ref(), &api_key),
    )
    .await;

    let record = match lookup {
        Ok(Ok(Some(record))) => record,
        Ok(Ok(None)) => {
            tracing::warn!(path = %path, prefix = %display_prefix(&api_key), "Invalid API key");
            return Err(AppError::InvalidApiKey);
        }
        Ok(Err(e)) => {
            tracing::error!(path = %path, error = %e, "API key lookup failed");
            return Err(AppError::InvalidApiKey);
        }
        Err(_) => {
            tracing::error!(
                path = %path,
                timeout = ?state.auth.store_timeout,
                "API key lookup timed out"
            );
            return Err(AppError::InvalidApiKey);
        }
    };

    let identity = Identity::from(&record);
    tracing::debug!(key_name = %identity.name, path = %path, "API key validated");

    spawn_last_used_update(state.store.clone(), identity.id);

    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}
