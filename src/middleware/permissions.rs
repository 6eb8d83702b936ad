//! Permission checks layered on top of the request gate.
//!
//! Both checks only read the [`Identity`] the gate attached to the request;
//! they never touch the store.

use super::auth::Identity;
use crate::error::AppError;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Fails with `AuthenticationRequired` if the gate attached no identity
/// (disabled gate, exempt path, or a route mounted outside the gate).
pub fn require_authenticated(identity: Option<&Identity>) -> Result<Identity, AppError> {
    identity.cloned().ok_or(AppError::AuthenticationRequired)
}

/// Like [`require_authenticated`], then fails with `InsufficientPermissions`
/// unless the key carries the admin flag.
pub fn require_admin(identity: Option<&Identity>) -> Result<Identity, AppError> {
    let identity = require_authenticated(identity)?;
    if !identity.permissions.admin {
        tracing::warn!(key_id = %identity.id, "Admin permission required");
        return Err(AppError::InsufficientPermissions);
    }
    Ok(identity)
}

/// Extractor for handlers that need any authenticated caller.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Identity);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require_authenticated(parts.extensions.get::<Identity>()).map(Self)
    }
}

/// Extractor for admin-only handlers.
#[derive(Debug, Clone)]
pub struct AdminOnly(pub Identity);

impl<S> FromRequestParts<S> for AdminOnly
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require_admin(parts.extensions.get::<Identity>()).map(Self)
    }
}
