//! One-time bootstrap of the first administrative key.
//!
//! # Availability
//!
//! Bootstrap is available iff no key has ever been issued AND the deployment
//! configures a bootstrap secret. Both halves are read fresh on every call so
//! that a key created by any replica closes bootstrap everywhere.
//!
//! # Check Order
//!
//! 1. Secret configured? otherwise `BootstrapNotConfigured`
//! 2. Secret matches (constant time)? otherwise `InvalidBootstrapSecret`
//! 3. Store empty? otherwise `BootstrapAlreadyComplete`
//!
//! A failed attempt writes nothing.

use crate::{
    config::AuthSettings,
    error::AppError,
    models::api_key::{CreatedApiKey, Permissions},
    services::api_key_service::{prepare_new_key, with_provenance},
    store::ApiKeyStore,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use subtle::ConstantTimeEq;

/// Snapshot of the authentication system as seen by an unauthenticated client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    pub authentication_enabled: bool,
    pub has_api_keys: bool,
    pub bootstrap_available: bool,
    pub message: String,
}

fn secret_matches(presented: &str, expected: &str) -> bool {
    // Length differences short-circuit; contents are compared in constant time
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Create the first API key with full permissions.
///
/// # Returns
///
/// The bootstrap key and its plaintext, which is never shown again.
///
/// # Errors
///
/// See the module docs for the ordered failure modes. Two concurrent
/// bootstraps can both pass the emptiness check; the store's conditional
/// insert lets only one of them through and the other gets
/// `BootstrapAlreadyComplete`.
pub async fn bootstrap(
    store: &dyn ApiKeyStore,
    settings: &AuthSettings,
    presented_secret: &str,
    key_name: &str,
) -> Result<CreatedApiKey, AppError> {
    let expected = settings
        .bootstrap_secret
        .as_deref()
        .ok_or(AppError::BootstrapNotConfigured)?;

    if !secret_matches(presented_secret, expected) {
        tracing::warn!("Invalid bootstrap secret attempt");
        return Err(AppError::InvalidBootstrapSecret);
    }

    if store.has_any().await? {
        return Err(AppError::BootstrapAlreadyComplete);
    }

    let name = match key_name.trim() {
        "" => "Initial Admin Key".to_string(),
        trimmed => trimmed.to_string(),
    };

    let mut metadata = with_provenance(Map::new(), "bootstrap");
    metadata.insert("bootstrap".to_string(), Value::Bool(true));
    metadata.insert(
        "purpose".to_string(),
        Value::from("Initial admin key for first-time setup"),
    );

    let (new_key, plaintext) =
        prepare_new_key(settings, name, Permissions::full(), metadata).await?;

    let record = store
        .insert_first(new_key)
        .await?
        .ok_or(AppError::BootstrapAlreadyComplete)?;

    tracing::info!(
        key_id = %record.id,
        key_name = %record.key_name,
        prefix = %record.key_prefix,
        "Bootstrap API key created"
    );

    Ok(CreatedApiKey { record, plaintext })
}

/// Current authentication status, derived from configuration and the store.
pub async fn auth_status(
    store: &dyn ApiKeyStore,
    settings: &AuthSettings,
) -> Result<AuthStatus, AppError> {
    let has_api_keys = store.has_any().await?;
    let bootstrap_available = !has_api_keys && settings.bootstrap_secret.is_some();

    let message = if bootstrap_available {
        "Bootstrap endpoint available"
    } else if has_api_keys {
        "Use API key authentication"
    } else {
        "No API keys exist and no bootstrap secret is configured"
    };

    Ok(AuthStatus {
        authentication_enabled: settings.enabled,
        has_api_keys,
        bootstrap_available,
        message: message.to_string(),
    })
}
