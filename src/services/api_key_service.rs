//! API key service - credential validation and key lifecycle management.
//!
//! This service handles:
//! - Matching a presented key against the stored bcrypt hashes
//! - Issuing new keys (plaintext returned once)
//! - Listing, reading, updating and revoking keys
//!
//! # Lifecycle
//!
//! `ACTIVE --revoke--> REVOKED`. Revocation is terminal; updates never change
//! the state or the stored hash. Keys are never deleted.

use crate::{
    config::AuthSettings,
    error::AppError,
    models::api_key::{
        ApiKey, CreateApiKeyRequest, CreatedApiKey, NewApiKey, PROVENANCE_KEYS, Permissions,
        UpdateApiKeyRequest,
    },
    services::key_generator::{generate_api_key, hash_api_key, verify_api_key},
    store::ApiKeyStore,
};
use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Find the active key matching a presented plaintext.
///
/// # Process
///
/// 1. Read every active key in one store call
/// 2. Verify the plaintext against each hash in turn, on the blocking pool
/// 3. Return the first match
///
/// Cost is linear in the number of active keys. The display prefix is not
/// used to narrow the search; only a full bcrypt verification grants access.
///
/// # Errors
///
/// - `Database`: the store read failed
/// - `Internal`: the verification task panicked
pub async fn validate_api_key(
    store: &dyn ApiKeyStore,
    plaintext: &str,
) -> Result<Option<ApiKey>, AppError> {
    let candidates = store.list_active().await?;
    if candidates.is_empty() {
        return Ok(None);
    }

    let plaintext = plaintext.to_owned();
    tokio::task::spawn_blocking(move || {
        for candidate in candidates {
            if verify_api_key(&plaintext, &candidate.key_hash) {
                return Some(candidate);
            }
        }
        None
    })
    .await
    .map_err(|e| AppError::Internal(format!("API key verification task failed: {e}")))
}

/// Generate a key and hash it, producing an insertable record and the plaintext.
pub(crate) async fn prepare_new_key(
    settings: &AuthSettings,
    name: String,
    permissions: Permissions,
    metadata: Map<String, Value>,
) -> Result<(NewApiKey, String), AppError> {
    let generated = generate_api_key();

    let cost = settings.bcrypt_cost;
    let plaintext = generated.plaintext.clone();
    let key_hash = tokio::task::spawn_blocking(move || hash_api_key(&plaintext, cost))
        .await
        .map_err(|e| AppError::Internal(format!("API key hashing task failed: {e}")))??;

    let new_key = NewApiKey {
        key_name: name,
        key_prefix: generated.prefix,
        key_hash,
        permissions,
        metadata,
    };

    Ok((new_key, generated.plaintext))
}

/// Stamp system provenance onto caller-supplied metadata.
pub(crate) fn with_provenance(
    mut metadata: Map<String, Value>,
    created_by: &str,
) -> Map<String, Value> {
    for key in PROVENANCE_KEYS {
        metadata.remove(key);
    }
    metadata.insert("created_by".to_string(), Value::from(created_by));
    metadata.insert(
        "created_at_utc".to_string(),
        Value::from(Utc::now().to_rfc3339()),
    );
    metadata
}

fn validate_name(name: &str) -> Result<String, AppError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidRequest(
            "Key name must not be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Issue a new API key.
///
/// # Defaults
///
/// - `permissions`: `{read: true, write: true, admin: false}`
/// - `metadata`: empty, plus `created_by` / `created_at_utc`
///
/// Callers cannot set provenance keys themselves; in particular a
/// caller-supplied `bootstrap` flag is dropped.
///
/// # Returns
///
/// The stored record and the plaintext key. The plaintext is not kept
/// anywhere and cannot be recovered later.
pub async fn create_api_key(
    store: &dyn ApiKeyStore,
    settings: &AuthSettings,
    created_by: &str,
    request: CreateApiKeyRequest,
) -> Result<CreatedApiKey, AppError> {
    let name = validate_name(&request.name)?;
    let permissions = request.permissions.unwrap_or_default();
    let metadata = with_provenance(request.metadata.unwrap_or_default(), created_by);

    let (new_key, plaintext) = prepare_new_key(settings, name, permissions, metadata).await?;
    let record = store.insert(new_key).await?;

    tracing::info!(
        key_id = %record.id,
        key_name = %record.key_name,
        prefix = %record.key_prefix,
        admin = permissions.admin,
        "Created API key"
    );

    Ok(CreatedApiKey { record, plaintext })
}

/// List keys, newest first. Revoked keys only with `include_inactive`.
pub async fn list_api_keys(
    store: &dyn ApiKeyStore,
    include_inactive: bool,
) -> Result<Vec<ApiKey>, AppError> {
    store.list(include_inactive).await
}

pub async fn get_api_key(store: &dyn ApiKeyStore, id: Uuid) -> Result<ApiKey, AppError> {
    store.get(id).await?.ok_or(AppError::KeyNotFound)
}

/// Update name, permissions and/or metadata of a key.
///
/// Replacing `metadata` keeps the system provenance entries of the existing
/// record; caller attempts to set them are ignored.
///
/// # Errors
///
/// - `NoUpdateFields`: the patch is empty (checked before any lookup)
/// - `InvalidRequest`: the new name is blank
/// - `KeyNotFound`: no key has this id
pub async fn update_api_key(
    store: &dyn ApiKeyStore,
    id: Uuid,
    mut patch: UpdateApiKeyRequest,
) -> Result<ApiKey, AppError> {
    if patch.is_empty() {
        return Err(AppError::NoUpdateFields);
    }

    if let Some(name) = patch.name.take() {
        patch.name = Some(validate_name(&name)?);
    }

    if let Some(mut metadata) = patch.metadata.take() {
        let existing = store.get(id).await?.ok_or(AppError::KeyNotFound)?;
        for key in PROVENANCE_KEYS {
            metadata.remove(key);
            if let Some(value) = existing.metadata.0.get(key) {
                metadata.insert(key.to_string(), value.clone());
            }
        }
        patch.metadata = Some(metadata);
    }

    let updated_fields: Vec<&str> = [
        patch.name.as_ref().map(|_| "name"),
        patch.permissions.as_ref().map(|_| "permissions"),
        patch.metadata.as_ref().map(|_| "metadata"),
    ]
    .into_iter()
    .flatten()
    .collect();

    let record = store.update(id, patch).await?.ok_or(AppError::KeyNotFound)?;

    tracing::info!(key_id = %id, fields = ?updated_fields, "Updated API key");

    Ok(record)
}

/// Revoke a key.
///
/// Revoking a key that is already revoked succeeds without changing anything.
///
/// # Errors
///
/// - `KeyNotFound`: no key has this id
pub async fn revoke_api_key(store: &dyn ApiKeyStore, id: Uuid) -> Result<(), AppError> {
    if !store.deactivate(id).await? {
        return Err(AppError::KeyNotFound);
    }

    tracing::info!(key_id = %id, "Revoked API key");

    Ok(())
}
