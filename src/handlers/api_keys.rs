//! API key management HTTP handlers.
//!
//! This module implements the key management endpoints:
//! - POST /api/auth/keys - Issue a key (admin)
//! - GET /api/auth/keys - List keys (authenticated)
//! - GET /api/auth/keys/{id} - Get one key (authenticated)
//! - PUT /api/auth/keys/{id} - Update name/permissions/metadata (admin)
//! - DELETE /api/auth/keys/{id} - Revoke (admin)
//!
//! No response ever includes a key hash. The plaintext key appears only in
//! the response to the create call.

use crate::{
    error::AppError,
    middleware::permissions::{AdminOnly, Authenticated},
    models::api_key::{
        ApiKeyListResponse, ApiKeyResponse, CreateApiKeyRequest, CreateApiKeyResponse,
        ListApiKeysQuery, RevokeApiKeyResponse, UpdateApiKeyRequest,
    },
    services::api_key_service,
    state::AppState,
};
use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

/// Issue a new API key.
///
/// # Request Body
///
/// ```json
/// {
///   "name": "Production Key",
///   "permissions": { "read": true, "write": true, "admin": false },
///   "metadata": { "environment": "production" }
/// }
/// ```
///
/// `permissions` defaults to read+write, no admin.
///
/// # Response
///
/// - **Success (201 Created)**: key details including the plaintext `api_key`
/// - **Error (400)**: malformed body, e.g. missing `name`
/// - **Error (401/403)**: caller is not an authenticated admin
pub async fn create_api_key(
    State(state): State<AppState>,
    AdminOnly(admin): AdminOnly,
    payload: Result<Json<CreateApiKeyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let created_by = admin.id.to_string();
    let created =
        api_key_service::create_api_key(state.store.as_ref(), &state.auth, &created_by, request)
            .await?;

    Ok((StatusCode::CREATED, Json(CreateApiKeyResponse::from(created))))
}

/// List API keys, newest first.
///
/// `?include_inactive=true` also returns revoked keys.
pub async fn list_api_keys(
    State(state): State<AppState>,
    Authenticated(_caller): Authenticated,
    Query(query): Query<ListApiKeysQuery>,
) -> Result<Json<ApiKeyListResponse>, AppError> {
    let keys = api_key_service::list_api_keys(state.store.as_ref(), query.include_inactive).await?;

    let keys: Vec<ApiKeyResponse> = keys.into_iter().map(Into::into).collect();
    Ok(Json(ApiKeyListResponse {
        total: keys.len(),
        keys,
    }))
}

pub async fn get_api_key(
    State(state): State<AppState>,
    Authenticated(_caller): Authenticated,
    key_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ApiKeyResponse>, AppError> {
    let Path(key_id) = key_id?;
    let key = api_key_service::get_api_key(state.store.as_ref(), key_id).await?;
    Ok(Json(key.into()))
}

/// Update a key's name, permissions and/or metadata.
///
/// # Response
///
/// - **Success (200 OK)**: the updated key
/// - **Error (400)**: empty body, unknown field (e.g. `key_hash`, `is_active`) or blank name
/// - **Error (404)**: no such key
pub async fn update_api_key(
    State(state): State<AppState>,
    AdminOnly(admin): AdminOnly,
    key_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateApiKeyRequest>, JsonRejection>,
) -> Result<Json<ApiKeyResponse>, AppError> {
    let Path(key_id) = key_id?;
    let Json(patch) = payload?;

    tracing::debug!(key_id = %key_id, by = %admin.id, "Updating API key");
    let key = api_key_service::update_api_key(state.store.as_ref(), key_id, patch).await?;

    Ok(Json(key.into()))
}

/// Revoke a key. Revoking an already revoked key succeeds.
pub async fn revoke_api_key(
    State(state): State<AppState>,
    AdminOnly(admin): AdminOnly,
    key_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<RevokeApiKeyResponse>, AppError> {
    let Path(key_id) = key_id?;
    tracing::debug!(key_id = %key_id, by = %admin.id, "Revoking API key");
    api_key_service::revoke_api_key(state.store.as_ref(), key_id).await?;

    Ok(Json(RevokeApiKeyResponse {
        revoked: true,
        key_id,
    }))
}
