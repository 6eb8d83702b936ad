//! Public authentication endpoints.
//!
//! - POST /api/auth/bootstrap - Create the first admin key (exempt from the gate)
//! - GET /api/auth/status - Report whether keys exist and bootstrap is open (exempt)
//! - GET /api/auth/validate - Echo the caller's own identity

use crate::{
    error::AppError,
    middleware::{auth::Identity, permissions::Authenticated},
    models::api_key::{BootstrapRequest, BootstrapResponse},
    services::bootstrap_service::{self, AuthStatus},
    state::AppState,
};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

/// Create the initial API key.
///
/// # Request Body
///
/// ```json
/// {
///   "bootstrap_secret": "<value of BOOTSTRAP_SECRET>",
///   "key_name": "Initial Admin Key"
/// }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: the admin key, shown only this once
/// - **Error (400)**: malformed body, e.g. missing `bootstrap_secret`
/// - **Error (503)**: no bootstrap secret configured
/// - **Error (401)**: wrong bootstrap secret
/// - **Error (403)**: keys already exist
pub async fn bootstrap(
    State(state): State<AppState>,
    payload: Result<Json<BootstrapRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let created = bootstrap_service::bootstrap(
        state.store.as_ref(),
        &state.auth,
        &request.bootstrap_secret,
        &request.key_name,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(BootstrapResponse::from(created))))
}

/// Authentication system status.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "authentication_enabled": true,
///   "has_api_keys": false,
///   "bootstrap_available": true,
///   "message": "Bootstrap endpoint available"
/// }
/// ```
pub async fn status(State(state): State<AppState>) -> Result<Json<AuthStatus>, AppError> {
    let status = bootstrap_service::auth_status(state.store.as_ref(), &state.auth).await?;
    Ok(Json(status))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(flatten)]
    pub identity: Identity,
}

/// Validate the caller's API key and return its identity.
pub async fn validate(Authenticated(identity): Authenticated) -> Json<ValidateResponse> {
    Json(ValidateResponse {
        valid: true,
        identity,
    })
}
