//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// Every variant is terminal for the current request; nothing is retried
/// internally.
///
/// # Error Categories
///
/// - **Credential Errors**: the request gate could not establish an identity
/// - **Permission Errors**: an identity exists but lacks a capability
/// - **Bootstrap Errors**: the one-time first-key endpoint refused the request
/// - **Key Management Errors**: unknown key or empty update
/// - **Internal Errors**: store, hashing or runtime failures (never exposed verbatim)
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// No `Authorization` header on a protected path.
    #[error("Missing Authorization header. Use 'Authorization: Bearer <api_key>'")]
    MissingAuthHeader,

    /// `Authorization` header is not `Bearer <api_key>`.
    #[error("Authorization header must be in format: 'Bearer <api_key>'")]
    InvalidAuthFormat,

    /// The presented key matches no active record.
    #[error("The provided API key is invalid or has been revoked")]
    InvalidApiKey,

    /// A handler needed an identity but the request gate attached none.
    #[error("This endpoint requires a valid API key")]
    AuthenticationRequired,

    /// The caller's key lacks the admin flag.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("This endpoint requires admin permissions")]
    InsufficientPermissions,

    /// No bootstrap secret is configured for this deployment.
    ///
    /// Returns HTTP 503 Service Unavailable.
    #[error("Bootstrap secret is not configured")]
    BootstrapNotConfigured,

    #[error("The provided bootstrap secret is incorrect")]
    InvalidBootstrapSecret,

    /// At least one key exists, so bootstrap is permanently closed.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("API keys already exist. Use the API key management endpoints.")]
    BootstrapAlreadyComplete,

    /// Returns HTTP 404 Not Found.
    #[error("API key not found")]
    KeyNotFound,

    /// An update request carried none of the updatable fields.
    #[error("No updates provided")]
    NoUpdateFields,

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    /// The String contains details about what was invalid.
    #[error("Invalid request")]
    InvalidRequest(String),

    /// Database operation failed (e.g., connection error, query error).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// bcrypt refused to hash (e.g. an out-of-range cost).
    #[error("Hashing error: {0}")]
    Hashing(#[from] bcrypt::BcryptError),

    /// Any other unexpected failure (timeouts, panicked blocking tasks, ...).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status and stable machine-readable code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::MissingAuthHeader => (StatusCode::UNAUTHORIZED, "missing_auth_header"),
            AppError::InvalidAuthFormat => (StatusCode::UNAUTHORIZED, "invalid_auth_format"),
            AppError::InvalidApiKey => (StatusCode::UNAUTHORIZED, "invalid_api_key"),
            AppError::AuthenticationRequired => {
                (StatusCode::UNAUTHORIZED, "authentication_required")
            }
            AppError::InsufficientPermissions => {
                (StatusCode::FORBIDDEN, "insufficient_permissions")
            }
            AppError::BootstrapNotConfigured => {
                (StatusCode::SERVICE_UNAVAILABLE, "bootstrap_not_configured")
            }
            AppError::InvalidBootstrapSecret => {
                (StatusCode::UNAUTHORIZED, "invalid_bootstrap_secret")
            }
            AppError::BootstrapAlreadyComplete => {
                (StatusCode::FORBIDDEN, "bootstrap_already_complete")
            }
            AppError::KeyNotFound => (StatusCode::NOT_FOUND, "key_not_found"),
            AppError::NoUpdateFields => (StatusCode::BAD_REQUEST, "no_update_fields"),
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            AppError::Database(_) | AppError::Hashing(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_auth_error")
            }
        }
    }
}

/// Malformed bodies and path parameters use the common error body instead of
/// axum's plain-text rejection.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// Internal errors are logged in full and answered with a generic message.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match self {
            AppError::InvalidRequest(ref msg) => msg.clone(),
            AppError::Database(_) | AppError::Hashing(_) | AppError::Internal(_) => {
                tracing::error!(error = %self, "Internal authentication error");
                "An internal authentication error occurred".to_string()
            }
            _ => self.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
