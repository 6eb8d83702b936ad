//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, identity)
//! 2. Delegates to a service
//! 3. Returns HTTP response (JSON, status code)

/// API key management endpoints
pub mod api_keys;
/// Bootstrap, status and validate endpoints
pub mod auth;
/// Health check and root endpoints
pub mod health;
