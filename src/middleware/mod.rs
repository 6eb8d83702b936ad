//! HTTP middleware components.
//!
//! Middleware are functions that run before route handlers.
//! They can:
//! - Authenticate requests
//! - Short-circuit requests (reject unauthorized)

/// API key authentication middleware (the request gate)
pub mod auth;
/// Authenticated / admin checks for handlers
pub mod permissions;
