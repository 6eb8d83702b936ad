//! Data models representing database entities and API bodies.

/// API key record, request and response types
pub mod api_key;
