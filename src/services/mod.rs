//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They talk to the key store and never see HTTP types.

pub mod api_key_service;
pub mod bootstrap_service;
pub mod key_generator;
