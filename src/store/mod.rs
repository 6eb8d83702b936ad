//! Persistence seam for API key records.
//!
//! The authentication layer only talks to [`ApiKeyStore`]. Production uses
//! [`PgApiKeyStore`]; [`InMemoryApiKeyStore`] backs development runs without a
//! database and the test suite.

mod memory;
mod postgres;

pub use memory::InMemoryApiKeyStore;
pub use postgres::PgApiKeyStore;

use crate::error::AppError;
use crate::models::api_key::{ApiKey, NewApiKey, UpdateApiKeyRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Storage operations over the `api_keys` table.
///
/// Implementations never hand out or accept a way to change `key_hash` after
/// insert, and never flip `is_active` back to `true`.
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    /// Insert a new active key.
    async fn insert(&self, key: NewApiKey) -> Result<ApiKey, AppError>;

    /// Insert a key only if the table is completely empty.
    ///
    /// Returns `None` when any key (active or revoked) already exists. The
    /// emptiness check and the insert happen atomically.
    async fn insert_first(&self, key: NewApiKey) -> Result<Option<ApiKey>, AppError>;

    /// All active keys, in no particular order.
    async fn list_active(&self) -> Result<Vec<ApiKey>, AppError>;

    /// Keys ordered by creation time, newest first.
    async fn list(&self, include_inactive: bool) -> Result<Vec<ApiKey>, AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<ApiKey>, AppError>;

    /// Apply a whitelisted patch. `None` if no key has this id.
    async fn update(&self, id: Uuid, patch: UpdateApiKeyRequest)
    -> Result<Option<ApiKey>, AppError>;

    /// Mark a key revoked. Returns false if no key has this id.
    async fn deactivate(&self, id: Uuid) -> Result<bool, AppError>;

    /// Whether any key was ever issued, revoked ones included.
    async fn has_any(&self) -> Result<bool, AppError>;

    async fn touch_last_used(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError>;

    /// Connectivity probe used by the health endpoint.
    async fn ping(&self) -> Result<(), AppError>;
}
