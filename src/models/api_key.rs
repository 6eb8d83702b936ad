//! API Key model for authentication.
//!
//! API keys are the only credential this service knows about. They are stored as
//! bcrypt hashes; the plaintext is handed to the caller once, at creation, and
//! never again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::types::Json;
use uuid::Uuid;

/// Metadata keys written by the service itself rather than by callers.
pub const PROVENANCE_KEYS: [&str; 3] = ["created_by", "created_at_utc", "bootstrap"];

/// Capability flags attached to every key.
///
/// Flags missing from a request body deserialize as `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub write: bool,
    #[serde(default)]
    pub admin: bool,
}

impl Permissions {
    /// Read, write and admin. Only the bootstrap key gets this implicitly.
    pub fn full() -> Self {
        Self {
            read: true,
            write: true,
            admin: true,
        }
    }
}

impl Default for Permissions {
    /// Applied when a create request omits `permissions`.
    fn default() -> Self {
        Self {
            read: true,
            write: true,
            admin: false,
        }
    }
}

/// Represents an API key record from the database.
///
/// # Database Table
///
/// Maps to the `api_keys` table with columns:
/// - `id`: Unique identifier (UUID)
/// - `key_name`: Human readable label
/// - `key_prefix`: `ak_XXXX`, shown in listings
/// - `key_hash`: bcrypt hash of the full key
/// - `permissions`, `metadata`: JSONB
/// - `is_active`: false once revoked
/// - `created_at`, `last_used_at`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKey {
    /// Unique identifier for this API key
    pub id: Uuid,

    pub key_name: String,

    /// Display prefix (`ak_XXXX`). Carries no authorization weight.
    pub key_prefix: String,

    /// bcrypt hash of the full key
    ///
    /// Written once on insert. No update path touches it.
    pub key_hash: String,

    pub permissions: Json<Permissions>,

    pub metadata: Json<Map<String, Value>>,

    /// Whether this API key is currently active
    ///
    /// Inactive keys are rejected during authentication. Revocation is
    /// permanent; there is no way back to `true`.
    pub is_active: bool,

    pub created_at: DateTime<Utc>,

    /// Best-effort timestamp of the last successful authentication.
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Values needed to insert a new key. `id` and `created_at` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub key_name: String,
    pub key_prefix: String,
    pub key_hash: String,
    pub permissions: Permissions,
    pub metadata: Map<String, Value>,
}

/// Whitelisted changes to an existing key.
///
/// Unknown fields (`key_hash`, `is_active`, ...) are rejected when the body is
/// deserialized, so secret material and revocation state cannot be reached
/// through this path.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateApiKeyRequest {
    #[serde(default, alias = "key_name")]
    pub name: Option<String>,
    #[serde(default)]
    pub permissions: Option<Permissions>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

impl UpdateApiKeyRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.permissions.is_none() && self.metadata.is_none()
    }
}

/// Request body for `POST /api/auth/keys`.
///
/// # Example
///
/// ```json
/// {
///   "name": "Production Key",
///   "permissions": { "read": true, "write": true, "admin": false },
///   "metadata": { "environment": "production" }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct CreateApiKeyRequest {
    pub name: String,
    #[serde(default)]
    pub permissions: Option<Permissions>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

/// Request body for `POST /api/auth/bootstrap`.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapRequest {
    pub bootstrap_secret: String,
    #[serde(default = "default_bootstrap_key_name")]
    pub key_name: String,
}

fn default_bootstrap_key_name() -> String {
    "Initial Admin Key".to_string()
}

/// Query string of `GET /api/auth/keys`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListApiKeysQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

/// API key as returned to clients. Never carries the hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyResponse {
    pub id: Uuid,
    pub name: String,
    pub prefix: String,
    pub permissions: Permissions,
    pub metadata: Map<String, Value>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl From<ApiKey> for ApiKeyResponse {
    fn from(key: ApiKey) -> Self {
        Self {
            id: key.id,
            name: key.key_name,
            prefix: key.key_prefix,
            permissions: key.permissions.0,
            metadata: key.metadata.0,
            is_active: key.is_active,
            created_at: key.created_at,
            last_used_at: key.last_used_at,
        }
    }
}

/// Result of issuing a key: the stored record plus the one-time plaintext.
#[derive(Debug, Clone)]
pub struct CreatedApiKey {
    pub record: ApiKey,
    pub plaintext: String,
}

/// Response of `POST /api/auth/keys`.
///
/// # Example
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "api_key": "ak_3F9A_Yx...",
///   "name": "Production Key",
///   "prefix": "ak_3F9A",
///   "permissions": { "read": true, "write": true, "admin": false },
///   "metadata": { "created_by": "...", "created_at_utc": "..." },
///   "created_at": "2025-10-15T10:30:00Z",
///   "warning": "..."
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateApiKeyResponse {
    pub id: Uuid,
    pub api_key: String,
    pub name: String,
    pub prefix: String,
    pub permissions: Permissions,
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub warning: String,
}

pub const ONE_TIME_WARNING: &str =
    "This is the only time this API key is shown. Store it securely; it cannot be retrieved again.";

impl From<CreatedApiKey> for CreateApiKeyResponse {
    fn from(created: CreatedApiKey) -> Self {
        let record = created.record;
        Self {
            id: record.id,
            api_key: created.plaintext,
            name: record.key_name,
            prefix: record.key_prefix,
            permissions: record.permissions.0,
            metadata: record.metadata.0,
            created_at: record.created_at,
            warning: ONE_TIME_WARNING.to_string(),
        }
    }
}

/// Response of `POST /api/auth/bootstrap`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapResponse {
    pub id: Uuid,
    pub key_name: String,
    pub api_key: String,
    pub prefix: String,
    pub warning: String,
}

impl From<CreatedApiKey> for BootstrapResponse {
    fn from(created: CreatedApiKey) -> Self {
        Self {
            id: created.record.id,
            key_name: created.record.key_name,
            api_key: created.plaintext,
            prefix: created.record.key_prefix,
            warning: ONE_TIME_WARNING.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyListResponse {
    pub keys: Vec<ApiKeyResponse>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeApiKeyResponse {
    pub revoked: bool,
    pub key_id: Uuid,
}
