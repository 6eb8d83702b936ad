//! In-memory key store for development and testing.

use super::ApiKeyStore;
use crate::error::AppError;
use crate::models::api_key::{ApiKey, NewApiKey, UpdateApiKeyRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Keys held in insertion order. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryApiKeyStore {
    keys: RwLock<Vec<ApiKey>>,
}

impl InMemoryApiKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn materialize(key: NewApiKey) -> ApiKey {
        ApiKey {
            id: Uuid::new_v4(),
            key_name: key.key_name,
            key_prefix: key.key_prefix,
            key_hash: key.key_hash,
            permissions: Json(key.permissions),
            metadata: Json(key.metadata),
            is_active: true,
            created_at: Utc::now(),
            last_used_at: None,
        }
    }
}

#[async_trait]
impl ApiKeyStore for InMemoryApiKeyStore {
    async fn insert(&self, key: NewApiKey) -> Result<ApiKey, AppError> {
        let record = Self::materialize(key);
        self.keys.write().await.push(record.clone());
        Ok(record)
    }

    async fn insert_first(&self, key: NewApiKey) -> Result<Option<ApiKey>, AppError> {
        let mut keys = self.keys.write().await;
        if !keys.is_empty() {
            return Ok(None);
        }

        let record = Self::materialize(key);
        keys.push(record.clone());
        Ok(Some(record))
    }

    async fn list_active(&self) -> Result<Vec<ApiKey>, AppError> {
        let keys = self.keys.read().await;
        Ok(keys.iter().filter(|k| k.is_active).cloned().collect())
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<ApiKey>, AppError> {
        let keys = self.keys.read().await;
        // Insertion order is creation order, so reversing gives newest first
        Ok(keys
            .iter()
            .rev()
            .filter(|k| include_inactive || k.is_active)
            .cloned()
            .collect())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ApiKey>, AppError> {
        let keys = self.keys.read().await;
        Ok(keys.iter().find(|k| k.id == id).cloned())
    }

    async fn update(
        &self,
        id: Uuid,
        patch: UpdateApiKeyRequest,
    ) -> Result<Option<ApiKey>, AppError> {
        let mut keys = self.keys.write().await;
        let Some(key) = keys.iter_mut().find(|k| k.id == id) else {
            return Ok(None);
        };

        if let Some(name) = patch.name {
            key.key_name = name;
        }
        if let Some(permissions) = patch.permissions {
            key.permissions = Json(permissions);
        }
        if let Some(metadata) = patch.metadata {
            key.metadata = Json(metadata);
        }

        Ok(Some(key.clone()))
    }

    async fn deactivate(&self, id: Uuid) -> Result<bool, AppError> {
        let mut keys = self.keys.write().await;
        match keys.iter_mut().find(|k| k.id == id) {
            Some(key) => {
                key.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn has_any(&self) -> Result<bool, AppError> {
        Ok(!self.keys.read().await.is_empty())
    }

    async fn touch_last_used(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        let mut keys = self.keys.write().await;
        if let Some(key) = keys.iter_mut().find(|k| k.id == id) {
            key.last_used_at = Some(at);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
