//! PostgreSQL-backed key store.

use super::ApiKeyStore;
use crate::db::DbPool;
use crate::error::AppError;
use crate::models::api_key::{ApiKey, NewApiKey, UpdateApiKeyRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

/// Key store over the `api_keys` table.
#[derive(Debug, Clone)]
pub struct PgApiKeyStore {
    pool: DbPool,
}

impl PgApiKeyStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApiKeyStore for PgApiKeyStore {
    async fn insert(&self, key: NewApiKey) -> Result<ApiKey, AppError> {
        let record = sqlx::query_as::<_, ApiKey>(
            r#"
            INSERT INTO api_keys (key_name, key_prefix, key_hash, permissions, metadata)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(key.key_name)
        .bind(key.key_prefix)
        .bind(key.key_hash)
        .bind(Json(key.permissions))
        .bind(Json(key.metadata))
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn insert_first(&self, key: NewApiKey) -> Result<Option<ApiKey>, AppError> {
        let mut tx = self.pool.begin().await?;

        // EXCLUSIVE blocks concurrent writers (including another bootstrap)
        // but still lets the request gate read active keys.
        sqlx::query("LOCK TABLE api_keys IN EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let record = sqlx::query_as::<_, ApiKey>(
            r#"
            INSERT INTO api_keys (key_name, key_prefix, key_hash, permissions, metadata)
            SELECT $1, $2, $3, $4, $5
            WHERE NOT EXISTS (SELECT 1 FROM api_keys)
            RETURNING *
            "#,
        )
        .bind(key.key_name)
        .bind(key.key_prefix)
        .bind(key.key_hash)
        .bind(Json(key.permissions))
        .bind(Json(key.metadata))
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(record)
    }

    async fn list_active(&self) -> Result<Vec<ApiKey>, AppError> {
        let keys = sqlx::query_as::<_, ApiKey>("SELECT * FROM api_keys WHERE is_active = true")
            .fetch_all(&self.pool)
            .await?;

        Ok(keys)
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<ApiKey>, AppError> {
        let keys = sqlx::query_as::<_, ApiKey>(
            r#"
            SELECT * FROM api_keys
            WHERE ($1 OR is_active = true)
            ORDER BY created_at DESC
            "#,
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;

        Ok(keys)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ApiKey>, AppError> {
        let key = sqlx::query_as::<_, ApiKey>("SELECT * FROM api_keys WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(key)
    }

    async fn update(
        &self,
        id: Uuid,
        patch: UpdateApiKeyRequest,
    ) -> Result<Option<ApiKey>, AppError> {
        // Only name, permissions and metadata are reachable from here
        let key = sqlx::query_as::<_, ApiKey>(
            r#"
            UPDATE api_keys
            SET key_name = COALESCE($2, key_name),
                permissions = COALESCE($3, permissions),
                metadata = COALESCE($4, metadata)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.name)
        .bind(patch.permissions.map(Json))
        .bind(patch.metadata.map(Json))
        .fetch_optional(&self.pool)
        .await?;

        Ok(key)
    }

    async fn deactivate(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE api_keys SET is_active = false WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn has_any(&self) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM api_keys)")
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    async fn touch_last_used(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE api_keys SET last_used_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
