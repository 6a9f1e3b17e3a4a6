//! API key database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use tracing::{info, warn};
use uuid::Uuid;

use super::pool::{DbError, DbPool};
use super::store::{KeyRepository, StoreError};
use crate::domain::{KeyDigest, KeyRecord};

const KEY_COLUMNS: &str =
    "id, owner_id, key_digest, key_prefix, name, is_active, last_used_at, created_at";

fn key_from_row(row: &Row) -> KeyRecord {
    KeyRecord {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        key_digest: KeyDigest::from_stored(row.get("key_digest")),
        key_prefix: row.get("key_prefix"),
        name: row.get("name"),
        is_active: row.get("is_active"),
        last_used_at: row.get("last_used_at"),
        created_at: row.get("created_at"),
    }
}

/// Postgres-backed key repository
#[derive(Clone)]
pub struct PgKeyRepository {
    pool: DbPool,
}

impl PgKeyRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyRepository for PgKeyRepository {
    async fn insert(&self, record: &KeyRecord) -> Result<(), StoreError> {
        self.pool
            .bounded(async {
                let client = self.pool.get().await?;
                client
                    .execute(
                        r#"
                        INSERT INTO api_keys (
                            id, owner_id, key_digest, key_prefix, name,
                            is_active, last_used_at, created_at
                        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                        "#,
                        &[
                            &record.id,
                            &record.owner_id,
                            &record.key_digest.as_str(),
                            &record.key_prefix,
                            &record.name,
                            &record.is_active,
                            &record.last_used_at,
                            &record.created_at,
                        ],
                    )
                    .await?;
                Ok::<_, DbError>(())
            })
            .await?;

        info!(
            key_id = %record.id,
            key_prefix = %record.key_prefix,
            owner_id = %record.owner_id,
            "Stored new API key"
        );
        Ok(())
    }

    async fn find_by_digest(&self, digest: &KeyDigest) -> Result<Option<KeyRecord>, StoreError> {
        self.pool
            .bounded(async {
                let client = self.pool.get().await?;
                let row = client
                    .query_opt(
                        &format!("SELECT {} FROM api_keys WHERE key_digest = $1", KEY_COLUMNS),
                        &[&digest.as_str()],
                    )
                    .await?;
                Ok::<_, DbError>(row.as_ref().map(key_from_row))
            })
            .await
    }

    async fn find_for_owner(
        &self,
        key_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<KeyRecord>, StoreError> {
        self.pool
            .bounded(async {
                let client = self.pool.get().await?;
                let row = client
                    .query_opt(
                        &format!(
                            "SELECT {} FROM api_keys WHERE id = $1 AND owner_id = $2",
                            KEY_COLUMNS
                        ),
                        &[&key_id, &owner_id],
                    )
                    .await?;
                Ok::<_, DbError>(row.as_ref().map(key_from_row))
            })
            .await
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<KeyRecord>, StoreError> {
        self.pool
            .bounded(async {
                let client = self.pool.get().await?;
                let rows = client
                    .query(
                        &format!(
                            "SELECT {} FROM api_keys WHERE owner_id = $1 ORDER BY created_at DESC, id",
                            KEY_COLUMNS
                        ),
                        &[&owner_id],
                    )
                    .await?;
                Ok::<_, DbError>(rows.iter().map(key_from_row).collect())
            })
            .await
    }

    async fn deactivate(&self, key_id: Uuid, owner_id: Uuid) -> Result<bool, StoreError> {
        let updated = self
            .pool
            .bounded(async {
                let client = self.pool.get().await?;
                let updated = client
                    .execute(
                        "UPDATE api_keys SET is_active = FALSE WHERE id = $1 AND owner_id = $2",
                        &[&key_id, &owner_id],
                    )
                    .await?;
                Ok::<_, DbError>(updated)
            })
            .await?;

        if updated > 0 {
            warn!(key_id = %key_id, "API key revoked");
        }
        Ok(updated > 0)
    }

    async fn touch(&self, key_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.pool
            .bounded(async {
                let client = self.pool.get().await?;
                client
                    .execute(
                        "UPDATE api_keys SET last_used_at = $2 WHERE id = $1",
                        &[&key_id, &at],
                    )
                    .await?;
                Ok::<_, DbError>(())
            })
            .await
    }
}
