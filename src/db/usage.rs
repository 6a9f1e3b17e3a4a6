//! Daily usage counters in Postgres

use async_trait::async_trait;
use chrono::NaiveDate;
use std::num::NonZeroU32;
use uuid::Uuid;

use super::pool::{DbError, DbPool};
use super::store::{StoreError, UsageLedger};
use crate::domain::DailyCount;

/// Postgres-backed usage ledger
#[derive(Clone)]
pub struct PgUsageLedger {
    pool: DbPool,
}

impl PgUsageLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageLedger for PgUsageLedger {
    async fn increment(
        &self,
        key_id: Uuid,
        day: NaiveDate,
        by: NonZeroU32,
    ) -> Result<i64, StoreError> {
        let by = i64::from(by.get());

        // Single statement: concurrent callers serialize on the row lock
        self.pool
            .bounded(async {
                let client = self.pool.get().await?;
                let row = client
                    .query_one(
                        r#"
                        INSERT INTO api_key_usage (api_key_id, usage_date, image_count)
                        VALUES ($1, $2, $3)
                        ON CONFLICT (api_key_id, usage_date) DO UPDATE SET
                            image_count = api_key_usage.image_count + EXCLUDED.image_count,
                            updated_at = NOW()
                        RETURNING image_count
                        "#,
                        &[&key_id, &day, &by],
                    )
                    .await
                    .map_err(DbError::from)
                    .map_err(|e| StoreError::for_usage_write(e, key_id))?;
                Ok::<i64, StoreError>(row.get("image_count"))
            })
            .await
    }

    async fn get(&self, key_id: Uuid, day: NaiveDate) -> Result<i64, StoreError> {
        self.pool
            .bounded(async {
                let client = self.pool.get().await?;
                let row = client
                    .query_opt(
                        "SELECT image_count FROM api_key_usage WHERE api_key_id = $1 AND usage_date = $2",
                        &[&key_id, &day],
                    )
                    .await?;
                Ok::<_, DbError>(row.map(|r| r.get("image_count")).unwrap_or(0))
            })
            .await
    }

    async fn sum_for_range(
        &self,
        key_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<i64, StoreError> {
        self.pool
            .bounded(async {
                let client = self.pool.get().await?;
                let row = client
                    .query_one(
                        r#"
                        SELECT COALESCE(SUM(image_count), 0)::BIGINT AS total
                        FROM api_key_usage
                        WHERE api_key_id = $1 AND usage_date BETWEEN $2 AND $3
                        "#,
                        &[&key_id, &start, &end],
                    )
                    .await?;
                Ok::<_, DbError>(row.get("total"))
            })
            .await
    }

    async fn list_for_range(
        &self,
        key_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyCount>, StoreError> {
        self.pool
            .bounded(async {
                let client = self.pool.get().await?;
                let rows = client
                    .query(
                        r#"
                        SELECT usage_date, image_count
                        FROM api_key_usage
                        WHERE api_key_id = $1 AND usage_date BETWEEN $2 AND $3
                        ORDER BY usage_date
                        "#,
                        &[&key_id, &start, &end],
                    )
                    .await?;
                Ok::<_, DbError>(
                    rows.iter()
                        .map(|r| DailyCount {
                            usage_date: r.get("usage_date"),
                            image_count: r.get("image_count"),
                        })
                        .collect(),
                )
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    //! Run against a real database when `DATABASE_URL` is exported

    use super::*;
    use crate::config::DatabaseSettings;
    use crate::db::api_keys::PgKeyRepository;
    use crate::db::store::KeyRepository;
    use crate::domain::{CredentialCodec, KeyRecord};
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    async fn test_pool() -> Option<DbPool> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = DbPool::new(&DatabaseSettings {
            url,
            ..DatabaseSettings::default()
        })
        .ok()?;
        pool.migrate().await.ok()?;
        Some(pool)
    }

    async fn seed_key(pool: &DbPool) -> KeyRecord {
        let issued = CredentialCodec::new("nb_live_").issue();
        let record = KeyRecord {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            key_digest: issued.digest,
            key_prefix: issued.prefix,
            name: None,
            is_active: true,
            last_used_at: None,
            created_at: Utc::now(),
        };
        PgKeyRepository::new(pool.clone()).insert(&record).await.unwrap();
        record
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let key = seed_key(&pool).await;
        let ledger = Arc::new(PgUsageLedger::new(pool));
        let day = Utc::now().date_naive();

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move {
                    ledger.increment(key.id, day, NonZeroU32::MIN).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(ledger.get(key.id, day).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn test_range_queries_and_day_isolation() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let key = seed_key(&pool).await;
        let ledger = PgUsageLedger::new(pool);
        let today = Utc::now().date_naive();
        let yesterday = today - Duration::days(1);

        ledger.increment(key.id, yesterday, NonZeroU32::new(2).unwrap()).await.unwrap();
        ledger.increment(key.id, today, NonZeroU32::MIN).await.unwrap();

        assert_eq!(ledger.get(key.id, yesterday).await.unwrap(), 2);
        assert_eq!(ledger.get(key.id, today).await.unwrap(), 1);
        assert_eq!(ledger.sum_for_range(key.id, yesterday, today).await.unwrap(), 3);

        let days = ledger.list_for_range(key.id, yesterday, today).await.unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].usage_date, yesterday);
    }

    #[tokio::test]
    async fn test_increment_unknown_key() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let ledger = PgUsageLedger::new(pool);
        let result = ledger
            .increment(Uuid::new_v4(), Utc::now().date_naive(), NonZeroU32::MIN)
            .await;
        assert!(matches!(result, Err(StoreError::UnknownKey(_))));
    }

    #[tokio::test]
    async fn test_duplicate_digest_is_reported() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let key = seed_key(&pool).await;
        let clash = KeyRecord {
            id: Uuid::new_v4(),
            ..key
        };
        let result = PgKeyRepository::new(pool).insert(&clash).await;
        assert!(matches!(result, Err(StoreError::DuplicateDigest)));
    }
}
