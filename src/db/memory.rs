//! In-process storage backend
//!
//! Used when no database URL is configured and throughout the tests.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::num::NonZeroU32;
use uuid::Uuid;

use super::store::{KeyRepository, StoreError, UsageLedger};
use crate::domain::{DailyCount, KeyDigest, KeyRecord, UsageRecord};

#[derive(Default)]
struct KeyTables {
    by_id: HashMap<Uuid, KeyRecord>,
    by_digest: HashMap<KeyDigest, Uuid>,
}

/// Keys and usage counters held in memory
#[derive(Default)]
pub struct MemoryStore {
    keys: RwLock<KeyTables>,
    usage: DashMap<(Uuid, NaiveDate), UsageRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyRepository for MemoryStore {
    async fn insert(&self, record: &KeyRecord) -> Result<(), StoreError> {
        let mut tables = self.keys.write();
        if tables.by_digest.contains_key(&record.key_digest) {
            return Err(StoreError::DuplicateDigest);
        }
        tables.by_digest.insert(record.key_digest.clone(), record.id);
        tables.by_id.insert(record.id, record.clone());
        Ok(())
    }

    async fn find_by_digest(&self, digest: &KeyDigest) -> Result<Option<KeyRecord>, StoreError> {
        let tables = self.keys.read();
        Ok(tables
            .by_digest
            .get(digest)
            .and_then(|id| tables.by_id.get(id))
            .cloned())
    }

    async fn find_for_owner(
        &self,
        key_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<KeyRecord>, StoreError> {
        Ok(self
            .keys
            .read()
            .by_id
            .get(&key_id)
            .filter(|record| record.owner_id == owner_id)
            .cloned())
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<KeyRecord>, StoreError> {
        let mut records: Vec<KeyRecord> = self
            .keys
            .read()
            .by_id
            .values()
            .filter(|record| record.owner_id == owner_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn deactivate(&self, key_id: Uuid, owner_id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.keys.write();
        match tables.by_id.get_mut(&key_id) {
            Some(record) if record.owner_id == owner_id => {
                record.is_active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn touch(&self, key_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        if let Some(record) = self.keys.write().by_id.get_mut(&key_id) {
            record.last_used_at = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl UsageLedger for MemoryStore {
    async fn increment(
        &self,
        key_id: Uuid,
        day: NaiveDate,
        by: NonZeroU32,
    ) -> Result<i64, StoreError> {
        if !self.keys.read().by_id.contains_key(&key_id) {
            return Err(StoreError::UnknownKey(key_id));
        }

        let by = i64::from(by.get());
        let now = Utc::now();
        // The entry guard holds the shard lock for the whole upsert
        let entry = self
            .usage
            .entry((key_id, day))
            .and_modify(|record| {
                record.image_count += by;
                record.updated_at = now;
            })
            .or_insert_with(|| UsageRecord {
                api_key_id: key_id,
                usage_date: day,
                image_count: by,
                created_at: now,
                updated_at: now,
            });
        Ok(entry.image_count)
    }

    async fn get(&self, key_id: Uuid, day: NaiveDate) -> Result<i64, StoreError> {
        Ok(self
            .usage
            .get(&(key_id, day))
            .map(|record| record.image_count)
            .unwrap_or(0))
    }

    async fn sum_for_range(
        &self,
        key_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<i64, StoreError> {
        let days = self.list_for_range(key_id, start, end).await?;
        Ok(days.iter().map(|d| d.image_count).sum())
    }

    async fn list_for_range(
        &self,
        key_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyCount>, StoreError> {
        let mut days: Vec<DailyCount> = self
            .usage
            .iter()
            .filter(|entry| {
                let (id, day) = *entry.key();
                id == key_id && day >= start && day <= end
            })
            .map(|entry| DailyCount {
                usage_date: entry.usage_date,
                image_count: entry.image_count,
            })
            .collect();
        days.sort_by_key(|d| d.usage_date);
        Ok(days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CredentialCodec;
    use chrono::Duration;
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    fn record_for(owner_id: Uuid) -> KeyRecord {
        let issued = CredentialCodec::new("nb_live_").issue();
        KeyRecord {
            id: Uuid::new_v4(),
            owner_id,
            key_digest: issued.digest,
            key_prefix: issued.prefix,
            name: None,
            is_active: true,
            last_used_at: None,
            created_at: Utc::now(),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = MemoryStore::new();
        let record = record_for(Uuid::new_v4());
        assert_ok!(store.insert(&record).await);

        let found = assert_ok!(store.find_by_digest(&record.key_digest).await);
        assert_eq!(found, Some(record.clone()));

        let missing = store
            .find_by_digest(&CredentialCodec::digest_of("nb_live_nothing"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_digest_rejected() {
        let store = MemoryStore::new();
        let record = record_for(Uuid::new_v4());
        store.insert(&record).await.unwrap();

        let clash = KeyRecord {
            id: Uuid::new_v4(),
            ..record
        };
        let err = assert_err!(store.insert(&clash).await);
        assert!(matches!(err, StoreError::DuplicateDigest));
    }

    #[tokio::test]
    async fn test_list_by_owner_newest_first() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();

        let mut older = record_for(owner);
        older.created_at = Utc::now() - Duration::hours(1);
        let newer = record_for(owner);
        let foreign = record_for(Uuid::new_v4());

        for record in [&older, &newer, &foreign] {
            store.insert(record).await.unwrap();
        }

        let listed = store.list_by_owner(owner).await.unwrap();
        assert_eq!(listed.iter().map(|r| r.id).collect::<Vec<_>>(), vec![newer.id, older.id]);
    }

    #[tokio::test]
    async fn test_deactivate_checks_owner() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let record = record_for(owner);
        store.insert(&record).await.unwrap();

        assert!(!store.deactivate(record.id, Uuid::new_v4()).await.unwrap());
        assert!(store.find_by_digest(&record.key_digest).await.unwrap().unwrap().is_active);

        assert!(store.deactivate(record.id, owner).await.unwrap());
        assert!(!store.find_by_digest(&record.key_digest).await.unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn test_increment_creates_then_adds() {
        let store = MemoryStore::new();
        let record = record_for(Uuid::new_v4());
        store.insert(&record).await.unwrap();

        assert_eq!(store.increment(record.id, day(1), NonZeroU32::MIN).await.unwrap(), 1);
        assert_eq!(
            store.increment(record.id, day(1), NonZeroU32::new(4).unwrap()).await.unwrap(),
            5
        );
        assert_eq!(store.get(record.id, day(1)).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_increment_unknown_key() {
        let store = MemoryStore::new();
        let err = assert_err!(store.increment(Uuid::new_v4(), day(1), NonZeroU32::MIN).await);
        assert!(matches!(err, StoreError::UnknownKey(_)));
    }

    #[tokio::test]
    async fn test_day_isolation() {
        let store = MemoryStore::new();
        let record = record_for(Uuid::new_v4());
        store.insert(&record).await.unwrap();

        store.increment(record.id, day(1), NonZeroU32::MIN).await.unwrap();
        store.increment(record.id, day(1), NonZeroU32::MIN).await.unwrap();

        assert_eq!(store.get(record.id, day(1)).await.unwrap(), 2);
        assert_eq!(store.get(record.id, day(2)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_range_bounds_are_inclusive() {
        let store = MemoryStore::new();
        let record = record_for(Uuid::new_v4());
        let other = record_for(Uuid::new_v4());
        store.insert(&record).await.unwrap();
        store.insert(&other).await.unwrap();

        for d in [3, 1, 5, 9] {
            store.increment(record.id, day(d), NonZeroU32::new(d).unwrap()).await.unwrap();
        }
        store.increment(other.id, day(3), NonZeroU32::MIN).await.unwrap();

        let listed = store.list_for_range(record.id, day(1), day(5)).await.unwrap();
        assert_eq!(
            listed.iter().map(|d| d.usage_date).collect::<Vec<_>>(),
            vec![day(1), day(3), day(5)]
        );
        assert_eq!(store.sum_for_range(record.id, day(1), day(5)).await.unwrap(), 9);
        assert_eq!(store.sum_for_range(record.id, day(6), day(8)).await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let record = record_for(Uuid::new_v4());
        store.insert(&record).await.unwrap();

        let tasks: Vec<_> = (0..200)
            .map(|_| {
                let store = store.clone();
                let key_id = record.id;
                tokio::spawn(async move { store.increment(key_id, day(7), NonZeroU32::MIN).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(store.get(record.id, day(7)).await.unwrap(), 200);
    }

    #[tokio::test]
    async fn test_touch_sets_last_used() {
        let store = MemoryStore::new();
        let record = record_for(Uuid::new_v4());
        store.insert(&record).await.unwrap();

        let at = Utc::now();
        store.touch(record.id, at).await.unwrap();

        let found = store.find_by_digest(&record.key_digest).await.unwrap().unwrap();
        assert_eq!(found.last_used_at, Some(at));
    }
}
