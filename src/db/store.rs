//! Storage seams for keys and usage counters

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use super::pool::{is_foreign_key_violation, is_unique_violation, DbError};
use crate::domain::{DailyCount, KeyDigest, KeyRecord};

/// Errors surfaced by storage backends
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a key with the same digest already exists")]
    DuplicateDigest,
    #[error("unknown API key {0}")]
    UnknownKey(Uuid),
    #[error("storage call timed out after {0:?}")]
    Timeout(Duration),
    #[error("storage task interrupted: {0}")]
    Interrupted(String),
    #[error(transparent)]
    Db(DbError),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        if is_unique_violation(&err) {
            StoreError::DuplicateDigest
        } else {
            StoreError::Db(err)
        }
    }
}

impl StoreError {
    /// Map a usage write error, turning a foreign key violation into `UnknownKey`
    pub fn for_usage_write(err: DbError, key_id: Uuid) -> Self {
        if is_foreign_key_violation(&err) {
            StoreError::UnknownKey(key_id)
        } else {
            StoreError::from(err)
        }
    }
}

/// Durable key records
#[async_trait]
pub trait KeyRepository: Send + Sync {
    /// Persist a new record. Fails with `DuplicateDigest` if the digest is taken.
    async fn insert(&self, record: &KeyRecord) -> Result<(), StoreError>;

    /// Look up a record by digest, active or not
    async fn find_by_digest(&self, digest: &KeyDigest) -> Result<Option<KeyRecord>, StoreError>;

    /// Look up a record only if it belongs to `owner_id`
    async fn find_for_owner(
        &self,
        key_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<KeyRecord>, StoreError>;

    /// All records of an owner, newest first
    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<KeyRecord>, StoreError>;

    /// Clear the active flag. Returns false when no record matches id and owner.
    async fn deactivate(&self, key_id: Uuid, owner_id: Uuid) -> Result<bool, StoreError>;

    /// Record a successful verification time
    async fn touch(&self, key_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;
}

/// Per-key, per-UTC-day counters
#[async_trait]
pub trait UsageLedger: Send + Sync {
    /// Atomically create the (key, day) counter at `by` or add `by` to it.
    /// Returns the count after the write.
    async fn increment(&self, key_id: Uuid, day: NaiveDate, by: NonZeroU32)
        -> Result<i64, StoreError>;

    /// Count for one day, 0 when no record exists
    async fn get(&self, key_id: Uuid, day: NaiveDate) -> Result<i64, StoreError>;

    /// Total over `start..=end`
    async fn sum_for_range(
        &self,
        key_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<i64, StoreError>;

    /// Days with a record in `start..=end`, oldest first
    async fn list_for_range(
        &self,
        key_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyCount>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_db_error_stays_db() {
        let err = StoreError::from(DbError::Config("bad".to_string()));
        assert!(matches!(err, StoreError::Db(_)));
    }

    #[test]
    fn test_usage_write_error_without_fk_stays_db() {
        let key_id = Uuid::new_v4();
        let err = StoreError::for_usage_write(DbError::Config("bad".to_string()), key_id);
        assert!(matches!(err, StoreError::Db(_)));
    }

    #[test]
    fn test_timeout_message() {
        let err = StoreError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "storage call timed out after 250ms");
    }
}
