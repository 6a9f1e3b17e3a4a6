//! Key lifecycle: issuance, lookup and revocation

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{KeyRepository, StoreError};
use crate::domain::{CredentialCodec, KeyRecord, KeyView, PlainSecret};

/// Issuance attempts before a digest collision is treated as an internal error
pub const MAX_ISSUE_ATTEMPTS: usize = 3;

/// A freshly created key. The only value that ever carries the plaintext secret.
#[derive(Debug)]
pub struct IssuedKey {
    pub record: KeyRecord,
    pub secret: PlainSecret,
}

/// Outcome of a revocation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revocation {
    Revoked,
    /// Unknown key, or a key owned by someone else
    NotFound,
}

#[derive(Clone)]
pub struct KeyStore {
    repo: Arc<dyn KeyRepository>,
    codec: CredentialCodec,
}

impl KeyStore {
    pub fn new(repo: Arc<dyn KeyRepository>, codec: CredentialCodec) -> Self {
        Self { repo, codec }
    }

    pub fn codec(&self) -> &CredentialCodec {
        &self.codec
    }

    /// Issue and persist a new active key for `owner_id`
    pub async fn create(
        &self,
        owner_id: Uuid,
        name: Option<String>,
    ) -> Result<IssuedKey, StoreError> {
        for attempt in 1..=MAX_ISSUE_ATTEMPTS {
            let issued = self.codec.issue();
            let record = KeyRecord {
                id: Uuid::new_v4(),
                owner_id,
                key_digest: issued.digest,
                key_prefix: issued.prefix,
                name: name.clone(),
                is_active: true,
                last_used_at: None,
                created_at: Utc::now(),
            };

            match self.repo.insert(&record).await {
                Ok(()) => {
                    info!(
                        key_id = %record.id,
                        key_prefix = %record.key_prefix,
                        owner_id = %owner_id,
                        "Issued API key"
                    );
                    return Ok(IssuedKey {
                        record,
                        secret: issued.secret,
                    });
                }
                Err(StoreError::DuplicateDigest) => {
                    warn!(attempt, "Digest collision on key issuance, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(StoreError::DuplicateDigest)
    }

    /// All keys of an owner, newest first, as outward projections
    pub async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<KeyView>, StoreError> {
        let records = self.repo.list_by_owner(owner_id).await?;
        Ok(records.into_iter().map(KeyView::from).collect())
    }

    /// Find the record behind a presented secret. Revoked keys are returned too.
    pub async fn resolve(&self, candidate: &str) -> Result<Option<KeyRecord>, StoreError> {
        if !self.codec.verify_shape(candidate) {
            return Ok(None);
        }
        let digest = CredentialCodec::digest_of(candidate);
        self.repo.find_by_digest(&digest).await
    }

    pub async fn find_for_owner(
        &self,
        key_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Option<KeyRecord>, StoreError> {
        self.repo.find_for_owner(key_id, owner_id).await
    }

    /// Deactivate a key owned by `owner_id`. Foreign keys look exactly like missing ones.
    pub async fn revoke(&self, key_id: Uuid, owner_id: Uuid) -> Result<Revocation, StoreError> {
        if self.repo.deactivate(key_id, owner_id).await? {
            Ok(Revocation::Revoked)
        } else {
            Ok(Revocation::NotFound)
        }
    }

    /// Best-effort last-used update; failures are logged and dropped
    pub async fn touch_last_used(&self, key_id: Uuid) {
        if let Err(e) = self.repo.touch(key_id, Utc::now()).await {
            warn!(key_id = %key_id, error = %e, "Failed to update last_used_at");
        }
    }
}
