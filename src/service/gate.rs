//! Per-request authorization
//!
//! The gate walks a fixed sequence: bearer extraction, shape check, digest
//! lookup, active flag, last-used touch, ceiling lookup, rate check. Every
//! rejection is terminal and happens before the downstream handler runs.
//! Usage is recorded only after the handler reports success.

use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::key_store::KeyStore;
use super::tiers::RatePolicy;
use crate::db::{StoreError, UsageLedger};
use crate::domain::rate::{self, DailyWindow, RateLimitStatus};
use crate::domain::KeyRecord;

/// Why a credential was refused. Internal only: callers see one uniform 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    NoCredential,
    MalformedCredential,
    UnknownDigest,
    Revoked,
}

impl AuthFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthFailure::NoCredential => "no_credential",
            AuthFailure::MalformedCredential => "malformed_credential",
            AuthFailure::UnknownDigest => "unknown_digest",
            AuthFailure::Revoked => "revoked",
        }
    }
}

/// Terminal gate outcomes
#[derive(Debug)]
pub enum Rejection {
    Unauthenticated(AuthFailure),
    RateExceeded(RateLimitStatus),
    Internal(StoreError),
}

impl From<StoreError> for Rejection {
    fn from(err: StoreError) -> Self {
        Rejection::Internal(err)
    }
}

/// A request that passed every check and may run the handler
#[derive(Debug, Clone)]
pub struct Admission {
    pub key: KeyRecord,
    pub window: DailyWindow,
    pub status: RateLimitStatus,
}

/// Pull the token out of an `Authorization` header value
///
/// The scheme is matched case-insensitively and exactly one token must follow.
pub fn bearer_credential(header: Option<&str>) -> Option<&str> {
    let mut parts = header?.split_whitespace();
    let scheme = parts.next()?;
    let token = parts.next()?;
    if parts.next().is_some() || !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token)
}

#[derive(Clone)]
pub struct RequestGate {
    keys: KeyStore,
    ledger: Arc<dyn UsageLedger>,
    policy: RatePolicy,
}

impl RequestGate {
    pub fn new(keys: KeyStore, ledger: Arc<dyn UsageLedger>, policy: RatePolicy) -> Self {
        Self { keys, ledger, policy }
    }

    /// Current rate status for a key without touching usage
    pub async fn status_for(&self, key: &KeyRecord) -> Result<RateLimitStatus, StoreError> {
        let (_, status) = self.window_status(key).await?;
        Ok(status)
    }

    async fn window_status(
        &self,
        key: &KeyRecord,
    ) -> Result<(DailyWindow, RateLimitStatus), StoreError> {
        let window = DailyWindow::current();
        let ceiling = self.policy.ceiling_for(key.owner_id);
        let used = self.ledger.get(key.id, window.day()).await?;
        let status = RateLimitStatus {
            tier: ceiling.tier,
            limit: ceiling.limit,
            used,
            reset_at: window.reset_at(),
        };
        Ok((window, status))
    }

    /// Identify the caller without any rate check
    pub async fn authenticate(&self, credential: Option<&str>) -> Result<KeyRecord, Rejection> {
        let result = self.resolve_active(credential).await;
        if let Err(Rejection::Unauthenticated(reason)) = &result {
            warn!(reason = reason.as_str(), "API key rejected");
        }
        let key = result?;

        self.keys.touch_last_used(key.id).await;
        Ok(key)
    }

    async fn resolve_active(&self, credential: Option<&str>) -> Result<KeyRecord, Rejection> {
        let candidate = credential.ok_or(Rejection::Unauthenticated(AuthFailure::NoCredential))?;

        if !self.keys.codec().verify_shape(candidate) {
            return Err(Rejection::Unauthenticated(AuthFailure::MalformedCredential));
        }

        let key = self
            .keys
            .resolve(candidate)
            .await?
            .ok_or(Rejection::Unauthenticated(AuthFailure::UnknownDigest))?;

        if !key.is_active {
            return Err(Rejection::Unauthenticated(AuthFailure::Revoked));
        }
        Ok(key)
    }

    /// Authenticate, then check today's count against the owner's ceiling
    pub async fn admit(&self, credential: Option<&str>) -> Result<Admission, Rejection> {
        let key = self.authenticate(credential).await?;
        let (window, status) = self.window_status(&key).await?;

        if !rate::check(status.used, status.limit).is_allowed() {
            debug!(
                key_id = %key.id,
                tier = %status.tier,
                limit = status.limit,
                "Daily ceiling reached"
            );
            return Err(Rejection::RateExceeded(status));
        }

        Ok(Admission { key, window, status })
    }

    /// Record one usage for an admitted request whose handler succeeded
    ///
    /// The write runs on its own task so it still completes if the caller is
    /// dropped mid-await.
    pub async fn settle(&self, admission: &Admission) -> Result<i64, Rejection> {
        let ledger = self.ledger.clone();
        let key_id = admission.key.id;
        let day = admission.window.day();

        let write = tokio::spawn(async move { ledger.increment(key_id, day, NonZeroU32::MIN).await });

        match write.await {
            Ok(Ok(count)) => Ok(count),
            Ok(Err(e)) => {
                error!(key_id = %key_id, error = %e, "Failed to record usage");
                Err(Rejection::Internal(e))
            }
            Err(e) => {
                error!(key_id = %key_id, error = %e, "Usage write task failed");
                Err(Rejection::Internal(StoreError::Interrupted(e.to_string())))
            }
        }
    }

    /// Run `handler` behind the full gate, charging usage only on `Ok`
    pub async fn run<T, E, F, Fut>(
        &self,
        credential: Option<&str>,
        handler: F,
    ) -> Result<Result<T, E>, Rejection>
    where
        F: FnOnce(Admission) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let admission = self.admit(credential).await?;
        let outcome = handler(admission.clone()).await;
        if outcome.is_ok() {
            self.settle(&admission).await?;
        }
        Ok(outcome)
    }
}
