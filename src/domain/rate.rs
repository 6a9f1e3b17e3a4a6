//! Daily rate decision
//!
//! Windows are fixed UTC calendar days. The count used for a decision is read
//! before the current request is recorded, so the request that would be the
//! (ceiling + 1)-th of the day is denied and never counted.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

/// Outcome of a rate check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allow,
    Deny,
}

impl RateDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, RateDecision::Allow)
    }
}

/// Allow iff `current_count < ceiling`
pub fn check(current_count: i64, ceiling: i64) -> RateDecision {
    if current_count < ceiling {
        RateDecision::Allow
    } else {
        RateDecision::Deny
    }
}

/// The UTC calendar day a request is counted against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyWindow {
    day: NaiveDate,
}

impl DailyWindow {
    /// Window containing `now`, always evaluated in UTC
    pub fn containing(now: DateTime<Utc>) -> Self {
        Self { day: now.date_naive() }
    }

    pub fn current() -> Self {
        Self::containing(Utc::now())
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }

    /// Start of the next UTC day
    pub fn reset_at(&self) -> DateTime<Utc> {
        (self.day + Duration::days(1))
            .and_hms_opt(0, 0, 0)
            .map(|midnight| midnight.and_utc())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Seconds until the window resets, never less than 1
    pub fn seconds_until_reset(&self, now: DateTime<Utc>) -> i64 {
        (self.reset_at() - now).num_seconds().max(1)
    }
}

/// Rate limit state reported to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitStatus {
    pub tier: String,
    pub limit: i64,
    /// Count for today before the current request
    pub used: i64,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitStatus {
    pub fn remaining(&self) -> i64 {
        (self.limit - self.used).max(0)
    }

    /// Remaining quota once the admitted request has been recorded
    pub fn remaining_after_admit(&self) -> i64 {
        (self.limit - self.used - 1).max(0)
    }
}
