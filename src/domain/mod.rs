//! Domain types: credentials, records and the rate decision

pub mod credential;
pub mod rate;
pub mod records;

pub use credential::{CredentialCodec, IssuedCredential, KeyDigest, PlainSecret};
pub use rate::{DailyWindow, RateDecision, RateLimitStatus};
pub use records::{DailyCount, KeyRecord, KeyView, UsageRecord};
