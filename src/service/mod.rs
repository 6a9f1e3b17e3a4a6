//! Key lifecycle, tier policy, the request gate and usage reports

pub mod gate;
pub mod key_store;
pub mod reports;
pub mod tiers;

pub use gate::{bearer_credential, Admission, AuthFailure, Rejection, RequestGate};
pub use key_store::{IssuedKey, KeyStore, Revocation};
pub use reports::UsageReports;
pub use tiers::{Ceiling, ConfiguredTiers, RatePolicy, TierDirectory};
