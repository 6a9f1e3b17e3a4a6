//! API Middleware Module
//!
//! Authentication, daily rate limiting and usage metering for the gateway.

pub mod auth;
pub mod rate_limit;
pub mod service;

pub use auth::{ApiKeyExt, CallerKey};
pub use rate_limit::{
    apply_rate_limit_headers, RATE_LIMIT_LIMIT, RATE_LIMIT_REMAINING, RATE_LIMIT_RESET,
    RETRY_AFTER,
};
pub use service::{ApiMiddleware, GateMode};
