//! Rate limit response headers
//!
//! Limits are fixed UTC-day buckets; `X-RateLimit-Reset` is the Unix time of
//! the next UTC midnight.

use actix_web::http::header::{HeaderMap, HeaderName, HeaderValue};
use chrono::{DateTime, Utc};

/// Rate limit headers
pub const RATE_LIMIT_LIMIT: &str = "X-RateLimit-Limit";
pub const RATE_LIMIT_REMAINING: &str = "X-RateLimit-Remaining";
pub const RATE_LIMIT_RESET: &str = "X-RateLimit-Reset";
pub const RETRY_AFTER: &str = "Retry-After";

/// Write the three `X-RateLimit-*` headers
pub fn apply_rate_limit_headers(
    headers: &mut HeaderMap,
    limit: i64,
    remaining: i64,
    reset_at: DateTime<Utc>,
) {
    // X-RateLimit-Limit: images allowed per UTC day
    headers.insert(HeaderName::from_static("x-ratelimit-limit"), HeaderValue::from(limit));

    // X-RateLimit-Remaining: images left today
    headers.insert(
        HeaderName::from_static("x-ratelimit-remaining"),
        HeaderValue::from(remaining.max(0)),
    );

    // X-RateLimit-Reset: Unix timestamp when the day rolls over
    headers.insert(
        HeaderName::from_static("x-ratelimit-reset"),
        HeaderValue::from(reset_at.timestamp()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_headers_written() {
        let mut headers = HeaderMap::new();
        let reset_at = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        apply_rate_limit_headers(&mut headers, 100, -3, reset_at);

        assert_eq!(headers.get(RATE_LIMIT_LIMIT).unwrap(), "100");
        assert_eq!(headers.get(RATE_LIMIT_REMAINING).unwrap(), "0");
        assert_eq!(
            headers.get(RATE_LIMIT_RESET).unwrap(),
            reset_at.timestamp().to_string().as_str()
        );
    }
}
