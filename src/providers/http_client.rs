//! Rate-limited HTTP client for upstream image APIs
//!
//! Every request waits for a permit from a shared `governor` limiter so the
//! gateway never exceeds the upstream per-minute quota.

use governor::{
    clock::DefaultClock, middleware::NoOpMiddleware, state::InMemoryState, state::NotKeyed, Quota,
    RateLimiter,
};
use nonzero_ext::nonzero;
use reqwest::{Client, RequestBuilder, Response};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::providers::traits::ProviderError;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Rate-limited HTTP client for API requests
#[derive(Clone)]
pub struct RateLimitedClient {
    /// Inner HTTP client
    client: Client,

    /// Shared between clones so they draw from one quota
    limiter: Arc<DirectLimiter>,

    /// Configured rate limit
    rate_limit_per_minute: u32,
}

impl RateLimitedClient {
    /// Create a new rate-limited client
    ///
    /// # Arguments
    /// * `rate_limit_per_minute` - Maximum requests allowed per minute
    /// * `timeout` - Whole-request timeout
    pub fn new(rate_limit_per_minute: u32, timeout: Duration) -> Result<Self, ProviderError> {
        // Ensure at least 1 request per minute
        let rate = NonZeroU32::new(rate_limit_per_minute).unwrap_or(nonzero!(1u32));
        let limiter = RateLimiter::direct(Quota::per_minute(rate));

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("nanobanana-api/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Failed(format!("Failed to create HTTP client: {}", e)))?;

        Ok(RateLimitedClient {
            client,
            limiter: Arc::new(limiter),
            rate_limit_per_minute: rate.get(),
        })
    }

    pub fn rate_limit_per_minute(&self) -> u32 {
        self.rate_limit_per_minute
    }

    /// Build a POST request
    pub fn post(&self, url: &str) -> RateLimitedRequestBuilder<'_> {
        RateLimitedRequestBuilder {
            client: self,
            builder: self.client.post(url),
        }
    }

    /// Wait for rate limit and execute request
    async fn execute(&self, builder: RequestBuilder) -> Result<Response, ProviderError> {
        self.limiter.until_ready().await;

        debug!("Executing rate-limited request");
        Ok(builder.send().await?)
    }
}

/// Request builder wrapper that enforces rate limiting
pub struct RateLimitedRequestBuilder<'a> {
    client: &'a RateLimitedClient,
    builder: RequestBuilder,
}

impl<'a> RateLimitedRequestBuilder<'a> {
    /// Add a header to the request
    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.builder = self.builder.header(key, value);
        self
    }

    /// Add JSON body to the request
    pub fn json<T: serde::Serialize + ?Sized>(mut self, json: &T) -> Self {
        self.builder = self.builder.json(json);
        self
    }

    /// Send the request (waits for rate limit)
    pub async fn send(self) -> Result<Response, ProviderError> {
        self.client.execute(self.builder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_client_creation() {
        let client = RateLimitedClient::new(120, Duration::from_secs(5)).unwrap();
        assert_eq!(client.rate_limit_per_minute(), 120);
    }

    #[test]
    fn test_zero_rate_is_clamped() {
        let client = RateLimitedClient::new(0, Duration::from_secs(5)).unwrap();
        assert_eq!(client.rate_limit_per_minute(), 1);
    }

    #[test]
    fn test_clones_share_limiter() {
        let client = RateLimitedClient::new(1, Duration::from_secs(5)).unwrap();
        let clone = client.clone();

        assert!(client.limiter.check().is_ok());
        assert!(clone.limiter.check().is_err());
    }
}
