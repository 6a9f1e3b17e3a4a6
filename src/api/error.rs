//! HTTP error mapping
//!
//! Every failure leaves the API as `{"error": <code>, "message": <text>}`.
//! All authentication failures share one body so callers cannot tell a
//! missing, malformed, unknown or revoked key apart.

use actix_web::{
    http::{header, StatusCode},
    HttpResponse, ResponseError,
};
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

use super::middleware::rate_limit::{apply_rate_limit_headers, RETRY_AFTER};
use crate::db::StoreError;
use crate::domain::RateLimitStatus;
use crate::providers::ProviderError;
use crate::service::Rejection;

pub const UNAUTHORIZED_MESSAGE: &str = "Invalid or missing API key";

/// Error body returned by every endpoint
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{}", UNAUTHORIZED_MESSAGE)]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Daily limit of {} images reached", .0.limit)]
    RateLimited(RateLimitStatus),

    #[error("Internal server error")]
    Internal,

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "unauthorized",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::RateLimited(_) => "rate_limit_exceeded",
            ApiError::Internal => "internal_error",
            ApiError::Provider(ProviderError::NotConfigured) => "service_unavailable",
            ApiError::Provider(ProviderError::RateLimited) => "upstream_rate_limited",
            ApiError::Provider(ProviderError::InvalidRequest(_)) => "invalid_request",
            ApiError::Provider(ProviderError::Unavailable) => "upstream_unavailable",
            ApiError::Provider(ProviderError::Failed(_)) => "generation_failed",
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        error!(error = %err, "Storage failure");
        ApiError::Internal
    }
}

impl From<Rejection> for ApiError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::Unauthenticated(_) => ApiError::Unauthorized,
            Rejection::RateExceeded(status) => ApiError::RateLimited(status),
            Rejection::Internal(err) => ApiError::from(err),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Provider(ProviderError::NotConfigured) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Provider(ProviderError::RateLimited) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Provider(ProviderError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
            ApiError::Provider(ProviderError::Unavailable | ProviderError::Failed(_)) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());

        match self {
            ApiError::Unauthorized => {
                builder.insert_header((header::WWW_AUTHENTICATE, "Bearer"));
            }
            ApiError::RateLimited(status) => {
                let retry_after = (status.reset_at - Utc::now()).num_seconds().max(1);
                builder.insert_header((RETRY_AFTER, retry_after.to_string()));
                let mut response = builder.json(serde_json::json!({
                    "error": self.code(),
                    "message": self.to_string(),
                    "tier": status.tier,
                    "limit": status.limit,
                    "remaining": 0,
                    "reset_at": status.reset_at.to_rfc3339(),
                    "retry_after_seconds": retry_after,
                }));
                apply_rate_limit_headers(response.headers_mut(), status.limit, 0, status.reset_at);
                return response;
            }
            _ => {}
        }

        builder.json(ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::AuthFailure;
    use actix_web::body::to_bytes;
    use std::time::Duration;

    async fn body_json(response: HttpResponse) -> serde_json::Value {
        let bytes = to_bytes(response.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[actix_web::test]
    async fn test_auth_failures_are_indistinguishable() {
        let mut bodies = Vec::new();
        for reason in [
            AuthFailure::NoCredential,
            AuthFailure::MalformedCredential,
            AuthFailure::UnknownDigest,
            AuthFailure::Revoked,
        ] {
            let response = ApiError::from(Rejection::Unauthenticated(reason)).error_response();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(response.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");
            bodies.push(body_json(response).await);
        }

        assert!(bodies.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(
            bodies[0],
            serde_json::json!({"error": "unauthorized", "message": UNAUTHORIZED_MESSAGE})
        );
    }

    #[actix_web::test]
    async fn test_rate_limited_carries_reset_metadata() {
        let status = RateLimitStatus {
            tier: "free".to_string(),
            limit: 10,
            used: 10,
            reset_at: Utc::now() + chrono::Duration::hours(2),
        };
        let response = ApiError::RateLimited(status).error_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("X-RateLimit-Limit").unwrap(), "10");
        assert_eq!(response.headers().get("X-RateLimit-Remaining").unwrap(), "0");
        assert!(response.headers().contains_key(RETRY_AFTER));

        let body = body_json(response).await;
        assert_eq!(body["error"], "rate_limit_exceeded");
        assert_eq!(body["limit"], 10);
        assert!(body["retry_after_seconds"].as_i64().unwrap() > 3_000);
    }

    #[test]
    fn test_storage_failure_is_internal() {
        let err = ApiError::from(Rejection::Internal(StoreError::Timeout(Duration::from_secs(1))));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "internal_error");
    }

    #[test]
    fn test_provider_status_mapping() {
        let cases = [
            (ProviderError::NotConfigured, StatusCode::SERVICE_UNAVAILABLE),
            (ProviderError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (ProviderError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST),
            (ProviderError::Unavailable, StatusCode::BAD_GATEWAY),
            (ProviderError::Failed("x".into()), StatusCode::BAD_GATEWAY),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status_code(), expected);
        }
    }
}
