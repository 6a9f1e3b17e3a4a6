//! OpenAPI 3.0 specification definition

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::error::ErrorResponse;
use crate::api::handlers::{
    generate::{GenerateRequest, GenerateResponse},
    health::HealthResponse,
    keys::{CreateKeyRequest, CreateKeyResponse, ListKeysResponse},
    usage::{DailyUsageResponse, TodayUsageResponse},
};
use crate::domain::{DailyCount, KeyView};
use crate::providers::{ImageSize, ImageStyle};
use crate::service::reports::{KeyUsageReport, KeyUsageTotal, UsageSummary};

/// Registers the bearer schemes referenced by the paths
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_key",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
        components.add_security_scheme(
            "admin_token",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "NanoBanana API",
        version = "1.0.0",
        description = "Image generation gateway with API-key authentication, daily usage metering and per-tier rate limits",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "/", description = "Current server")
    ),
    tags(
        (name = "system", description = "System health and status endpoints"),
        (name = "images", description = "Metered image generation"),
        (name = "keys", description = "API key management"),
        (name = "usage", description = "Usage reports"),
        (name = "admin", description = "Operator bootstrap endpoints")
    ),
    paths(
        crate::api::handlers::health::health_check,
        crate::api::handlers::generate::generate_image,
        crate::api::handlers::keys::create_key,
        crate::api::handlers::keys::list_keys,
        crate::api::handlers::keys::get_my_key,
        crate::api::handlers::keys::revoke_key,
        crate::api::handlers::usage::get_summary,
        crate::api::handlers::usage::get_daily,
        crate::api::handlers::usage::get_key_usage,
        crate::api::handlers::usage::get_today,
        crate::api::handlers::admin::issue_owner_key,
    ),
    components(
        schemas(
            // System
            HealthResponse,
            ErrorResponse,
            // Images
            GenerateRequest,
            GenerateResponse,
            ImageSize,
            ImageStyle,
            // Keys
            CreateKeyRequest,
            CreateKeyResponse,
            ListKeysResponse,
            KeyView,
            // Usage
            UsageSummary,
            KeyUsageTotal,
            KeyUsageReport,
            DailyCount,
            DailyUsageResponse,
            TodayUsageResponse,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();

        for expected in [
            "/health",
            "/api/v1/images/generate",
            "/api/v1/keys",
            "/api/v1/keys/me",
            "/api/v1/keys/{id}",
            "/api/v1/usage/summary",
            "/api/v1/usage/daily",
            "/api/v1/usage/keys/{id}",
            "/api/v1/usage/today",
            "/api/v1/admin/owners/{owner_id}/keys",
        ] {
            assert!(paths.iter().any(|p| p.as_str() == expected), "missing {}", expected);
        }

        let schemes = &doc.components.as_ref().unwrap().security_schemes;
        assert!(schemes.contains_key("api_key"));
        assert!(schemes.contains_key("admin_token"));
    }
}
