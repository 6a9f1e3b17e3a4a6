//! Health check endpoint

use actix_web::{web, HttpResponse};
use serde::Serialize;
use utoipa::ToSchema;

use crate::AppState;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// `postgres` or `memory`
    pub storage: &'static str,
    pub storage_reachable: bool,
    pub provider_configured: bool,
}

/// GET /health - Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Storage unreachable", body = HealthResponse)
    )
)]
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let storage_reachable = match &state.db_pool {
        Some(pool) => pool.bounded(pool.test_connection()).await.is_ok(),
        None => true,
    };

    let response = HealthResponse {
        status: if storage_reachable { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        storage: state.storage_backend(),
        storage_reachable,
        provider_configured: state.provider.is_configured(),
    };

    if storage_reachable {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}
