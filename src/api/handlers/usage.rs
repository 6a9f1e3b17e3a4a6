//! Usage Statistics Handlers
//!
//! Read-only reports over the owner's daily counters.

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::api::error::{ApiError, ErrorResponse};
use crate::api::middleware::CallerKey;
use crate::domain::DailyCount;
use crate::service::reports::{
    KeyUsageReport, UsageSummary, DEFAULT_REPORT_DAYS, MAX_REPORT_DAYS,
};
use crate::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DailyQuery {
    /// Number of UTC days to cover, 1 to 365 (default 30)
    pub days: Option<i64>,
}

impl DailyQuery {
    fn days(&self) -> Result<u32, ApiError> {
        let days = self.days.unwrap_or(i64::from(DEFAULT_REPORT_DAYS));
        u32::try_from(days)
            .ok()
            .filter(|d| (1..=MAX_REPORT_DAYS).contains(d))
            .ok_or_else(|| {
                ApiError::BadRequest(format!("days must be between 1 and {}", MAX_REPORT_DAYS))
            })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DailyUsageResponse {
    pub days: u32,
    pub daily_usage: Vec<DailyCount>,
}

/// Rate status of the calling key for the current UTC day
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TodayUsageResponse {
    pub key_id: Uuid,
    pub tier: String,
    pub limit: i64,
    pub used: i64,
    pub remaining: i64,
    pub reset_at: DateTime<Utc>,
}

/// GET /api/v1/usage/summary - Totals across the owner's keys
#[utoipa::path(
    get,
    path = "/api/v1/usage/summary",
    tag = "usage",
    security(("api_key" = [])),
    responses(
        (status = 200, description = "Usage summary", body = UsageSummary),
        (status = 401, description = "Invalid or missing API key", body = ErrorResponse)
    )
)]
pub async fn get_summary(
    state: web::Data<AppState>,
    caller: CallerKey,
) -> Result<HttpResponse, ApiError> {
    let summary = state.reports.summary(caller.owner_id()).await?;
    Ok(HttpResponse::Ok().json(summary))
}

/// GET /api/v1/usage/daily - Per-day totals, newest first
#[utoipa::path(
    get,
    path = "/api/v1/usage/daily",
    tag = "usage",
    params(DailyQuery),
    security(("api_key" = [])),
    responses(
        (status = 200, description = "Days with usage, newest first", body = DailyUsageResponse),
        (status = 400, description = "days out of range", body = ErrorResponse),
        (status = 401, description = "Invalid or missing API key", body = ErrorResponse)
    )
)]
pub async fn get_daily(
    state: web::Data<AppState>,
    caller: CallerKey,
    query: web::Query<DailyQuery>,
) -> Result<HttpResponse, ApiError> {
    let days = query.days()?;
    let daily_usage = state.reports.daily(caller.owner_id(), days).await?;
    Ok(HttpResponse::Ok().json(DailyUsageResponse { days, daily_usage }))
}

/// GET /api/v1/usage/keys/{id} - Daily history of one key
#[utoipa::path(
    get,
    path = "/api/v1/usage/keys/{id}",
    tag = "usage",
    params(("id" = Uuid, Path, description = "Key id")),
    security(("api_key" = [])),
    responses(
        (status = 200, description = "Key usage", body = KeyUsageReport),
        (status = 401, description = "Invalid or missing API key", body = ErrorResponse),
        (status = 404, description = "No such key for this owner", body = ErrorResponse)
    )
)]
pub async fn get_key_usage(
    state: web::Data<AppState>,
    caller: CallerKey,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    state
        .reports
        .key_usage(caller.owner_id(), path.into_inner())
        .await?
        .map(|report| HttpResponse::Ok().json(report))
        .ok_or_else(|| ApiError::NotFound("API key not found".to_string()))
}

/// GET /api/v1/usage/today - Today's count against the ceiling
#[utoipa::path(
    get,
    path = "/api/v1/usage/today",
    tag = "usage",
    security(("api_key" = [])),
    responses(
        (status = 200, description = "Rate status for the calling key", body = TodayUsageResponse),
        (status = 401, description = "Invalid or missing API key", body = ErrorResponse)
    )
)]
pub async fn get_today(
    state: web::Data<AppState>,
    caller: CallerKey,
) -> Result<HttpResponse, ApiError> {
    let status = state.gate.status_for(caller.record()).await?;

    Ok(HttpResponse::Ok().json(TodayUsageResponse {
        key_id: caller.key_id(),
        remaining: status.remaining(),
        tier: status.tier,
        limit: status.limit,
        used: status.used,
        reset_at: status.reset_at,
    }))
}
