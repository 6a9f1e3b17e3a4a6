//! Image generation endpoint

use actix_web::{web, HttpResponse};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error::{ApiError, ErrorResponse};
use crate::api::middleware::CallerKey;
use crate::providers::{ImageRequest, ImageSize, ImageStyle};
use crate::AppState;

/// Request body for image generation
#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateRequest {
    /// Text prompt, 1 to 2000 characters
    pub prompt: String,
    /// Output size (default 1024x1024)
    #[serde(default)]
    #[schema(value_type = Option<ImageSize>)]
    pub size: Option<String>,
    /// natural (default) or artistic
    #[serde(default)]
    #[schema(value_type = Option<ImageStyle>)]
    pub style: Option<String>,
}

/// Response for a generated image
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GenerateResponse {
    pub id: String,
    /// Inline `data:` URL holding the image
    pub url: String,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
}

/// POST /api/v1/images/generate - Generate an image from a prompt
#[utoipa::path(
    post,
    path = "/api/v1/images/generate",
    tag = "images",
    request_body = GenerateRequest,
    security(("api_key" = [])),
    responses(
        (status = 201, description = "Image generated", body = GenerateResponse),
        (status = 400, description = "Invalid prompt, size or style", body = ErrorResponse),
        (status = 401, description = "Invalid or missing API key", body = ErrorResponse),
        (status = 429, description = "Daily limit or upstream rate limit reached", body = ErrorResponse),
        (status = 502, description = "Upstream failure", body = ErrorResponse),
        (status = 503, description = "Image service not configured", body = ErrorResponse)
    )
)]
pub async fn generate_image(
    state: web::Data<AppState>,
    caller: CallerKey,
    body: web::Json<GenerateRequest>,
) -> Result<HttpResponse, ApiError> {
    let start = Instant::now();
    let body = body.into_inner();

    let request = ImageRequest::new(&body.prompt, body.size.as_deref(), body.style.as_deref())
        .map_err(ApiError::BadRequest)?;

    info!(
        key_id = %caller.key_id(),
        size = %request.size,
        provider = state.provider.code(),
        "Generating image"
    );

    let image = state.provider.generate(&request).await.map_err(|e| {
        error!(key_id = %caller.key_id(), error = %e, "Image generation failed");
        ApiError::from(e)
    })?;

    info!(
        key_id = %caller.key_id(),
        bytes = image.bytes.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Image generated"
    );

    Ok(HttpResponse::Created().json(GenerateResponse {
        id: format!("gen_{}", Uuid::new_v4().simple()),
        url: format!("data:{};base64,{}", image.mime_type, STANDARD.encode(&image.bytes)),
        prompt: request.prompt,
        created_at: Utc::now(),
    }))
}
