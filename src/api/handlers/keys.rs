//! API Key Management Handlers
//!
//! Endpoints for issuing, listing, inspecting and revoking API keys. All of
//! them act on the caller's owner and never on another owner's keys.

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error::{ApiError, ErrorResponse};
use crate::api::middleware::CallerKey;
use crate::domain::records::normalize_key_name;
use crate::domain::KeyView;
use crate::service::{IssuedKey, Revocation};
use crate::AppState;

pub const SECRET_NOTICE: &str =
    "Store this key securely. It will not be shown again.";

/// Request to create a new API key
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateKeyRequest {
    /// Optional display name, at most 100 characters
    #[serde(default)]
    pub name: Option<String>,
}

/// Response after creating a new API key
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateKeyResponse {
    pub id: Uuid,
    /// Full secret. Only returned here.
    pub key: String,
    pub name: Option<String>,
    pub prefix: String,
    pub created_at: DateTime<Utc>,
    pub message: String,
}

impl From<IssuedKey> for CreateKeyResponse {
    fn from(issued: IssuedKey) -> Self {
        CreateKeyResponse {
            id: issued.record.id,
            key: issued.secret.into_inner(),
            name: issued.record.name,
            prefix: issued.record.key_prefix,
            created_at: issued.record.created_at,
            message: SECRET_NOTICE.to_string(),
        }
    }
}

/// List of API keys response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListKeysResponse {
    pub keys: Vec<KeyView>,
    pub count: usize,
}

/// Issue a key and shape the 201 response; shared with the admin route
pub(crate) async fn issue_key(
    state: &AppState,
    owner_id: Uuid,
    name: Option<String>,
) -> Result<HttpResponse, ApiError> {
    let name = normalize_key_name(name).map_err(ApiError::BadRequest)?;
    let issued = state.keys.create(owner_id, name).await?;

    Ok(HttpResponse::Created().json(CreateKeyResponse::from(issued)))
}

/// POST /api/v1/keys - Issue another key for the caller's owner
#[utoipa::path(
    post,
    path = "/api/v1/keys",
    tag = "keys",
    request_body = CreateKeyRequest,
    security(("api_key" = [])),
    responses(
        (status = 201, description = "Key created; the secret is shown once", body = CreateKeyResponse),
        (status = 400, description = "Invalid name", body = ErrorResponse),
        (status = 401, description = "Invalid or missing API key", body = ErrorResponse)
    )
)]
pub async fn create_key(
    state: web::Data<AppState>,
    caller: CallerKey,
    body: Option<web::Json<CreateKeyRequest>>,
) -> Result<HttpResponse, ApiError> {
    let name = body.and_then(|b| b.into_inner().name);
    info!(owner_id = %caller.owner_id(), created_by = %caller.key_id(), "Issuing API key");
    issue_key(&state, caller.owner_id(), name).await
}

/// GET /api/v1/keys - List the owner's keys, newest first
#[utoipa::path(
    get,
    path = "/api/v1/keys",
    tag = "keys",
    security(("api_key" = [])),
    responses(
        (status = 200, description = "Keys owned by the caller's owner", body = ListKeysResponse),
        (status = 401, description = "Invalid or missing API key", body = ErrorResponse)
    )
)]
pub async fn list_keys(
    state: web::Data<AppState>,
    caller: CallerKey,
) -> Result<HttpResponse, ApiError> {
    let keys = state.keys.list_for_owner(caller.owner_id()).await?;
    let count = keys.len();
    Ok(HttpResponse::Ok().json(ListKeysResponse { keys, count }))
}

/// GET /api/v1/keys/me - The key used for this request
#[utoipa::path(
    get,
    path = "/api/v1/keys/me",
    tag = "keys",
    security(("api_key" = [])),
    responses(
        (status = 200, description = "Calling key", body = KeyView),
        (status = 401, description = "Invalid or missing API key", body = ErrorResponse)
    )
)]
pub async fn get_my_key(caller: CallerKey) -> HttpResponse {
    HttpResponse::Ok().json(KeyView::from(caller.record()))
}

/// DELETE /api/v1/keys/{id} - Revoke one of the owner's keys
#[utoipa::path(
    delete,
    path = "/api/v1/keys/{id}",
    tag = "keys",
    params(("id" = Uuid, Path, description = "Key id")),
    security(("api_key" = [])),
    responses(
        (status = 204, description = "Key revoked"),
        (status = 401, description = "Invalid or missing API key", body = ErrorResponse),
        (status = 404, description = "No such key for this owner", body = ErrorResponse)
    )
)]
pub async fn revoke_key(
    state: web::Data<AppState>,
    caller: CallerKey,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let key_id = path.into_inner();

    match state.keys.revoke(key_id, caller.owner_id()).await? {
        Revocation::Revoked => {
            info!(key_id = %key_id, revoked_by = %caller.key_id(), "API key revoked");
            Ok(HttpResponse::NoContent().finish())
        }
        Revocation::NotFound => Err(ApiError::NotFound("API key not found".to_string())),
    }
}
