//! Admin bootstrap endpoint
//!
//! Lets an operator issue the first key for an owner. Guarded by the
//! configured admin token rather than an API key; with no token configured
//! the route answers as if it did not exist.

use actix_web::{web, HttpResponse};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use super::keys::{issue_key, CreateKeyRequest, CreateKeyResponse};
use crate::api::error::{ApiError, ErrorResponse};
use crate::AppState;

/// Compare two tokens without an early exit on the first differing byte
fn tokens_match(presented: &str, expected: &str) -> bool {
    let a = Sha256::digest(presented.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn authorize(state: &AppState, auth: Option<&BearerAuth>) -> Result<(), ApiError> {
    let expected = &state.settings.admin.token;
    if expected.is_empty() {
        return Err(ApiError::NotFound("Not found".to_string()));
    }

    match auth {
        Some(auth) if tokens_match(auth.token(), expected) => Ok(()),
        _ => {
            warn!("Admin token rejected");
            Err(ApiError::Unauthorized)
        }
    }
}

/// POST /api/v1/admin/owners/{owner_id}/keys - Issue a key for any owner
#[utoipa::path(
    post,
    path = "/api/v1/admin/owners/{owner_id}/keys",
    tag = "admin",
    request_body = CreateKeyRequest,
    params(("owner_id" = Uuid, Path, description = "Owner to issue the key for")),
    security(("admin_token" = [])),
    responses(
        (status = 201, description = "Key created; the secret is shown once", body = CreateKeyResponse),
        (status = 400, description = "Invalid name", body = ErrorResponse),
        (status = 401, description = "Bad admin token", body = ErrorResponse),
        (status = 404, description = "Admin routes disabled", body = ErrorResponse)
    )
)]
pub async fn issue_owner_key(
    state: web::Data<AppState>,
    auth: Option<BearerAuth>,
    path: web::Path<Uuid>,
    body: Option<web::Json<CreateKeyRequest>>,
) -> Result<HttpResponse, ApiError> {
    authorize(&state, auth.as_ref())?;

    let owner_id = path.into_inner();
    info!(owner_id = %owner_id, "Admin issuing API key");
    issue_key(&state, owner_id, body.and_then(|b| b.into_inner().name)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("s3cret", "s3cret"));
        assert!(!tokens_match("s3cret", "s3cre"));
        assert!(!tokens_match("", "s3cret"));
        assert!(!tokens_match("S3CRET", "s3cret"));
    }
}
