//! Caller identity
//!
//! Credentials arrive only as `Authorization: Bearer <key>`. Once the gate
//! accepts a key, the middleware stores [`CallerKey`] in request extensions
//! where handlers pick it up through the extractor below.

use actix_web::{
    dev::{Payload, ServiceRequest},
    http::header::AUTHORIZATION,
    FromRequest, HttpMessage, HttpRequest,
};
use futures::future::{ready, Ready};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::domain::KeyRecord;
use crate::service::bearer_credential;

/// Raw `Authorization` header, if it is valid visible ASCII
pub fn authorization_header(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Bearer token carried by the request
pub fn extract_credential(req: &ServiceRequest) -> Option<String> {
    let header = authorization_header(req)?;
    bearer_credential(Some(&header)).map(str::to_string)
}

/// Authenticated key for the current request
#[derive(Debug, Clone)]
pub struct CallerKey(pub KeyRecord);

impl CallerKey {
    pub fn key_id(&self) -> Uuid {
        self.0.id
    }

    pub fn owner_id(&self) -> Uuid {
        self.0.owner_id
    }

    pub fn record(&self) -> &KeyRecord {
        &self.0
    }
}

/// Extension trait to read the caller off any request
pub trait ApiKeyExt {
    fn caller(&self) -> Option<CallerKey>;
}

impl<T: HttpMessage> ApiKeyExt for T {
    fn caller(&self) -> Option<CallerKey> {
        self.extensions().get::<CallerKey>().cloned()
    }
}

impl FromRequest for CallerKey {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(req.caller().ok_or(ApiError::Unauthorized))
    }
}
