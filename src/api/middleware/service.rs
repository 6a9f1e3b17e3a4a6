//! API Middleware Service
//!
//! Actix-web middleware that puts a router scope behind the request gate.
//! It is attached per scope (`/keys`, `/usage`, `/images`), so it runs only
//! for requests the router has already matched into that scope. Metered
//! scopes also pass the daily rate check and are charged one unit once the
//! handler answers with a 2xx status.

use actix_web::{
    body::{BoxBody, EitherBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage, ResponseError,
};
use futures::future::{ok, LocalBoxFuture, Ready};
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, error, info};

use super::auth::{extract_credential, CallerKey};
use super::rate_limit::apply_rate_limit_headers;
use crate::api::error::ApiError;
use crate::AppState;

/// What the gate enforces on a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
    /// Authenticated only
    Authenticated,
    /// Authenticated, rate checked and charged on success
    Metered,
}

/// Middleware factory for API authentication and rate limiting
pub struct ApiMiddleware {
    mode: GateMode,
}

impl ApiMiddleware {
    pub fn authenticated() -> Self {
        Self { mode: GateMode::Authenticated }
    }

    pub fn metered() -> Self {
        Self { mode: GateMode::Metered }
    }

    pub fn mode(&self) -> GateMode {
        self.mode
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B, BoxBody>>;
    type Error = Error;
    type Transform = ApiMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(ApiMiddlewareService {
            service: Rc::new(service),
            mode: self.mode,
        })
    }
}

/// The actual middleware service
pub struct ApiMiddlewareService<S> {
    service: Rc<S>,
    mode: GateMode,
}

impl<S, B> Service<ServiceRequest> for ApiMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B, BoxBody>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut core::task::Context<'_>,
    ) -> core::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let mode = self.mode;
        let gate = req
            .app_data::<web::Data<AppState>>()
            .map(|state| state.gate.clone());

        Box::pin(async move {
            // Without application state nothing can be checked: refuse
            let Some(gate) = gate else {
                error!(path = %req.path(), "Application state missing, refusing gated request");
                let response = ApiError::Internal.error_response();
                return Ok(req.into_response(response).map_into_right_body());
            };

            let credential = extract_credential(&req);

            if mode == GateMode::Authenticated {
                let key = match gate.authenticate(credential.as_deref()).await {
                    Ok(key) => key,
                    Err(rejection) => {
                        let response = ApiError::from(rejection).error_response();
                        return Ok(req.into_response(response).map_into_right_body());
                    }
                };

                req.extensions_mut().insert(CallerKey(key));
                let res = service.call(req).await?;
                return Ok(res.map_into_left_body());
            }

            let start = Instant::now();
            let admission = match gate.admit(credential.as_deref()).await {
                Ok(admission) => admission,
                Err(rejection) => {
                    let response = ApiError::from(rejection).error_response();
                    return Ok(req.into_response(response).map_into_right_body());
                }
            };

            req.extensions_mut().insert(CallerKey(admission.key.clone()));
            let res = service.call(req).await?;

            let status = res.status();
            let limit = admission.status.limit;
            let reset_at = admission.status.reset_at;

            if !status.is_success() {
                debug!(
                    key_id = %admission.key.id,
                    status = status.as_u16(),
                    "Handler did not succeed; usage not recorded"
                );
                let mut res = res.map_into_left_body();
                apply_rate_limit_headers(
                    res.headers_mut(),
                    limit,
                    admission.status.remaining(),
                    reset_at,
                );
                return Ok(res);
            }

            match gate.settle(&admission).await {
                Ok(used) => {
                    info!(
                        key_id = %admission.key.id,
                        tier = %admission.status.tier,
                        used,
                        limit,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Metered request recorded"
                    );
                    let mut res = res.map_into_left_body();
                    apply_rate_limit_headers(res.headers_mut(), limit, limit - used, reset_at);
                    Ok(res)
                }
                Err(rejection) => {
                    let (http_req, _) = res.into_parts();
                    let response = ApiError::from(rejection).error_response();
                    Ok(ServiceResponse::new(http_req, response).map_into_right_body())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{test, App, HttpResponse};

    #[::core::prelude::v1::test]
    fn test_modes() {
        assert_eq!(ApiMiddleware::authenticated().mode(), GateMode::Authenticated);
        assert_eq!(ApiMiddleware::metered().mode(), GateMode::Metered);
    }

    #[actix_web::test]
    async fn test_missing_state_fails_closed() {
        let app = test::init_service(
            App::new().service(
                web::scope("/gated")
                    .wrap(ApiMiddleware::metered())
                    .route("", web::get().to(|| async { HttpResponse::Ok().finish() })),
            ),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/gated").to_request()).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
