//! API module - HTTP routes and handlers

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;

use actix_web::web;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::error::ApiError;
use crate::api::middleware::ApiMiddleware;
use crate::api::openapi::ApiDoc;

/// Configure all API routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    // Malformed bodies, queries and path ids get the same JSON error shape as everything else
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _| ApiError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _| ApiError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _| ApiError::NotFound(err.to_string()).into()),
    );

    // The gate is attached to the scopes the router matched, never to raw path text
    cfg.service(
        web::scope("/api/v1")
            .service(
                web::scope("/images")
                    .wrap(ApiMiddleware::metered())
                    .route("/generate", web::post().to(handlers::generate::generate_image))
            )
            // API key management endpoints
            .service(
                web::scope("/keys")
                    .wrap(ApiMiddleware::authenticated())
                    .route("", web::post().to(handlers::keys::create_key))
                    .route("", web::get().to(handlers::keys::list_keys))
                    .route("/me", web::get().to(handlers::keys::get_my_key))
                    .route("/{id}", web::delete().to(handlers::keys::revoke_key))
            )
            // Usage statistics endpoints
            .service(
                web::scope("/usage")
                    .wrap(ApiMiddleware::authenticated())
                    .route("/summary", web::get().to(handlers::usage::get_summary))
                    .route("/daily", web::get().to(handlers::usage::get_daily))
                    .route("/today", web::get().to(handlers::usage::get_today))
                    .route("/keys/{id}", web::get().to(handlers::usage::get_key_usage))
            )
            .service(
                web::scope("/admin")
                    .route(
                        "/owners/{owner_id}/keys",
                        web::post().to(handlers::admin::issue_owner_key),
                    )
            )
    )
    .route("/health", web::get().to(handlers::health::health_check))
    // Swagger UI and OpenAPI spec
    .service(
        SwaggerUi::new("/swagger-ui/{_:.*}")
            .url("/api-docs/openapi.json", ApiDoc::openapi())
    );
}
