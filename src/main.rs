//! NanoBanana API
//!
//! Image generation gateway using Rust + Actix-Web. Every generation request
//! carries an API key, is checked against the owner's per-tier daily ceiling
//! and is counted only once the image has been produced.

use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;

mod api;
mod config;
mod db;
mod domain;
mod providers;
mod service;

use crate::config::Settings;
use crate::db::{DbPool, KeyRepository, MemoryStore, PgKeyRepository, PgUsageLedger, UsageLedger};
use crate::domain::CredentialCodec;
use crate::providers::{ImageProvider, ImagenProvider};
use crate::service::{KeyStore, RatePolicy, RequestGate, UsageReports};

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Settings,
    pub keys: KeyStore,
    pub gate: RequestGate,
    pub reports: UsageReports,
    pub provider: Arc<dyn ImageProvider>,
    pub db_pool: Option<DbPool>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        repo: Arc<dyn KeyRepository>,
        ledger: Arc<dyn UsageLedger>,
        provider: Arc<dyn ImageProvider>,
        db_pool: Option<DbPool>,
    ) -> Self {
        let codec = CredentialCodec::new(settings.credentials.namespace_tag.clone());
        let keys = KeyStore::new(repo, codec);
        let gate = RequestGate::new(
            keys.clone(),
            ledger.clone(),
            RatePolicy::from_settings(&settings.limits),
        );
        let reports = UsageReports::new(keys.clone(), ledger);

        AppState {
            settings,
            keys,
            gate,
            reports,
            provider,
            db_pool,
        }
    }

    pub fn storage_backend(&self) -> &'static str {
        if self.db_pool.is_some() {
            "postgres"
        } else {
            "memory"
        }
    }
}

/// Pick the storage backend: Postgres when a URL is configured, memory otherwise
async fn open_storage(
    settings: &Settings,
) -> anyhow::Result<(Arc<dyn KeyRepository>, Arc<dyn UsageLedger>, Option<DbPool>)> {
    if settings.database.url.is_empty() {
        warn!("No database URL configured, keys and usage are kept in memory only");
        let store = Arc::new(MemoryStore::new());
        return Ok((store.clone(), store, None));
    }

    let pool = DbPool::new(&settings.database).context("Failed to create database pool")?;
    pool.test_connection()
        .await
        .context("Database connection test failed")?;
    pool.migrate().await.context("Failed to apply database schema")?;
    info!("Database pool initialized successfully");

    Ok((
        Arc::new(PgKeyRepository::new(pool.clone())),
        Arc::new(PgUsageLedger::new(pool.clone())),
        Some(pool),
    ))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing subscriber for structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("nanobanana_api=info,actix_web=info")),
        )
        .json()
        .init();

    // Load configuration
    let settings = Settings::load().context("Failed to load configuration")?;
    let bind_addr = format!("{}:{}", settings.server.host, settings.server.port);

    info!(
        "Starting NanoBanana API v{} on {}",
        env!("CARGO_PKG_VERSION"),
        bind_addr
    );

    let (repo, ledger, db_pool) = open_storage(&settings).await?;

    let provider: Arc<dyn ImageProvider> = Arc::new(
        ImagenProvider::new(&settings.provider).context("Failed to build image provider client")?,
    );
    if !provider.is_configured() {
        warn!("No provider API key configured, generation requests will return 503");
    }

    let workers = settings.server.workers.unwrap_or_else(|| num_cpus::get() * 2);

    // Create shared application state
    let app_state = web::Data::new(AppState::new(settings, repo, ledger, provider, db_pool));
    info!(
        storage = app_state.storage_backend(),
        namespace_tag = %app_state.settings.credentials.namespace_tag,
        "Application state ready"
    );

    // Configure and start HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            // Middleware (order matters); the request gate is attached per scope in api::configure_routes
            .wrap(TracingLogger::default())
            .wrap(middleware::Compress::default())
            .wrap(
                middleware::DefaultHeaders::new()
                    .add(("X-Service", "nanobanana-api"))
                    .add(("X-Version", env!("CARGO_PKG_VERSION"))),
            )
            // Routes
            .configure(api::configure_routes)
    })
    .workers(workers)
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {}", bind_addr))?
    .run()
    .await
    .context("HTTP server error")
}
