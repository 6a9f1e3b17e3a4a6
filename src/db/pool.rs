//! Database connection pool management

use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_postgres::error::SqlState;
use tokio_postgres::NoTls;
use tracing::info;

use super::store::StoreError;
use crate::config::DatabaseSettings;

const SCHEMA: &str = include_str!("../../migrations/0001_api_keys_and_usage.sql");

/// Database-related errors
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::CreatePoolError),
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),
    #[error("Pool get error: {0}")]
    PoolGet(#[from] deadpool_postgres::PoolError),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    fn sql_state(&self) -> Option<&SqlState> {
        match self {
            DbError::Query(e) => e.code(),
            _ => None,
        }
    }
}

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    pool: Pool,
    timeout: Duration,
}

impl DbPool {
    /// Create a new database pool from the database settings
    pub fn new(settings: &DatabaseSettings) -> Result<Self, DbError> {
        let url = url::Url::parse(&settings.url)
            .map_err(|e| DbError::Config(format!("Invalid database URL: {}", e)))?;

        let host = url
            .host_str()
            .ok_or_else(|| DbError::Config("Missing host in database URL".to_string()))?;
        let port = url.port().unwrap_or(5432);
        let user = url.username();
        let password = url.password().unwrap_or("");
        let dbname = url.path().trim_start_matches('/');

        let mut cfg = Config::new();
        cfg.host = Some(host.to_string());
        cfg.port = Some(port);
        cfg.user = Some(user.to_string());
        cfg.password = Some(password.to_string());
        cfg.dbname = Some(dbname.to_string());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        if let Some(max) = settings.max_connections {
            cfg.pool = Some(PoolConfig::new(max as usize));
        }

        let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;

        info!(
            host = %host,
            port = %port,
            dbname = %dbname,
            timeout_ms = settings.timeout().as_millis() as u64,
            "Database pool created"
        );

        Ok(DbPool {
            pool,
            timeout: settings.timeout(),
        })
    }

    /// Get a connection from the pool
    pub async fn get(&self) -> Result<deadpool_postgres::Object, DbError> {
        Ok(self.pool.get().await?)
    }

    /// Upper bound applied to every storage call
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Test the database connection
    pub async fn test_connection(&self) -> Result<(), DbError> {
        let client = self.get().await?;
        client.query_one("SELECT 1", &[]).await?;
        info!("Database connection test successful");
        Ok(())
    }

    /// Create the key and usage tables if they do not exist yet
    pub async fn migrate(&self) -> Result<(), DbError> {
        let client = self.get().await?;
        client.batch_execute(SCHEMA).await?;
        info!("Database schema is up to date");
        Ok(())
    }

    /// Run a storage call under the pool's timeout
    pub async fn bounded<T, E, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<StoreError>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }
}

/// True when the error is a unique constraint violation
pub fn is_unique_violation(err: &DbError) -> bool {
    err.sql_state() == Some(&SqlState::UNIQUE_VIOLATION)
}

/// True when the error is a foreign key violation
pub fn is_foreign_key_violation(err: &DbError) -> bool {
    err.sql_state() == Some(&SqlState::FOREIGN_KEY_VIOLATION)
}
