//! Configuration module for the image generation gateway

use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Main application settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub credentials: CredentialSettings,
    #[serde(default)]
    pub limits: LimitSettings,
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub admin: AdminSettings,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Database configuration for PostgreSQL
///
/// An empty `url` runs the service on the in-memory store.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: Option<u32>,
    /// Upper bound for every storage call, in milliseconds
    pub timeout_ms: u64,
}

impl DatabaseSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }
}

/// Longest namespace tag; the stored prefix (tag + 4 hex) must fit `key_prefix VARCHAR(32)`
pub const MAX_NAMESPACE_TAG_LEN: usize = 24;

/// Shape of issued API keys
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CredentialSettings {
    /// Literal prepended to every issued secret (e.g. `nb_live_`)
    pub namespace_tag: String,
}

/// Per-tier daily ceilings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitSettings {
    pub default_tier: String,
    /// Tier name -> images allowed per UTC day
    pub tier_ceilings: HashMap<String, i64>,
    /// Owner id -> tier name. Owners not listed get `default_tier`.
    pub owner_tiers: HashMap<String, String>,
}

/// Upstream image generation API
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub requests_per_minute: u32,
    pub timeout_secs: u64,
}

/// Bootstrap issuance for owners that hold no key yet
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdminSettings {
    /// Bearer token for `/api/v1/admin`. Empty disables the admin routes.
    pub token: String,
}

impl Settings {
    /// Load configuration from files and environment variables
    ///
    /// Configuration priority (highest to lowest):
    /// 1. Environment variables (prefixed with NANOBANANA_)
    /// 2. config/local.toml (gitignored)
    /// 3. config/default.toml
    pub fn load() -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"));

        let builder = Config::builder()
            // Start with default configuration
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local overrides (gitignored)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Add environment variables (NANOBANANA_SERVER__PORT, etc.)
            .add_source(
                Environment::with_prefix("NANOBANANA")
                    .separator("__")
                    .try_parsing(true)
            );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject configurations the gate cannot enforce consistently
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tag = &self.credentials.namespace_tag;
        if tag.is_empty() {
            return Err(ConfigError::Message("credentials.namespace_tag must not be empty".into()));
        }
        if tag.len() > MAX_NAMESPACE_TAG_LEN {
            return Err(ConfigError::Message(format!(
                "credentials.namespace_tag must be at most {} characters",
                MAX_NAMESPACE_TAG_LEN
            )));
        }
        if !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(ConfigError::Message(format!(
                "credentials.namespace_tag '{}' may only contain [A-Za-z0-9_-]",
                tag
            )));
        }

        if let Some((tier, ceiling)) = self.limits.tier_ceilings.iter().find(|(_, c)| **c < 0) {
            return Err(ConfigError::Message(format!(
                "limits.tier_ceilings.{} is negative ({})",
                tier, ceiling
            )));
        }

        if !self.limits.tier_ceilings.contains_key(&self.limits.default_tier) {
            return Err(ConfigError::Message(format!(
                "limits.default_tier '{}' has no entry in limits.tier_ceilings",
                self.limits.default_tier
            )));
        }

        for (owner, tier) in &self.limits.owner_tiers {
            if Uuid::parse_str(owner).is_err() {
                return Err(ConfigError::Message(format!(
                    "limits.owner_tiers key '{}' is not a UUID",
                    owner
                )));
            }
            if !self.limits.tier_ceilings.contains_key(tier) {
                return Err(ConfigError::Message(format!(
                    "limits.owner_tiers.{} names unknown tier '{}'",
                    owner, tier
                )));
            }
        }

        Ok(())
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: None,
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            url: String::new(),
            max_connections: Some(10),
            timeout_ms: 5_000,
        }
    }
}

impl Default for CredentialSettings {
    fn default() -> Self {
        CredentialSettings {
            namespace_tag: "nb_live_".to_string(),
        }
    }
}

impl Default for LimitSettings {
    fn default() -> Self {
        let tier_ceilings = [("free", 10), ("starter", 100), ("pro", 1_000), ("enterprise", 10_000)]
            .into_iter()
            .map(|(tier, ceiling)| (tier.to_string(), ceiling))
            .collect();

        LimitSettings {
            default_tier: "free".to_string(),
            tier_ceilings,
            owner_tiers: HashMap::new(),
        }
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        ProviderSettings {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "imagen-3.0-generate-002".to_string(),
            requests_per_minute: 60,
            timeout_secs: 60,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            server: ServerSettings::default(),
            database: DatabaseSettings::default(),
            credentials: CredentialSettings::default(),
            limits: LimitSettings::default(),
            provider: ProviderSettings::default(),
            admin: AdminSettings::default(),
        }
    }
}
