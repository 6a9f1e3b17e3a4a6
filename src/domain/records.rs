//! Plain records for API keys and daily usage

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::credential::KeyDigest;

/// Longest display name accepted for a key
pub const MAX_KEY_NAME_LEN: usize = 100;

/// Stored API key. Holds the digest, never the secret.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub key_digest: KeyDigest,
    pub key_prefix: String,
    pub name: Option<String>,
    /// True at creation; revocation sets it to false for good
    pub is_active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Outward projection of a key: no digest, no secret
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct KeyView {
    pub id: Uuid,
    pub name: Option<String>,
    pub prefix: String,
    pub is_active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&KeyRecord> for KeyView {
    fn from(record: &KeyRecord) -> Self {
        KeyView {
            id: record.id,
            name: record.name.clone(),
            prefix: record.key_prefix.clone(),
            is_active: record.is_active,
            last_used_at: record.last_used_at,
            created_at: record.created_at,
        }
    }
}

impl From<KeyRecord> for KeyView {
    fn from(record: KeyRecord) -> Self {
        KeyView::from(&record)
    }
}

/// One (key, UTC day) counter
#[derive(Debug, Clone, PartialEq)]
pub struct UsageRecord {
    pub api_key_id: Uuid,
    pub usage_date: NaiveDate,
    pub image_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Count for a single day, used by range queries and reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DailyCount {
    pub usage_date: NaiveDate,
    pub image_count: i64,
}

/// Trim a requested display name; blank names are stored as `None`
pub fn normalize_key_name(name: Option<String>) -> Result<Option<String>, String> {
    let Some(name) = name else {
        return Ok(None);
    };

    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_KEY_NAME_LEN {
        return Err(format!("name must be at most {} characters", MAX_KEY_NAME_LEN));
    }

    Ok(Some(trimmed.to_string()))
}
