//! Read-only usage reports for one owner

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::key_store::KeyStore;
use crate::db::{StoreError, UsageLedger};
use crate::domain::{DailyCount, DailyWindow};

/// Keys listed in the summary's top list
pub const TOP_KEYS: usize = 5;
pub const DEFAULT_REPORT_DAYS: u32 = 30;
pub const MAX_REPORT_DAYS: u32 = 365;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct KeyUsageTotal {
    pub key_id: Uuid,
    pub key_name: Option<String>,
    pub key_prefix: String,
    pub image_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UsageSummary {
    pub total_images: i64,
    pub total_keys: usize,
    pub active_keys: usize,
    pub top_keys: Vec<KeyUsageTotal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct KeyUsageReport {
    pub key_id: Uuid,
    pub key_name: Option<String>,
    pub key_prefix: String,
    pub total_images: i64,
    /// Newest first
    pub daily_usage: Vec<DailyCount>,
}

#[derive(Clone)]
pub struct UsageReports {
    keys: KeyStore,
    ledger: Arc<dyn UsageLedger>,
}

impl UsageReports {
    pub fn new(keys: KeyStore, ledger: Arc<dyn UsageLedger>) -> Self {
        Self { keys, ledger }
    }

    pub async fn summary(&self, owner_id: Uuid) -> Result<UsageSummary, StoreError> {
        let today = DailyWindow::current().day();
        let views = self.keys.list_for_owner(owner_id).await?;

        let mut totals = Vec::with_capacity(views.len());
        for view in &views {
            let created = view.created_at.date_naive().min(today);
            let image_count = self.ledger.sum_for_range(view.id, created, today).await?;
            totals.push(KeyUsageTotal {
                key_id: view.id,
                key_name: view.name.clone(),
                key_prefix: view.prefix.clone(),
                image_count,
            });
        }

        let total_images = totals.iter().map(|t| t.image_count).sum();
        // Records arrive newest first; a stable sort keeps that order among ties
        totals.sort_by(|a, b| b.image_count.cmp(&a.image_count));
        totals.truncate(TOP_KEYS);

        Ok(UsageSummary {
            total_images,
            total_keys: views.len(),
            active_keys: views.iter().filter(|v| v.is_active).count(),
            top_keys: totals,
        })
    }

    /// Totals across all of an owner's keys for the last `days` UTC days,
    /// newest first, days without usage omitted
    pub async fn daily(&self, owner_id: Uuid, days: u32) -> Result<Vec<DailyCount>, StoreError> {
        let today = DailyWindow::current().day();
        let start = today - Duration::days(i64::from(days.max(1)) - 1);

        let mut per_day: BTreeMap<NaiveDate, i64> = BTreeMap::new();
        for view in self.keys.list_for_owner(owner_id).await? {
            for row in self.ledger.list_for_range(view.id, start, today).await? {
                *per_day.entry(row.usage_date).or_default() += row.image_count;
            }
        }

        Ok(per_day
            .into_iter()
            .rev()
            .filter(|(_, count)| *count > 0)
            .map(|(usage_date, image_count)| DailyCount {
                usage_date,
                image_count,
            })
            .collect())
    }

    /// Usage of one key. `None` when the key is unknown or owned by someone else.
    pub async fn key_usage(
        &self,
        owner_id: Uuid,
        key_id: Uuid,
    ) -> Result<Option<KeyUsageReport>, StoreError> {
        let Some(record) = self.keys.find_for_owner(key_id, owner_id).await? else {
            return Ok(None);
        };

        let today = DailyWindow::current().day();
        let created = record.created_at.date_naive().min(today);
        let mut daily_usage = self.ledger.list_for_range(record.id, created, today).await?;
        daily_usage.reverse();

        Ok(Some(KeyUsageReport {
            key_id: record.id,
            total_images: daily_usage.iter().map(|d| d.image_count).sum(),
            key_name: record.name,
            key_prefix: record.key_prefix,
            daily_usage,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::domain::CredentialCodec;
    use std::num::NonZeroU32;

    struct Fixture {
        store: Arc<MemoryStore>,
        keys: KeyStore,
        reports: UsageReports,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let keys = KeyStore::new(store.clone(), CredentialCodec::new("nb_live_"));
        let reports = UsageReports::new(keys.clone(), store.clone());
        Fixture { store, keys, reports }
    }

    fn n(count: u32) -> NonZeroU32 {
        NonZeroU32::new(count).unwrap()
    }

    #[tokio::test]
    async fn test_summary_counts_and_top_keys() {
        let f = fixture();
        let owner = Uuid::new_v4();
        let today = DailyWindow::current().day();

        let mut ids = Vec::new();
        for i in 0..7u32 {
            let issued = f.keys.create(owner, Some(format!("key-{}", i))).await.unwrap();
            if i > 0 {
                f.store.increment(issued.record.id, today, n(i)).await.unwrap();
            }
            ids.push(issued.record.id);
        }
        f.keys.revoke(ids[0], owner).await.unwrap();

        let other = f.keys.create(Uuid::new_v4(), None).await.unwrap();
        f.store.increment(other.record.id, today, n(100)).await.unwrap();

        let summary = f.reports.summary(owner).await.unwrap();
        assert_eq!(summary.total_images, (1..7).sum::<i64>());
        assert_eq!(summary.total_keys, 7);
        assert_eq!(summary.active_keys, 6);
        assert_eq!(summary.top_keys.len(), TOP_KEYS);
        assert_eq!(summary.top_keys[0].image_count, 6);
        assert_eq!(summary.top_keys[0].key_id, ids[6]);
        assert!(summary
            .top_keys
            .windows(2)
            .all(|pair| pair[0].image_count >= pair[1].image_count));
    }

    #[tokio::test]
    async fn test_summary_for_owner_without_keys() {
        let f = fixture();
        let summary = f.reports.summary(Uuid::new_v4()).await.unwrap();
        assert_eq!(summary.total_images, 0);
        assert_eq!(summary.total_keys, 0);
        assert!(summary.top_keys.is_empty());
    }

    #[tokio::test]
    async fn test_daily_merges_keys_newest_first() {
        let f = fixture();
        let owner = Uuid::new_v4();
        let today = DailyWindow::current().day();
        let yesterday = today - Duration::days(1);

        let a = f.keys.create(owner, None).await.unwrap();
        let b = f.keys.create(owner, None).await.unwrap();
        f.store.increment(a.record.id, today, n(2)).await.unwrap();
        f.store.increment(b.record.id, today, n(3)).await.unwrap();
        f.store.increment(a.record.id, yesterday, n(4)).await.unwrap();
        f.store
            .increment(a.record.id, today - Duration::days(40), n(9))
            .await
            .unwrap();

        let daily = f.reports.daily(owner, DEFAULT_REPORT_DAYS).await.unwrap();
        assert_eq!(
            daily,
            vec![
                DailyCount { usage_date: today, image_count: 5 },
                DailyCount { usage_date: yesterday, image_count: 4 },
            ]
        );

        let only_today = f.reports.daily(owner, 1).await.unwrap();
        assert_eq!(only_today.len(), 1);
    }

    #[tokio::test]
    async fn test_key_usage_checks_owner() {
        let f = fixture();
        let owner = Uuid::new_v4();
        let today = DailyWindow::current().day();
        let issued = f.keys.create(owner, Some("prod".to_string())).await.unwrap();
        f.store.increment(issued.record.id, today, n(3)).await.unwrap();

        let report = f.reports.key_usage(owner, issued.record.id).await.unwrap().unwrap();
        assert_eq!(report.total_images, 3);
        assert_eq!(report.key_name.as_deref(), Some("prod"));
        assert_eq!(report.daily_usage, vec![DailyCount { usage_date: today, image_count: 3 }]);

        assert!(f.reports.key_usage(Uuid::new_v4(), issued.record.id).await.unwrap().is_none());
        assert!(f.reports.key_usage(owner, Uuid::new_v4()).await.unwrap().is_none());
    }
}
