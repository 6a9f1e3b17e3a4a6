//! Tier lookup and per-tier daily ceilings

use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::config::LimitSettings;

/// Maps an owner to the name of its plan tier
pub trait TierDirectory: Send + Sync {
    fn tier_for(&self, owner_id: Uuid) -> String;
}

/// Tier assignments read from `limits.owner_tiers`
#[derive(Debug, Clone)]
pub struct ConfiguredTiers {
    default_tier: String,
    owners: HashMap<Uuid, String>,
}

impl ConfiguredTiers {
    pub fn from_settings(limits: &LimitSettings) -> Self {
        let owners = limits
            .owner_tiers
            .iter()
            .filter_map(|(owner, tier)| Uuid::parse_str(owner).ok().map(|id| (id, tier.clone())))
            .collect();

        Self {
            default_tier: limits.default_tier.clone(),
            owners,
        }
    }
}

impl TierDirectory for ConfiguredTiers {
    fn tier_for(&self, owner_id: Uuid) -> String {
        self.owners
            .get(&owner_id)
            .cloned()
            .unwrap_or_else(|| self.default_tier.clone())
    }
}

/// The ceiling that applies to one owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ceiling {
    pub tier: String,
    pub limit: i64,
}

/// Resolves an owner's daily ceiling from its tier
#[derive(Clone)]
pub struct RatePolicy {
    tiers: Arc<dyn TierDirectory>,
    ceilings: HashMap<String, i64>,
    default_tier: String,
}

impl RatePolicy {
    pub fn new(tiers: Arc<dyn TierDirectory>, limits: &LimitSettings) -> Self {
        Self {
            tiers,
            ceilings: limits.tier_ceilings.clone(),
            default_tier: limits.default_tier.clone(),
        }
    }

    pub fn from_settings(limits: &LimitSettings) -> Self {
        Self::new(Arc::new(ConfiguredTiers::from_settings(limits)), limits)
    }

    pub fn ceiling_for(&self, owner_id: Uuid) -> Ceiling {
        let tier = self.tiers.tier_for(owner_id);
        if let Some(limit) = self.ceilings.get(&tier) {
            return Ceiling { tier, limit: *limit };
        }

        warn!(owner_id = %owner_id, tier = %tier, "Unknown tier, using default ceiling");
        Ceiling {
            limit: self.ceilings.get(&self.default_tier).copied().unwrap_or(0),
            tier: self.default_tier.clone(),
        }
    }
}
