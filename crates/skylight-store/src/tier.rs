use serde::{Deserialize, Serialize};

use skylight_shared::constants::{LOCAL_QUOTA_BYTES, SYNC_QUOTA_BYTES, SYNC_QUOTA_BYTES_PER_ITEM};

/// One of the two storage scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Small, synchronized across devices. Never holds unbounded collections.
    Sync,
    /// Large, device-local.
    Local,
}

impl Tier {
    /// Backing table for this tier.
    pub(crate) fn table(self) -> &'static str {
        match self {
            Tier::Sync => "sync_items",
            Tier::Local => "local_items",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Sync => write!(f, "sync"),
            Tier::Local => write!(f, "local"),
        }
    }
}

/// Capacity ceiling of a tier. Sizes are counted as key length plus the
/// length of the JSON-encoded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierQuota {
    pub total_bytes: usize,
    pub per_item_bytes: Option<usize>,
}

impl TierQuota {
    pub fn sync_default() -> Self {
        Self {
            total_bytes: SYNC_QUOTA_BYTES,
            per_item_bytes: Some(SYNC_QUOTA_BYTES_PER_ITEM),
        }
    }

    pub fn local_default() -> Self {
        Self {
            total_bytes: LOCAL_QUOTA_BYTES,
            per_item_bytes: None,
        }
    }
}

/// Store-wide settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub sync_quota: TierQuota,
    pub local_quota: TierQuota,
    /// Buffered notifications per subscriber before it starts lagging.
    pub feed_capacity: usize,
}

impl StoreConfig {
    pub fn quota(&self, tier: Tier) -> TierQuota {
        match tier {
            Tier::Sync => self.sync_quota,
            Tier::Local => self.local_quota,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sync_quota: TierQuota::sync_default(),
            local_quota: TierQuota::local_default(),
            feed_capacity: 64,
        }
    }
}

/// Bytes an item occupies against its tier's quota.
pub(crate) fn item_size(key: &str, encoded_value: &str) -> usize {
    key.len() + encoded_value.len()
}
