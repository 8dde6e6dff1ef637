//! The dual-tier key/value store shared by the orchestrator and every view
//! instance.
//!
//! Each `set`/`remove` is atomic over its key set. Every committed write is
//! published on a broadcast change feed while the database lock is still
//! held, so subscribers observe notifications in commit order. A subscriber
//! that falls behind loses intermediate notifications (it sees
//! `RecvError::Lagged`), but the latest value of every key can always be
//! re-read with [`Store::get`].

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use crate::changes::{self, StorageChange};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::tier::{item_size, StoreConfig, Tier};

/// Cheaply cloneable handle to the shared store.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

struct Inner {
    db: Mutex<Database>,
    config: StoreConfig,
    feed: broadcast::Sender<StorageChange>,
}

impl Store {
    pub fn new(db: Database, config: StoreConfig) -> Self {
        let (feed, _) = broadcast::channel(config.feed_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                db: Mutex::new(db),
                config,
                feed,
            }),
        }
    }

    pub fn open_at(path: &Path, config: StoreConfig) -> Result<Self> {
        Ok(Self::new(Database::open_at(path)?, config))
    }

    pub fn open_in_memory(config: StoreConfig) -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?, config))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Register a new listener on the change feed.
    pub fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.inner.feed.subscribe()
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Values of `keys` in `tier`. Missing keys are absent from the map.
    pub fn get(&self, tier: Tier, keys: &[&str]) -> Result<Map<String, Value>> {
        let raw = self.lock()?.read_raw(tier, keys)?;
        let mut values = Map::new();
        for (key, encoded) in raw {
            values.insert(key, serde_json::from_str(&encoded)?);
        }
        Ok(values)
    }

    /// Single value decoded into `T`.
    pub fn get_value<T: DeserializeOwned>(&self, tier: Tier, key: &str) -> Result<Option<T>> {
        match self.get(tier, &[key])?.remove(key) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub fn bytes_in_use(&self, tier: Tier) -> Result<usize> {
        self.lock()?.bytes_in_use(tier)
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Write every item of `items` into `tier`, or none of them.
    ///
    /// Fails with a quota error when an item or the resulting tier would
    /// exceed the configured capacity.
    pub fn set(&self, tier: Tier, items: Map<String, Value>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let mut db = self.lock()?;
        self.set_locked(&mut db, tier, items.into_iter().collect())
    }

    /// Remove `keys` from `tier`. Removing a missing key is not an error.
    pub fn remove(&self, tier: Tier, keys: &[&str]) -> Result<()> {
        let mut db = self.lock()?;

        let mut removed = BTreeMap::new();
        for (key, encoded) in db.read_raw(tier, keys)? {
            removed.insert(key, decode_lossy(&encoded));
        }
        if removed.is_empty() {
            return Ok(());
        }

        db.delete_raw(tier, keys)?;
        self.publish(changes::removal(tier, removed));
        Ok(())
    }

    /// Read `key`, let `apply` compute a replacement, and write it back
    /// without any other writer interleaving.
    ///
    /// `apply` returns `(Some(new_value), output)` to write or
    /// `(None, output)` to leave the key untouched.
    pub fn update<T, F>(&self, tier: Tier, key: &str, apply: F) -> Result<T>
    where
        F: FnOnce(Option<Value>) -> (Option<Value>, T),
    {
        let mut db = self.lock()?;

        let current = match db.read_raw(tier, &[key])?.remove(key) {
            Some(encoded) => Some(serde_json::from_str(&encoded)?),
            None => None,
        };

        let (replacement, output) = apply(current);
        if let Some(value) = replacement {
            self.set_locked(&mut db, tier, BTreeMap::from([(key.to_string(), value)]))?;
        }
        Ok(output)
    }

    fn set_locked(
        &self,
        db: &mut MutexGuard<'_, Database>,
        tier: Tier,
        items: BTreeMap<String, Value>,
    ) -> Result<()> {
        let quota = self.inner.config.quota(tier);

        let mut encoded = Vec::with_capacity(items.len());
        let mut added = 0;
        for (key, value) in &items {
            let json = serde_json::to_string(value)?;
            let size = item_size(key, &json);
            if let Some(max) = quota.per_item_bytes {
                if size > max {
                    return Err(StoreError::ItemQuotaExceeded {
                        tier,
                        key: key.clone(),
                        size,
                        quota: max,
                    });
                }
            }
            added += size;
            encoded.push((key.clone(), json));
        }

        let keys: Vec<&str> = items.keys().map(String::as_str).collect();
        let previous = db.read_raw(tier, &keys)?;
        let freed: usize = previous.iter().map(|(k, v)| item_size(k, v)).sum();
        let requested = db.bytes_in_use(tier)?.saturating_sub(freed) + added;
        if requested > quota.total_bytes {
            return Err(StoreError::QuotaExceeded {
                tier,
                requested,
                quota: quota.total_bytes,
            });
        }

        db.write_raw(tier, &encoded)?;

        let old: BTreeMap<String, Value> = previous
            .into_iter()
            .map(|(key, encoded)| (key, decode_lossy(&encoded)))
            .collect();
        self.publish(changes::diff(tier, &old, &items));
        Ok(())
    }

    fn publish(&self, change: StorageChange) {
        if change.is_empty() {
            return;
        }
        tracing::trace!(tier = %change.tier, keys = ?change.changes.keys().collect::<Vec<_>>(), "storage changed");
        // No subscribers is fine.
        let _ = self.inner.feed.send(change);
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>> {
        self.inner.db.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

fn decode_lossy(encoded: &str) -> Value {
    serde_json::from_str(encoded).unwrap_or_else(|_| Value::String(encoded.to_string()))
}
