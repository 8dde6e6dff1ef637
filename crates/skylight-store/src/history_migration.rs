//! One-time relocation of the wallpaper history from the synchronized tier
//! to the local tier.
//!
//! Older installs kept `wallpaperHistory` in the synchronized tier, whose
//! small quota the history eventually outgrows. [`HistoryMigrator::run`] is
//! called at every process start and on install/update:
//!
//! ```text
//! NOT_STARTED ──run()──▶ IN_PROGRESS ──local write acked──▶ DONE
//!      ▲                      │
//!      └──── write failed ────┘
//! ```
//!
//! `DONE` is persisted as `_migration_completed = true` in the local tier and
//! is terminal. The in-process latch only stops overlapping runs inside one
//! process; two processes migrating at once converge because the merge is
//! idempotent.

use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Map, Value};
use tracing::{info, warn};

use skylight_shared::constants::{HISTORY_CAPACITY, KEY_HISTORY, KEY_MIGRATION_COMPLETED};

use crate::error::Result;
use crate::history::{decode_history, merge_histories};
use crate::store::Store;
use crate::tier::Tier;

/// What a call to [`HistoryMigrator::run`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The completion flag was already set.
    AlreadyCompleted,
    /// Another run in this process holds the latch.
    InProgress,
    /// No legacy history existed; the flag is now set.
    NothingToMigrate,
    /// Legacy history was merged into the local tier.
    Migrated { records: usize },
}

pub struct HistoryMigrator {
    store: Store,
    capacity: usize,
    running: AtomicBool,
}

/// Releases the latch when dropped, including on early error returns.
struct Latch<'a>(&'a AtomicBool);

impl<'a> Latch<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for Latch<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl HistoryMigrator {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            capacity: HISTORY_CAPACITY,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_completed(&self) -> Result<bool> {
        Ok(self
            .store
            .get_value::<bool>(Tier::Local, KEY_MIGRATION_COMPLETED)?
            .unwrap_or(false))
    }

    /// Run the migration if it has not completed yet.
    ///
    /// On error the completion flag is left unset and the legacy key is kept,
    /// so the next start retries.
    pub fn run(&self) -> Result<MigrationOutcome> {
        if self.is_completed()? {
            return Ok(MigrationOutcome::AlreadyCompleted);
        }

        let Some(_latch) = Latch::acquire(&self.running) else {
            info!("history migration already running, skipping");
            return Ok(MigrationOutcome::InProgress);
        };

        self.migrate()
    }

    /// Body of [`run`](Self::run). Must be called with the latch held.
    fn migrate(&self) -> Result<MigrationOutcome> {
        // Another run may have finished between the first check and the latch.
        if self.is_completed()? {
            return Ok(MigrationOutcome::AlreadyCompleted);
        }

        let legacy = self
            .store
            .get(Tier::Sync, &[KEY_HISTORY])?
            .remove(KEY_HISTORY)
            .map(decode_history)
            .unwrap_or_default();

        if legacy.is_empty() {
            self.store.set(Tier::Local, completed_flag())?;
            info!("no legacy history found, migration marked complete");
            return Ok(MigrationOutcome::NothingToMigrate);
        }

        info!(records = legacy.len(), "migrating legacy history to local storage");

        let local = self
            .store
            .get(Tier::Local, &[KEY_HISTORY])?
            .remove(KEY_HISTORY)
            .map(decode_history)
            .unwrap_or_default();

        let merged = merge_histories(local, legacy, self.capacity);
        let records = merged.len();

        let mut update = completed_flag();
        update.insert(KEY_HISTORY.into(), serde_json::to_value(&merged)?);
        self.store.set(Tier::Local, update)?;

        info!(records, "history migrated to local storage");

        // The local copy is authoritative from here on; a leftover legacy key
        // is harmless and never read again.
        if let Err(e) = self.store.remove(Tier::Sync, &[KEY_HISTORY]) {
            warn!(error = %e, "failed to delete legacy history from sync storage");
        }

        Ok(MigrationOutcome::Migrated { records })
    }
}

fn completed_flag() -> Map<String, Value> {
    let mut items = Map::new();
    items.insert(KEY_MIGRATION_COMPLETED.into(), Value::Bool(true));
    items
}
