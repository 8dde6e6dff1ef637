//! One refresh cycle: `IDLE → FETCHING → {COMMITTING, FAILED} → IDLE`.
//!
//! Overlapping cycles are not serialized. Each one commits on its own
//! completion, so the synchronized tier ends up with whichever finished last.
//! The history stays consistent because [`HistoryCache::append`] is an
//! atomic, id-deduplicated read-modify-write.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use skylight_net::PhotoSource;
use skylight_shared::constants::{KEY_ERROR, KEY_TOPIC};
use skylight_shared::{CurrentWallpaper, Topic, WallpaperRecord};
use skylight_store::{HistoryCache, Store, Tier};

use crate::error::RefreshError;

/// How long each kind of failure stays visible in `error`.
#[derive(Debug, Clone, Copy)]
pub struct ErrorTiming {
    pub fetch_error_clear: Duration,
    pub save_error_clear: Duration,
}

pub struct Orchestrator<S> {
    source: S,
    store: Store,
    history: HistoryCache,
    timing: ErrorTiming,
    /// Bumped on every published error; a pending clear only fires if no
    /// later error was published after it.
    error_generation: Arc<AtomicU64>,
}

impl<S: PhotoSource> Orchestrator<S> {
    pub fn new(source: S, store: Store, timing: ErrorTiming) -> Self {
        Self {
            source,
            history: HistoryCache::new(store.clone()),
            store,
            timing,
            error_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    #[cfg(test)]
    pub(crate) fn source(&self) -> &S {
        &self.source
    }

    /// The configured topic, or "no filter" when none is stored.
    pub fn stored_topic(&self) -> Result<Topic, RefreshError> {
        let topic: Option<String> = self
            .store
            .get_value(Tier::Sync, KEY_TOPIC)
            .map_err(RefreshError::StorageRead)?;
        Ok(Topic::from(topic))
    }

    /// Run one refresh cycle.
    ///
    /// Failures are published to `error` and cleared again after a delay;
    /// the returned error is for logging only.
    pub async fn refresh(&self, topic_override: Option<String>) -> Result<WallpaperRecord, RefreshError> {
        let topic = match topic_override {
            Some(topic) => Topic::new(topic),
            None => match self.stored_topic() {
                Ok(topic) => topic,
                Err(e) => {
                    self.publish_error(&e, self.timing.fetch_error_clear);
                    return Err(e);
                }
            },
        };

        debug!(topic = %topic, "refresh started");

        let record = match self.source.fetch_wallpaper(&topic).await {
            Ok(record) => record,
            Err(e) => {
                let e = RefreshError::from(e);
                error!(topic = %topic, error = %e, "failed to fetch wallpaper");
                self.publish_error(&e, self.timing.fetch_error_clear);
                return Err(e);
            }
        };

        self.commit(&record)?;
        Ok(record)
    }

    /// Persist a fetched record: history in the local tier, then the current
    /// wallpaper plus a cleared `error` in the synchronized tier.
    ///
    /// The two writes are independent. A history failure does not stop the
    /// current wallpaper from being written, but it is still published.
    fn commit(&self, record: &WallpaperRecord) -> Result<(), RefreshError> {
        let history_result = self.history.append(record.clone());
        if let Err(e) = &history_result {
            error!(id = %record.id, error = %e, "failed to save history");
        }

        let mut items = CurrentWallpaper::from_record(record).to_items();
        items.insert(KEY_ERROR.into(), Value::from(""));

        if let Err(e) = self.store.set(Tier::Sync, items) {
            let quota = e.is_quota();
            let e = RefreshError::StorageWrite(e);
            error!(id = %record.id, quota, error = %e, "failed to save current wallpaper");
            self.publish_error(&e, self.timing.save_error_clear);
            return Err(e);
        }

        if let Err(e) = history_result {
            let e = RefreshError::StorageWrite(e);
            self.publish_error(&e, self.timing.save_error_clear);
            return Err(e);
        }

        self.log_usage();
        info!(id = %record.id, photographer = %record.photographer, "wallpaper updated");
        Ok(())
    }

    fn log_usage(&self) {
        let quota = self.store.config().sync_quota.total_bytes;
        match self.store.bytes_in_use(Tier::Sync) {
            Ok(used) => {
                let percent = if quota == 0 {
                    0.0
                } else {
                    used as f64 / quota as f64 * 100.0
                };
                info!(used, quota, percent = %format!("{percent:.2}"), "sync storage usage");
            }
            Err(e) => warn!(error = %e, "failed to read sync storage usage"),
        }
    }

    /// Write `err` to `error` and schedule clearing it after `clear_after`.
    ///
    /// The clear only fires if no other error was published in between, so
    /// a later failure keeps its own full display time even when its message
    /// is identical.
    fn publish_error(&self, err: &RefreshError, clear_after: Duration) {
        let message = err.to_string();
        let generation = self.error_generation.fetch_add(1, Ordering::SeqCst) + 1;

        let mut items = serde_json::Map::new();
        items.insert(KEY_ERROR.into(), Value::from(message.as_str()));
        if let Err(e) = self.store.set(Tier::Sync, items) {
            error!(error = %e, "failed to save error message");
            return;
        }

        let store = self.store.clone();
        let latest = Arc::clone(&self.error_generation);
        tokio::spawn(async move {
            tokio::time::sleep(clear_after).await;
            if latest.load(Ordering::SeqCst) != generation {
                debug!("error message superseded, not clearing");
                return;
            }
            let cleared = store.update(Tier::Sync, KEY_ERROR, |current| {
                if current.as_ref().and_then(Value::as_str) == Some(message.as_str()) {
                    (Some(Value::from("")), true)
                } else {
                    (None, false)
                }
            });
            match cleared {
                Ok(true) => debug!("error message cleared"),
                Ok(false) => {}
                Err(e) => warn!(error = %e, "failed to clear error message"),
            }
        });
    }
}
