//! Bounded, deduplicated wallpaper history kept in the local tier.
//!
//! The list is ordered most recent first and never holds two records with
//! the same `id`. Inserting an id that is already present is a no-op: the
//! existing entry keeps its position.

use serde_json::Value;
use tracing::{debug, warn};

use skylight_shared::constants::{HISTORY_CAPACITY, KEY_HISTORY};
use skylight_shared::WallpaperRecord;

use crate::error::Result;
use crate::store::Store;
use crate::tier::Tier;

/// History view over a [`Store`]. Only the orchestrator writes through it.
#[derive(Clone)]
pub struct HistoryCache {
    store: Store,
    capacity: usize,
}

impl HistoryCache {
    pub fn new(store: Store) -> Self {
        Self::with_capacity(store, HISTORY_CAPACITY)
    }

    pub fn with_capacity(store: Store, capacity: usize) -> Self {
        Self { store, capacity }
    }

    /// Current history, most recent first.
    pub fn load(&self) -> Result<Vec<WallpaperRecord>> {
        let value = self.store.get(Tier::Local, &[KEY_HISTORY])?.remove(KEY_HISTORY);
        Ok(value.map(decode_history).unwrap_or_default())
    }

    /// Prepend `record` unless its id is already present, then trim to
    /// capacity. Returns the resulting history.
    ///
    /// The read and the write happen under the store lock, so concurrent
    /// appends from overlapping refreshes cannot drop each other's records.
    pub fn append(&self, record: WallpaperRecord) -> Result<Vec<WallpaperRecord>> {
        let capacity = self.capacity;
        let id = record.id.clone();

        let (history, inserted) = self.store.update(Tier::Local, KEY_HISTORY, |current| {
            let mut history = current.map(decode_history).unwrap_or_default();
            if !insert_record(&mut history, record, capacity) {
                return (None, (history, false));
            }
            match serde_json::to_value(&history) {
                Ok(encoded) => (Some(encoded), (history, true)),
                Err(e) => {
                    warn!(error = %e, "failed to encode history, leaving it untouched");
                    (None, (history, false))
                }
            }
        })?;

        debug!(id = %id, inserted, len = history.len(), "history append");
        Ok(history)
    }
}

/// Insert `record` at the front unless its id is present. Returns whether
/// the list changed.
pub fn insert_record(
    history: &mut Vec<WallpaperRecord>,
    record: WallpaperRecord,
    capacity: usize,
) -> bool {
    if history.iter().any(|existing| existing.id == record.id) {
        return false;
    }
    history.insert(0, record);
    history.truncate(capacity);
    true
}

/// Merge two histories: entries of `primary` win over same-id entries of
/// `secondary`, the result is sorted newest first and trimmed to `capacity`.
pub fn merge_histories(
    primary: Vec<WallpaperRecord>,
    secondary: Vec<WallpaperRecord>,
    capacity: usize,
) -> Vec<WallpaperRecord> {
    let mut merged = primary;
    for record in secondary {
        if !merged.iter().any(|existing| existing.id == record.id) {
            merged.push(record);
        }
    }
    // Stable: equal timestamps keep their merge order.
    merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    merged.truncate(capacity);
    merged
}

/// Decode a persisted history array, skipping entries that do not parse.
pub fn decode_history(value: Value) -> Vec<WallpaperRecord> {
    let Value::Array(entries) = value else {
        warn!("stored history is not an array, ignoring it");
        return Vec::new();
    };

    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, "skipping unreadable history entry");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::StoreConfig;
    use chrono::{TimeZone, Utc};

    fn record(id: &str, millis: i64) -> WallpaperRecord {
        WallpaperRecord {
            id: id.to_string(),
            full_url: format!("https://images.example/{id}/full.jpg"),
            thumb_url: format!("https://images.example/{id}/thumb.jpg"),
            photographer: "Test".into(),
            photo_page_url: format!("https://www.unsplash.com/photos/{id}"),
            download_location: format!("https://api.unsplash.com/photos/{id}/download"),
            timestamp: Utc.timestamp_millis_opt(millis).unwrap(),
        }
    }

    fn cache() -> HistoryCache {
        HistoryCache::new(Store::open_in_memory(StoreConfig::default()).unwrap())
    }

    fn ids(history: &[WallpaperRecord]) -> Vec<&str> {
        history.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_append_is_idempotent_per_id() {
        let cache = cache();
        let once = cache.append(record("a", 1)).unwrap();
        let twice = cache.append(record("a", 2)).unwrap();

        assert_eq!(once, twice);
        assert_eq!(cache.load().unwrap(), once);
    }

    #[test]
    fn test_duplicate_is_not_reordered() {
        let cache = cache();
        cache.append(record("a", 1)).unwrap();
        cache.append(record("b", 2)).unwrap();
        let history = cache.append(record("a", 3)).unwrap();

        assert_eq!(ids(&history), ["b", "a"]);
    }

    #[test]
    fn test_eviction_keeps_the_newest_twenty() {
        let cache = cache();
        for i in 0..25 {
            cache.append(record(&format!("r{i}"), i)).unwrap();
        }

        let history = cache.load().unwrap();
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history[0].id, "r24");
        assert_eq!(history[19].id, "r5");
        assert!(!history.iter().any(|r| r.id == "r4"));
    }

    #[test]
    fn test_duplicate_append_does_not_notify() {
        let cache = cache();
        cache.append(record("a", 1)).unwrap();

        let mut rx = cache.store.subscribe();
        cache.append(record("a", 1)).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_merge_deduplicates_and_sorts() {
        let a = record("A", 300);
        let b_legacy = record("B", 200);
        let b_local = record("B", 200);
        let c = record("C", 100);

        let merged = merge_histories(vec![b_local, c], vec![a, b_legacy], HISTORY_CAPACITY);
        assert_eq!(ids(&merged), ["A", "B", "C"]);
    }

    #[test]
    fn test_decode_skips_bad_entries() {
        let value = serde_json::json!([
            serde_json::to_value(record("ok", 1)).unwrap(),
            {"nonsense": true},
        ]);
        let history = decode_history(value);
        assert_eq!(ids(&history), ["ok"]);
        assert!(decode_history(serde_json::json!({"not": "an array"})).is_empty());
    }
}
