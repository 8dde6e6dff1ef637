//! Per-view request coordination.
//!
//! A view learns the outcome of its refresh only through the store's change
//! feed, which also carries writes caused by the timer and by other views.
//! [`RequestCoordinator`] decides which of those events settle this view's
//! own outstanding request:
//!
//! - a new `wallpaper` settles it, and is ignored when nothing is pending;
//! - a non-empty `error` settles it and is always displayed;
//! - `wallpaperHistory` is always adopted and never settles anything;
//! - the deadline settles it unconditionally, without cancelling the fetch.
//!
//! The coordinator is a plain state machine. The caller supplies the clock
//! and drives the deadline.

use std::time::Duration;

use tokio::time::Instant;

use skylight_shared::constants::{
    CURRENT_WALLPAPER_KEYS, KEY_ERROR, KEY_HISTORY, KEY_PHOTOGRAPHER, KEY_PHOTO_URL, KEY_WALLPAPER,
    KEY_WALLPAPER_THUMB,
};
use skylight_shared::{CurrentWallpaper, TriggerMessage};
use skylight_store::history::decode_history;
use skylight_store::{StorageChange, Tier};

use crate::display::DisplayState;

#[derive(Debug)]
pub struct RequestCoordinator {
    timeout: Duration,
    pending: bool,
    deadline: Option<Instant>,
    display: DisplayState,
}

impl RequestCoordinator {
    pub fn new(timeout: Duration, initial: DisplayState) -> Self {
        Self {
            timeout,
            pending: false,
            deadline: None,
            display: DisplayState {
                loading: false,
                ..initial
            },
        }
    }

    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Mark a refresh as outstanding and build the message that requests it.
    ///
    /// Requesting again while pending restarts the deadline.
    pub fn begin_request(&mut self, now: Instant, topic: Option<String>) -> TriggerMessage {
        self.pending = true;
        self.deadline = Some(now + self.timeout);
        self.display.loading = true;
        TriggerMessage::UpdateWallpaper { topic_id: topic }
    }

    /// Apply a change-feed event. Returns whether the display changed.
    pub fn on_change(&mut self, change: &StorageChange) -> bool {
        let before = self.display.clone();

        match change.tier {
            Tier::Sync => {
                if self.pending && change.contains(KEY_WALLPAPER) {
                    self.display.wallpaper = self.merged_wallpaper(change);
                    self.settle();
                }

                if let Some(error) = change.new_str(KEY_ERROR) {
                    if error.is_empty() {
                        self.display.error = None;
                    } else {
                        self.display.error = Some(error.to_string());
                        if self.pending {
                            self.settle();
                        }
                    }
                }
            }
            Tier::Local => {
                if let Some(change) = change.changes.get(KEY_HISTORY) {
                    self.display.history = change
                        .new_value
                        .clone()
                        .map(decode_history)
                        .unwrap_or_default();
                }
            }
        }

        self.display != before
    }

    /// Settle the pending request if its deadline has passed. Returns whether
    /// it did.
    pub fn on_timeout(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if self.pending && now >= deadline => {
                self.settle();
                true
            }
            _ => false,
        }
    }

    /// Catch up after missed change events.
    ///
    /// History and error are taken from `stored` as is. A stored wallpaper
    /// that differs from the displayed one settles a pending request, since
    /// the event that carried it was lost.
    pub fn resync(&mut self, stored: DisplayState) {
        self.display.history = stored.history;
        self.display.error = stored.error;
        if self.pending && stored.wallpaper.is_some() && stored.wallpaper != self.display.wallpaper {
            self.display.wallpaper = stored.wallpaper;
            self.settle();
        }
    }

    fn settle(&mut self) {
        self.pending = false;
        self.deadline = None;
        self.display.loading = false;
    }

    /// The displayed wallpaper with every current-record key from `change`
    /// applied on top. Keys the change does not mention keep their value.
    fn merged_wallpaper(&self, change: &StorageChange) -> Option<CurrentWallpaper> {
        let mut current = self.display.wallpaper.clone().unwrap_or_default();
        for key in CURRENT_WALLPAPER_KEYS {
            let Some(value) = change.new_str(key) else {
                continue;
            };
            let slot = match key {
                KEY_WALLPAPER => &mut current.wallpaper,
                KEY_WALLPAPER_THUMB => &mut current.wallpaper_thumb,
                KEY_PHOTOGRAPHER => &mut current.photographer,
                KEY_PHOTO_URL => &mut current.photo_url,
                _ => &mut current.download_url,
            };
            *slot = value.to_string();
        }
        (!current.wallpaper.is_empty()).then_some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use skylight_store::ValueChange;
    use std::collections::BTreeMap;

    const TIMEOUT: Duration = Duration::from_secs(30);

    fn change(tier: Tier, entries: &[(&str, serde_json::Value)]) -> StorageChange {
        let changes: BTreeMap<_, _> = entries
            .iter()
            .map(|(key, value)| {
                (
                    key.to_string(),
                    ValueChange {
                        old_value: None,
                        new_value: Some(value.clone()),
                    },
                )
            })
            .collect();
        StorageChange { tier, changes }
    }

    fn new_wallpaper(url: &str) -> StorageChange {
        change(
            Tier::Sync,
            &[
                (KEY_WALLPAPER, json!(url)),
                (KEY_PHOTOGRAPHER, json!("Someone")),
                (KEY_ERROR, json!("")),
            ],
        )
    }

    fn coordinator() -> RequestCoordinator {
        RequestCoordinator::new(TIMEOUT, DisplayState::default())
    }

    #[test]
    fn test_begin_request_sets_pending_and_deadline() {
        let mut c = coordinator();
        let now = Instant::now();
        let msg = c.begin_request(now, Some("nature".into()));

        assert_eq!(
            msg,
            TriggerMessage::UpdateWallpaper {
                topic_id: Some("nature".into())
            }
        );
        assert!(c.is_pending());
        assert!(c.display().loading);
        assert_eq!(c.deadline(), Some(now + TIMEOUT));
    }

    #[test]
    fn test_own_wallpaper_settles_request() {
        let mut c = coordinator();
        c.begin_request(Instant::now(), None);

        assert!(c.on_change(&new_wallpaper("https://img/a.jpg")));
        assert!(!c.is_pending());
        assert!(c.deadline().is_none());
        let shown = c.display().wallpaper.as_ref().unwrap();
        assert_eq!(shown.wallpaper, "https://img/a.jpg");
        assert_eq!(shown.photographer, "Someone");
        assert!(!c.display().loading);
    }

    #[test]
    fn test_unrequested_wallpaper_is_ignored() {
        let mut c = coordinator();
        c.on_change(&new_wallpaper("https://img/other.jpg"));

        assert!(!c.is_pending());
        assert!(c.display().wallpaper.is_none());
    }

    #[test]
    fn test_partial_change_keeps_unchanged_fields() {
        let mut c = coordinator();
        c.begin_request(Instant::now(), None);
        c.on_change(&new_wallpaper("https://img/a.jpg"));

        c.begin_request(Instant::now(), None);
        c.on_change(&change(Tier::Sync, &[(KEY_WALLPAPER, json!("https://img/b.jpg"))]));

        let shown = c.display().wallpaper.as_ref().unwrap();
        assert_eq!(shown.wallpaper, "https://img/b.jpg");
        assert_eq!(shown.photographer, "Someone");
    }

    #[test]
    fn test_error_is_shown_and_settles_request() {
        let mut c = coordinator();
        c.begin_request(Instant::now(), None);

        c.on_change(&change(Tier::Sync, &[(KEY_ERROR, json!("HTTP error! status: 500"))]));
        assert!(!c.is_pending());
        assert_eq!(c.display().error.as_deref(), Some("HTTP error! status: 500"));

        // The auto-clear hides the message again.
        assert!(c.on_change(&change(Tier::Sync, &[(KEY_ERROR, json!(""))])));
        assert!(c.display().error.is_none());
    }

    #[test]
    fn test_error_is_shown_without_pending_request() {
        let mut c = coordinator();
        c.on_change(&change(Tier::Sync, &[(KEY_ERROR, json!("Network error"))]));
        assert_eq!(c.display().error.as_deref(), Some("Network error"));
    }

    #[test]
    fn test_error_clear_does_not_settle_request() {
        let mut c = coordinator();
        c.begin_request(Instant::now(), None);

        c.on_change(&change(Tier::Sync, &[(KEY_ERROR, json!(""))]));
        assert!(c.is_pending());
    }

    #[test]
    fn test_history_is_adopted_without_settling() {
        let mut c = coordinator();
        c.begin_request(Instant::now(), None);

        let record = json!({
            "id": "h1",
            "wallpaper": "https://img/h1.jpg",
            "photographer": "P",
            "photoUrl": "https://www.unsplash.com/photos/h1",
            "timestamp": 5,
        });
        assert!(c.on_change(&change(Tier::Local, &[(KEY_HISTORY, json!([record]))])));
        assert_eq!(c.display().history.len(), 1);
        assert!(c.is_pending());
    }

    #[test]
    fn test_resync_settles_with_a_newer_stored_wallpaper() {
        let mut c = coordinator();
        c.begin_request(Instant::now(), None);

        let stored = DisplayState {
            wallpaper: Some(CurrentWallpaper {
                wallpaper: "https://img/missed.jpg".into(),
                ..CurrentWallpaper::default()
            }),
            error: Some("stale".into()),
            ..DisplayState::default()
        };
        c.resync(stored);

        assert!(!c.is_pending());
        assert_eq!(c.display().error.as_deref(), Some("stale"));
        assert_eq!(
            c.display().wallpaper.as_ref().unwrap().wallpaper,
            "https://img/missed.jpg"
        );
    }

    #[test]
    fn test_timeout_settles_only_after_deadline() {
        let mut c = coordinator();
        let start = Instant::now();
        c.begin_request(start, None);

        assert!(!c.on_timeout(start + TIMEOUT - Duration::from_millis(1)));
        assert!(c.is_pending());

        assert!(c.on_timeout(start + TIMEOUT));
        assert!(!c.is_pending());
        assert!(!c.display().loading);

        // Nothing pending: a late timer is a no-op.
        assert!(!c.on_timeout(start + TIMEOUT * 2));
    }
}
