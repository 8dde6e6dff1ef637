use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::{
    KEY_DOWNLOAD_URL, KEY_PHOTOGRAPHER, KEY_PHOTO_URL, KEY_WALLPAPER, KEY_WALLPAPER_THUMB,
    TOPIC_ALL,
};

// ---------------------------------------------------------------------------
// WallpaperRecord
// ---------------------------------------------------------------------------

/// Metadata of one acquired photo.
///
/// The serialized shape is the one stored under `wallpaperHistory`, so field
/// names follow the persisted keys rather than the Rust names. Records from
/// older installs may lack a timestamp; they sort as the epoch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WallpaperRecord {
    /// Source photo id, stable across fetches of the same photo.
    pub id: String,
    /// Full-resolution image URL.
    #[serde(rename = "wallpaper")]
    pub full_url: String,
    /// Thumbnail URL.
    #[serde(rename = "thumbnail", default)]
    pub thumb_url: String,
    /// Photographer display name.
    pub photographer: String,
    /// Canonical attribution link to the photo page.
    #[serde(rename = "photoUrl")]
    pub photo_page_url: String,
    /// Tracking endpoint that must be pinged when the photo is downloaded.
    #[serde(rename = "downloadLocation", default)]
    pub download_location: String,
    /// Acquisition instant.
    #[serde(default, with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// CurrentWallpaper
// ---------------------------------------------------------------------------

/// The subset of a record needed to display the current wallpaper.
///
/// Stored as individual keys in the synchronized tier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CurrentWallpaper {
    pub wallpaper: String,
    pub wallpaper_thumb: String,
    pub photographer: String,
    pub photo_url: String,
    pub download_url: String,
}

impl CurrentWallpaper {
    pub fn from_record(record: &WallpaperRecord) -> Self {
        Self {
            wallpaper: record.full_url.clone(),
            wallpaper_thumb: record.thumb_url.clone(),
            photographer: record.photographer.clone(),
            photo_url: record.photo_page_url.clone(),
            download_url: record.download_location.clone(),
        }
    }

    /// Key/value pairs as written to the synchronized tier.
    pub fn to_items(&self) -> Map<String, Value> {
        let mut items = Map::new();
        items.insert(KEY_WALLPAPER.into(), Value::from(self.wallpaper.as_str()));
        items.insert(
            KEY_WALLPAPER_THUMB.into(),
            Value::from(self.wallpaper_thumb.as_str()),
        );
        items.insert(
            KEY_PHOTOGRAPHER.into(),
            Value::from(self.photographer.as_str()),
        );
        items.insert(KEY_PHOTO_URL.into(), Value::from(self.photo_url.as_str()));
        items.insert(
            KEY_DOWNLOAD_URL.into(),
            Value::from(self.download_url.as_str()),
        );
        items
    }

    /// Rebuild from synchronized-tier values. Returns `None` when no
    /// wallpaper URL is present.
    pub fn from_items(items: &Map<String, Value>) -> Option<Self> {
        let text = |key: &str| {
            items
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let wallpaper = text(KEY_WALLPAPER);
        if wallpaper.is_empty() {
            return None;
        }

        Some(Self {
            wallpaper,
            wallpaper_thumb: text(KEY_WALLPAPER_THUMB),
            photographer: text(KEY_PHOTOGRAPHER),
            photo_url: text(KEY_PHOTO_URL),
            download_url: text(KEY_DOWNLOAD_URL),
        })
    }
}

// ---------------------------------------------------------------------------
// Topic
// ---------------------------------------------------------------------------

/// Thematic filter for the remote photo query.
///
/// An empty topic or the `"all"` sentinel means "no filter".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Topic(pub String);

impl Topic {
    pub fn unfiltered() -> Self {
        Self::default()
    }

    pub fn new(topic: impl Into<String>) -> Self {
        Self(topic.into())
    }

    /// Query term sent to the API, or `None` for an unfiltered request.
    ///
    /// Hyphens become spaces: `street-photography` → `street photography`.
    pub fn query_term(&self) -> Option<String> {
        let topic = self.0.trim();
        if topic.is_empty() || topic == TOPIC_ALL {
            return None;
        }
        Some(topic.replace('-', " "))
    }

    pub fn is_unfiltered(&self) -> bool {
        self.query_term().is_none()
    }
}

impl From<Option<String>> for Topic {
    fn from(topic: Option<String>) -> Self {
        Self(topic.unwrap_or_default())
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_unfiltered() {
            write!(f, "{TOPIC_ALL}")
        } else {
            write!(f, "{}", self.0.trim())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record() -> WallpaperRecord {
        WallpaperRecord {
            id: "abc".into(),
            full_url: "https://images.example/full.jpg".into(),
            thumb_url: "https://images.example/thumb.jpg".into(),
            photographer: "Ansel".into(),
            photo_page_url: "https://www.unsplash.com/photos/abc".into(),
            download_location: "https://api.unsplash.com/photos/abc/download".into(),
            timestamp: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
        }
    }

    #[test]
    fn test_unfiltered_topics() {
        assert_eq!(Topic::new("").query_term(), None);
        assert_eq!(Topic::new("all").query_term(), None);
        assert_eq!(Topic::new("  all ").query_term(), None);
        assert!(Topic::from(None).is_unfiltered());
    }

    #[test]
    fn test_topic_hyphens_become_spaces() {
        assert_eq!(
            Topic::new("street-photography").query_term().as_deref(),
            Some("street photography")
        );
        assert_eq!(Topic::new("nature").query_term().as_deref(), Some("nature"));
    }

    #[test]
    fn test_record_uses_persisted_field_names() {
        let json = serde_json::to_value(record()).unwrap();
        assert_eq!(json["wallpaper"], "https://images.example/full.jpg");
        assert_eq!(json["thumbnail"], "https://images.example/thumb.jpg");
        assert_eq!(json["photoUrl"], "https://www.unsplash.com/photos/abc");
        assert_eq!(json["timestamp"], 1_700_000_000_000i64);
    }

    #[test]
    fn test_legacy_record_without_timestamp() {
        let legacy = serde_json::json!({
            "id": "old",
            "wallpaper": "https://images.example/old.jpg",
            "photographer": "Someone",
            "photoUrl": "https://www.unsplash.com/photos/old",
        });
        let parsed: WallpaperRecord = serde_json::from_value(legacy).unwrap();
        assert_eq!(parsed.timestamp.timestamp_millis(), 0);
        assert!(parsed.thumb_url.is_empty());
    }

    #[test]
    fn test_current_wallpaper_items() {
        let current = CurrentWallpaper::from_record(&record());
        let items = current.to_items();
        assert_eq!(items.len(), 5);
        assert_eq!(CurrentWallpaper::from_items(&items), Some(current));
        assert_eq!(CurrentWallpaper::from_items(&Map::new()), None);
    }
}
