use serde::Serialize;
use serde_json::{Map, Value};

use skylight_shared::constants::{KEY_ERROR, KEY_HISTORY};
use skylight_shared::{CurrentWallpaper, WallpaperRecord};
use skylight_store::history::decode_history;

/// Everything a view instance renders. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DisplayState {
    pub wallpaper: Option<CurrentWallpaper>,
    pub error: Option<String>,
    pub history: Vec<WallpaperRecord>,
    /// A refresh requested by this instance is still outstanding.
    pub loading: bool,
}

impl DisplayState {
    /// Build the initial state from what is already persisted.
    pub fn from_stored(sync: &Map<String, Value>, local: &Map<String, Value>) -> Self {
        Self {
            wallpaper: CurrentWallpaper::from_items(sync),
            error: sync
                .get(KEY_ERROR)
                .and_then(Value::as_str)
                .filter(|e| !e.is_empty())
                .map(str::to_string),
            history: local
                .get(KEY_HISTORY)
                .cloned()
                .map(decode_history)
                .unwrap_or_default(),
            loading: false,
        }
    }

    /// File name offered when saving the current wallpaper, derived from the
    /// photo id embedded in its tracking URL.
    pub fn suggested_filename(&self) -> Option<String> {
        let current = self.wallpaper.as_ref()?;
        let id = current
            .download_url
            .split('?')
            .next()
            .unwrap_or_default()
            .trim_end_matches('/')
            .strip_suffix("/download")
            .and_then(|rest| rest.rsplit('/').next())
            .filter(|id| !id.is_empty())
            .unwrap_or("wallpaper");
        Some(format!("unsplash-{id}.jpg"))
    }
}
