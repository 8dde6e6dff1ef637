/// Application name
pub const APP_NAME: &str = "Skylight";

/// Maximum number of records kept in the wallpaper history
pub const HISTORY_CAPACITY: usize = 20;

/// Name of the recurring refresh timer
pub const ALARM_NAME: &str = "changeWallpaper";

/// Default refresh period in minutes
pub const REFRESH_PERIOD_MINUTES: u64 = 30;

/// How long a fetch failure stays in the `error` key before it is cleared (ms)
pub const FETCH_ERROR_CLEAR_MS: u64 = 3_000;

/// How long a save failure stays in the `error` key before it is cleared (ms)
pub const SAVE_ERROR_CLEAR_MS: u64 = 1_000;

/// How long a view waits for its own refresh before giving up (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Synchronized tier: total capacity in bytes
pub const SYNC_QUOTA_BYTES: usize = 102_400;

/// Synchronized tier: capacity of a single item in bytes
pub const SYNC_QUOTA_BYTES_PER_ITEM: usize = 8_192;

/// Local tier: total capacity in bytes (10 MiB)
pub const LOCAL_QUOTA_BYTES: usize = 10 * 1024 * 1024;

/// Unsplash API
pub const UNSPLASH_API_BASE: &str = "https://api.unsplash.com";
pub const RANDOM_PHOTO_PATH: &str = "/photos/random";
pub const ORIENTATION_LANDSCAPE: &str = "landscape";

/// Attribution links are rewritten from the bare host to the `www` host
pub const ATTRIBUTION_HOST: &str = "https://unsplash.com";
pub const CANONICAL_ATTRIBUTION_HOST: &str = "https://www.unsplash.com";

/// Topic sentinel meaning "no filter"
pub const TOPIC_ALL: &str = "all";

// ---------------------------------------------------------------------------
// Persisted keys
// ---------------------------------------------------------------------------

/// Synchronized tier
pub const KEY_WALLPAPER: &str = "wallpaper";
pub const KEY_WALLPAPER_THUMB: &str = "wallpaperThumb";
pub const KEY_PHOTOGRAPHER: &str = "photographer";
pub const KEY_PHOTO_URL: &str = "photoUrl";
pub const KEY_DOWNLOAD_URL: &str = "downloadUrl";
pub const KEY_ERROR: &str = "error";
pub const KEY_TOPIC: &str = "wallpaperTopic";

/// History key. Lives in the local tier; older installs kept it in the
/// synchronized tier.
pub const KEY_HISTORY: &str = "wallpaperHistory";

/// Local tier bookkeeping
pub const KEY_MIGRATION_COMPLETED: &str = "_migration_completed";
pub const KEY_INSTALLED_VERSION: &str = "_installed_version";
pub const KEY_ALARM_PAUSED: &str = "_alarm_paused";

/// Every synchronized key that makes up the current wallpaper
pub const CURRENT_WALLPAPER_KEYS: [&str; 5] = [
    KEY_WALLPAPER,
    KEY_WALLPAPER_THUMB,
    KEY_PHOTOGRAPHER,
    KEY_PHOTO_URL,
    KEY_DOWNLOAD_URL,
];
