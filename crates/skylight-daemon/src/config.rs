//! Daemon configuration loaded from environment variables.
//!
//! Every setting has a default so the daemon starts with zero configuration;
//! only real fetches need an access key.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::UserDirs;

use skylight_shared::constants::{
    FETCH_ERROR_CLEAR_MS, REFRESH_PERIOD_MINUTES, REQUEST_TIMEOUT_SECS, SAVE_ERROR_CLEAR_MS,
    UNSPLASH_API_BASE,
};

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Unsplash API access key.
    /// Env: `UNSPLASH_ACCESS_KEY`
    pub access_key: String,

    /// Base URL of the photo API.
    /// Env: `UNSPLASH_API_BASE`
    /// Default: `https://api.unsplash.com`
    pub api_base: String,

    /// Database file. `None` means the platform data directory.
    /// Env: `SKYLIGHT_DB_PATH`
    pub db_path: Option<PathBuf>,

    /// Where downloaded wallpapers are saved.
    /// Env: `SKYLIGHT_DOWNLOAD_DIR`
    /// Default: the user's download directory, else `./downloads`
    pub download_dir: PathBuf,

    /// Period of the recurring refresh.
    /// Env: `REFRESH_INTERVAL_MINUTES`
    /// Default: 30
    pub refresh_interval: Duration,

    /// How long a fetch error stays displayed.
    /// Env: `FETCH_ERROR_CLEAR_MS`
    /// Default: 3000
    pub fetch_error_clear: Duration,

    /// How long a save error stays displayed.
    /// Env: `SAVE_ERROR_CLEAR_MS`
    /// Default: 1000
    pub save_error_clear: Duration,

    /// Timeout of every outbound HTTP request.
    /// Env: `HTTP_TIMEOUT_SECS`
    /// Default: 30
    pub http_timeout: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            access_key: String::new(),
            api_base: UNSPLASH_API_BASE.to_string(),
            db_path: None,
            download_dir: default_download_dir(),
            refresh_interval: Duration::from_secs(REFRESH_PERIOD_MINUTES * 60),
            fetch_error_clear: Duration::from_millis(FETCH_ERROR_CLEAR_MS),
            save_error_clear: Duration::from_millis(SAVE_ERROR_CLEAR_MS),
            http_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        match lookup("UNSPLASH_ACCESS_KEY") {
            Some(key) if !key.trim().is_empty() => config.access_key = key.trim().to_string(),
            _ => tracing::warn!("UNSPLASH_ACCESS_KEY is not set, photo requests will be rejected"),
        }

        if let Some(base) = lookup("UNSPLASH_API_BASE").filter(|b| !b.is_empty()) {
            config.api_base = base;
        }

        if let Some(path) = lookup("SKYLIGHT_DB_PATH").filter(|p| !p.is_empty()) {
            config.db_path = Some(PathBuf::from(path));
        }

        if let Some(dir) = lookup("SKYLIGHT_DOWNLOAD_DIR").filter(|d| !d.is_empty()) {
            config.download_dir = PathBuf::from(dir);
        }

        if let Some(minutes) = parse_positive(&lookup, "REFRESH_INTERVAL_MINUTES") {
            config.refresh_interval = Duration::from_secs(minutes * 60);
        }

        if let Some(ms) = parse_positive(&lookup, "FETCH_ERROR_CLEAR_MS") {
            config.fetch_error_clear = Duration::from_millis(ms);
        }

        if let Some(ms) = parse_positive(&lookup, "SAVE_ERROR_CLEAR_MS") {
            config.save_error_clear = Duration::from_millis(ms);
        }

        if let Some(secs) = parse_positive(&lookup, "HTTP_TIMEOUT_SECS") {
            config.http_timeout = Duration::from_secs(secs);
        }

        // RUST_LOG is read by tracing-subscriber's EnvFilter directly.

        config
    }
}

fn parse_positive(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<u64> {
    let raw = lookup(name)?;
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            tracing::warn!(name, value = %raw, "Invalid value, using default");
            None
        }
    }
}

fn default_download_dir() -> PathBuf {
    UserDirs::new()
        .and_then(|dirs| dirs.download_dir().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("./downloads"))
}
