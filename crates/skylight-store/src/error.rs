use thiserror::Error;

use crate::tier::Tier;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Schema migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A stored value is not valid JSON, or a value could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The write would push the tier past its total capacity.
    #[error("QUOTA_BYTES quota exceeded in {tier} storage ({requested} > {quota} bytes)")]
    QuotaExceeded {
        tier: Tier,
        requested: usize,
        quota: usize,
    },

    /// A single item is larger than the tier allows.
    #[error("QUOTA_BYTES_PER_ITEM quota exceeded in {tier} storage for '{key}' ({size} > {quota} bytes)")]
    ItemQuotaExceeded {
        tier: Tier,
        key: String,
        size: usize,
        quota: usize,
    },

    /// Another thread panicked while holding the database lock.
    #[error("Store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// Whether this error was raised by a capacity check rather than by the
    /// database itself.
    pub fn is_quota(&self) -> bool {
        matches!(
            self,
            StoreError::QuotaExceeded { .. } | StoreError::ItemQuotaExceeded { .. }
        )
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
