//! # skylight-store
//!
//! Dual-tier persistent storage for Skylight, backed by SQLite.
//!
//! The *synchronized* tier is small and quota-limited and holds the current
//! wallpaper, the configured topic and the last error. The *local* tier is
//! large and holds the wallpaper history. Every committed write is published
//! on a change feed that all view instances subscribe to; it is the only way
//! a view learns about writes made by the orchestrator or by another view.

pub mod changes;
pub mod database;
pub mod history;
pub mod history_migration;
pub mod items;
pub mod migrations;
pub mod store;
pub mod tier;

mod error;

pub use changes::{StorageChange, ValueChange};
pub use database::Database;
pub use error::{Result, StoreError};
pub use history::HistoryCache;
pub use history_migration::{HistoryMigrator, MigrationOutcome};
pub use store::Store;
pub use tier::{StoreConfig, Tier, TierQuota};
