//! Schema migration runner.
//!
//! Migrations are executed in order every time a [`crate::Database`] is
//! opened. Each migration is guarded by the `user_version` pragma so it runs
//! exactly once.
//!
//! This is unrelated to [`crate::history_migration`], which moves *data*
//! between tiers.

pub mod v001_tiers;

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Run all pending migrations against the open connection.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    tracing::debug!(
        current_version = current,
        target_version = CURRENT_VERSION,
        "checking database migrations"
    );

    if current < 1 {
        tracing::info!("applying migration v001_tiers");
        v001_tiers::up(conn).map_err(|e| StoreError::Migration(e.to_string()))?;
        conn.pragma_update(None, "user_version", 1)?;
    }

    Ok(())
}
