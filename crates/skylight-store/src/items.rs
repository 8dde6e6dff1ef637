//! Raw key/value access to the per-tier tables.
//!
//! Values are stored as JSON text; decoding happens in [`crate::Store`].

use std::collections::BTreeMap;

use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::Result;
use crate::tier::Tier;

impl Database {
    /// Fetch the encoded values of `keys`. Missing keys are absent from the
    /// result.
    pub fn read_raw(&self, tier: Tier, keys: &[&str]) -> Result<BTreeMap<String, String>> {
        let mut stmt = self.conn().prepare_cached(&format!(
            "SELECT value FROM {} WHERE key = ?1",
            tier.table()
        ))?;

        let mut values = BTreeMap::new();
        for key in keys {
            let value: Option<String> = stmt.query_row(params![key], |row| row.get(0)).optional()?;
            if let Some(value) = value {
                values.insert((*key).to_string(), value);
            }
        }
        Ok(values)
    }

    /// Bytes currently used by a tier: key bytes plus encoded value bytes.
    pub fn bytes_in_use(&self, tier: Tier) -> Result<usize> {
        let total: i64 = self.conn().query_row(
            &format!(
                "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0)
                 FROM {}",
                tier.table()
            ),
            [],
            |row| row.get(0),
        )?;
        Ok(total.max(0) as usize)
    }

    /// Upsert all items in a single transaction.
    pub fn write_raw(&mut self, tier: Tier, items: &[(String, String)]) -> Result<()> {
        let tx = self.conn_mut().transaction()?;
        {
            let mut stmt = tx.prepare_cached(&format!(
                "INSERT INTO {} (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                tier.table()
            ))?;
            for (key, value) in items {
                stmt.execute(params![key, value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Delete `keys` in a single transaction. Returns the number removed.
    pub fn delete_raw(&mut self, tier: Tier, keys: &[&str]) -> Result<usize> {
        let tx = self.conn_mut().transaction()?;
        let mut removed = 0;
        {
            let mut stmt =
                tx.prepare_cached(&format!("DELETE FROM {} WHERE key = ?1", tier.table()))?;
            for key in keys {
                removed += stmt.execute(params![key])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }
}
