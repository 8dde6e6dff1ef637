//! Change notifications delivered to every subscriber of a [`crate::Store`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tier::Tier;

/// Before/after value of a single key. `None` means absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueChange {
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// One committed write, as seen by listeners.
///
/// Only keys whose value actually changed are listed; a write that changes
/// nothing produces no notification at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageChange {
    pub tier: Tier,
    pub changes: BTreeMap<String, ValueChange>,
}

impl StorageChange {
    pub fn contains(&self, key: &str) -> bool {
        self.changes.contains_key(key)
    }

    /// The new value of `key`, if this change touched it and did not remove it.
    pub fn new_value(&self, key: &str) -> Option<&Value> {
        self.changes.get(key).and_then(|c| c.new_value.as_ref())
    }

    /// The new value of `key` as a string. Removed keys read as `""`.
    pub fn new_str(&self, key: &str) -> Option<&str> {
        let change = self.changes.get(key)?;
        Some(
            change
                .new_value
                .as_ref()
                .and_then(Value::as_str)
                .unwrap_or_default(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Diff `old` against `new` for the keys in `new`.
pub(crate) fn diff(
    tier: Tier,
    old: &BTreeMap<String, Value>,
    new: &BTreeMap<String, Value>,
) -> StorageChange {
    let changes = new
        .iter()
        .filter(|(key, value)| old.get(*key) != Some(*value))
        .map(|(key, value)| {
            (
                key.clone(),
                ValueChange {
                    old_value: old.get(key).cloned(),
                    new_value: Some(value.clone()),
                },
            )
        })
        .collect();

    StorageChange { tier, changes }
}

/// Notification for keys that were removed.
pub(crate) fn removal(tier: Tier, removed: BTreeMap<String, Value>) -> StorageChange {
    let changes = removed
        .into_iter()
        .map(|(key, old)| {
            (
                key,
                ValueChange {
                    old_value: Some(old),
                    new_value: None,
                },
            )
        })
        .collect();

    StorageChange { tier, changes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_diff_skips_unchanged_keys() {
        let old = BTreeMap::from([("a".to_string(), json!(1)), ("b".to_string(), json!("x"))]);
        let new = BTreeMap::from([("a".to_string(), json!(1)), ("b".to_string(), json!("y"))]);

        let change = diff(Tier::Sync, &old, &new);
        assert!(!change.contains("a"));
        assert_eq!(change.new_str("b"), Some("y"));
        assert_eq!(change.changes["b"].old_value, Some(json!("x")));
    }

    #[test]
    fn test_removed_keys_read_as_empty_strings() {
        let change = removal(
            Tier::Sync,
            BTreeMap::from([("error".to_string(), json!("boom"))]),
        );
        assert_eq!(change.new_str("error"), Some(""));
        assert!(change.new_value("error").is_none());
    }
}
