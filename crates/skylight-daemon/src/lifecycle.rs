//! Install and update detection.
//!
//! The version that last completed its install handling is kept in the
//! local tier. A start with no recorded version is a fresh install; a start
//! with a different one is an update. Both get the install treatment.
//!
//! Whether the refresh alarm was paused is kept here too, so a plain restart
//! does not silently resume it.

use serde_json::{Map, Value};

use skylight_shared::constants::{KEY_ALARM_PAUSED, KEY_INSTALLED_VERSION};
use skylight_store::{Result, Store, Tier};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartKind {
    Install,
    Update { from: String },
    Restart,
}

pub fn detect(store: &Store, version: &str) -> Result<StartKind> {
    let recorded: Option<String> = store.get_value(Tier::Local, KEY_INSTALLED_VERSION)?;
    Ok(match recorded {
        None => StartKind::Install,
        Some(v) if v == version => StartKind::Restart,
        Some(from) => StartKind::Update { from },
    })
}

/// Mark install handling for `version` as done.
pub fn record_version(store: &Store, version: &str) -> Result<()> {
    let mut items = Map::new();
    items.insert(KEY_INSTALLED_VERSION.into(), Value::from(version));
    store.set(Tier::Local, items)
}

pub fn alarm_paused(store: &Store) -> Result<bool> {
    Ok(store
        .get_value::<bool>(Tier::Local, KEY_ALARM_PAUSED)?
        .unwrap_or(false))
}

pub fn set_alarm_paused(store: &Store, paused: bool) -> Result<()> {
    if paused {
        let mut items = Map::new();
        items.insert(KEY_ALARM_PAUSED.into(), Value::Bool(true));
        store.set(Tier::Local, items)
    } else {
        store.remove(Tier::Local, &[KEY_ALARM_PAUSED])
    }
}
