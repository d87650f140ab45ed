//! # Portico Store
//! Durable JSON key-value storage shared by every Portico module.
//!
//! A [`DurableStore`] wraps one [`StorageBackend`] and hands out named
//! [`StoreArea`]s. Areas are shared and un-synchronized: two modules writing
//! overlapping keys race on a last-write-wins basis. Writes are durable
//! before the call returns.

pub mod backend;

use std::collections::HashMap;
use std::sync::Arc;

use portico_core::error::{PorticoError, Result};
use portico_core::event::Event;
use serde_json::Value;

pub use backend::{MemoryBackend, SqliteBackend, StorageBackend};

/// Old/new value pair for a single mutated key. A missing `old_value` means
/// the key was absent before; a missing `new_value` means it was removed.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// Everything that changed in one mutating call, plus the area it happened in.
#[derive(Debug, Clone)]
pub struct ChangeSet {
    pub area: String,
    pub changes: HashMap<String, StorageChange>,
}

/// Normalized key selector for [`StoreArea::get`]. The original API accepted
/// nothing / a string / a list / a defaults object in one parameter slot;
/// callers here pick the variant explicitly.
#[derive(Debug, Clone)]
pub enum KeyQuery {
    /// Every key in the area.
    All,
    Single(String),
    Many(Vec<String>),
    /// Requested keys with per-key fallback values substituted for misses.
    WithDefaults(HashMap<String, Value>),
}

impl From<&str> for KeyQuery {
    fn from(key: &str) -> Self {
        KeyQuery::Single(key.to_string())
    }
}

impl From<String> for KeyQuery {
    fn from(key: String) -> Self {
        KeyQuery::Single(key)
    }
}

impl From<Vec<String>> for KeyQuery {
    fn from(keys: Vec<String>) -> Self {
        KeyQuery::Many(keys)
    }
}

impl From<Vec<&str>> for KeyQuery {
    fn from(keys: Vec<&str>) -> Self {
        KeyQuery::Many(keys.into_iter().map(String::from).collect())
    }
}

/// The store front: one backend, named areas, one shared change event.
pub struct DurableStore {
    backend: Arc<dyn StorageBackend>,
    on_changed: Arc<Event<ChangeSet>>,
}

impl DurableStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            on_changed: Arc::new(Event::new("onChanged")),
        }
    }

    /// Build a backend from its configured name.
    pub fn create_backend(
        name: &str,
        path: &std::path::Path,
    ) -> Result<Arc<dyn StorageBackend>> {
        match name {
            "sqlite" => Ok(Arc::new(SqliteBackend::open(path)?)),
            "memory" => Ok(Arc::new(MemoryBackend::new())),
            other => Err(PorticoError::Storage(format!(
                "Unknown storage backend: {other}"
            ))),
        }
    }

    /// Fired after every mutating call on a change-reporting area, with the
    /// per-key old/new values.
    pub fn on_changed(&self) -> &Arc<Event<ChangeSet>> {
        &self.on_changed
    }

    /// App-visible area.
    pub fn local(&self) -> StoreArea {
        self.area("local", true)
    }

    /// Module-internal bookkeeping area (notification/alarm snapshots).
    /// Mutations here do not fire `on_changed`.
    pub fn internal(&self) -> StoreArea {
        self.area("internal", false)
    }

    fn area(&self, name: &str, emit_changes: bool) -> StoreArea {
        StoreArea {
            name: name.to_string(),
            backend: Arc::clone(&self.backend),
            on_changed: Arc::clone(&self.on_changed),
            emit_changes,
        }
    }
}

/// A named slice of the durable store.
#[derive(Clone)]
pub struct StoreArea {
    name: String,
    backend: Arc<dyn StorageBackend>,
    on_changed: Arc<Event<ChangeSet>>,
    emit_changes: bool,
}

impl StoreArea {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read values for the query. Absent keys are omitted unless the query
    /// carries a default for them.
    pub async fn get(&self, query: impl Into<KeyQuery>) -> Result<HashMap<String, Value>> {
        let all = self.backend.get_all(&self.name).await?;
        Ok(match query.into() {
            KeyQuery::All => all,
            KeyQuery::Single(key) => {
                let mut out = HashMap::new();
                if let Some(value) = all.get(&key) {
                    out.insert(key, value.clone());
                }
                out
            }
            KeyQuery::Many(keys) => {
                let mut out = HashMap::new();
                for key in keys {
                    if let Some(value) = all.get(&key) {
                        out.insert(key, value.clone());
                    }
                }
                out
            }
            KeyQuery::WithDefaults(defaults) => {
                let mut out = HashMap::new();
                for (key, default) in defaults {
                    let value = all.get(&key).cloned().unwrap_or(default);
                    out.insert(key, value);
                }
                out
            }
        })
    }

    /// Read one key, deserialized, or `None` if absent.
    pub async fn get_one(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.get(key).await?.remove(key))
    }

    /// Merge `entries` into the area, last-write-wins per key. Durable
    /// before this returns.
    pub async fn set(&self, entries: HashMap<String, Value>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        // Old values are only needed when someone is listening.
        let old = if self.reporting() {
            Some(self.backend.get_all(&self.name).await?)
        } else {
            None
        };

        self.backend.set(&self.name, &entries).await?;

        if let Some(old) = old {
            let changes = entries
                .into_iter()
                .map(|(key, new_value)| {
                    let old_value = old.get(&key).cloned();
                    (key, StorageChange { old_value, new_value: Some(new_value) })
                })
                .collect();
            self.fire_changes(changes);
        }
        Ok(())
    }

    /// Convenience for a single key.
    pub async fn set_one(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = HashMap::new();
        entries.insert(key.to_string(), value);
        self.set(entries).await
    }

    pub async fn remove(&self, keys: Vec<String>) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let old = if self.reporting() {
            Some(self.backend.get_all(&self.name).await?)
        } else {
            None
        };

        self.backend.remove(&self.name, &keys).await?;

        if let Some(old) = old {
            let changes = keys
                .into_iter()
                .filter_map(|key| {
                    old.get(&key).cloned().map(|old_value| {
                        (key, StorageChange { old_value: Some(old_value), new_value: None })
                    })
                })
                .collect();
            self.fire_changes(changes);
        }
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        let old = if self.reporting() {
            Some(self.backend.get_all(&self.name).await?)
        } else {
            None
        };

        self.backend.clear(&self.name).await?;

        if let Some(old) = old {
            let changes = old
                .into_iter()
                .map(|(key, old_value)| {
                    (key, StorageChange { old_value: Some(old_value), new_value: None })
                })
                .collect();
            self.fire_changes(changes);
        }
        Ok(())
    }

    fn reporting(&self) -> bool {
        self.emit_changes && self.on_changed.has_listeners()
    }

    fn fire_changes(&self, changes: HashMap<String, StorageChange>) {
        if changes.is_empty() {
            return;
        }
        self.on_changed.fire(&ChangeSet {
            area: self.name.clone(),
            changes,
        });
    }
}
