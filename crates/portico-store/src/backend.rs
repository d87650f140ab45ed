//! Storage backends for the durable store.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use portico_core::error::{PorticoError, Result};
use rusqlite::Connection;
use serde_json::Value;

/// Contract the durable store requires from its persistence layer. Values
/// are JSON-shaped; keys are scoped by area name so multiple named areas can
/// share one backend.
#[async_trait]
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    async fn get_all(&self, area: &str) -> Result<HashMap<String, Value>>;

    /// Merge `entries` into the area, last-write-wins per key. The write is
    /// durable when this returns.
    async fn set(&self, area: &str, entries: &HashMap<String, Value>) -> Result<()>;

    async fn remove(&self, area: &str, keys: &[String]) -> Result<()>;

    async fn clear(&self, area: &str) -> Result<()>;
}

/// SQLite-backed storage.
#[derive(Debug)]
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| PorticoError::Storage(e.to_string()))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                area TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (area, key)
            );",
        )
        .map_err(|e| PorticoError::Storage(e.to_string()))?;

        tracing::debug!("sqlite store opened: {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| PorticoError::Storage(e.to_string()))
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get_all(&self, area: &str) -> Result<HashMap<String, Value>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT key, value FROM kv WHERE area = ?1")
            .map_err(|e| PorticoError::Storage(e.to_string()))?;

        let rows = stmt
            .query_map(rusqlite::params![area], |row| {
                let key: String = row.get(0)?;
                let raw: String = row.get(1)?;
                Ok((key, raw))
            })
            .map_err(|e| PorticoError::Storage(e.to_string()))?;

        let mut out = HashMap::new();
        for row in rows {
            let (key, raw) = row.map_err(|e| PorticoError::Storage(e.to_string()))?;
            let value = serde_json::from_str(&raw)?;
            out.insert(key, value);
        }
        Ok(out)
    }

    async fn set(&self, area: &str, entries: &HashMap<String, Value>) -> Result<()> {
        let conn = self.lock()?;
        for (key, value) in entries {
            conn.execute(
                "INSERT OR REPLACE INTO kv (area, key, value) VALUES (?1, ?2, ?3)",
                rusqlite::params![area, key, value.to_string()],
            )
            .map_err(|e| PorticoError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    async fn remove(&self, area: &str, keys: &[String]) -> Result<()> {
        let conn = self.lock()?;
        for key in keys {
            conn.execute(
                "DELETE FROM kv WHERE area = ?1 AND key = ?2",
                rusqlite::params![area, key],
            )
            .map_err(|e| PorticoError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    async fn clear(&self, area: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM kv WHERE area = ?1", rusqlite::params![area])
            .map_err(|e| PorticoError::Storage(e.to_string()))?;
        Ok(())
    }
}

/// In-memory storage, for tests and throwaway runtimes. Not durable across
/// process restarts.
#[derive(Default, Debug)]
pub struct MemoryBackend {
    areas: Mutex<HashMap<String, HashMap<String, Value>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, HashMap<String, Value>>>> {
        self.areas
            .lock()
            .map_err(|e| PorticoError::Storage(e.to_string()))
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get_all(&self, area: &str) -> Result<HashMap<String, Value>> {
        Ok(self.lock()?.get(area).cloned().unwrap_or_default())
    }

    async fn set(&self, area: &str, entries: &HashMap<String, Value>) -> Result<()> {
        let mut areas = self.lock()?;
        let map = areas.entry(area.to_string()).or_default();
        for (key, value) in entries {
            map.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn remove(&self, area: &str, keys: &[String]) -> Result<()> {
        let mut areas = self.lock()?;
        if let Some(map) = areas.get_mut(area) {
            for key in keys {
                map.remove(key);
            }
        }
        Ok(())
    }

    async fn clear(&self, area: &str) -> Result<()> {
        self.lock()?.remove(area);
        Ok(())
    }
}
