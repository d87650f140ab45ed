//! Portico configuration — TOML file under the home directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PorticoError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PorticoConfig {
    /// Platform identifier ("android", "ios", "desktop", ...). Used only to
    /// pick the alarm scheduling strategy.
    #[serde(default = "default_platform")]
    pub platform: String,

    #[serde(default)]
    pub store: StoreConfig,
}

/// Durable store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend name: "sqlite" or "memory".
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// Database path for the sqlite backend. Defaults to
    /// `~/.portico/store.db`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_platform() -> String {
    "desktop".into()
}

fn default_store_backend() -> String {
    "sqlite".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: None,
        }
    }
}

impl Default for PorticoConfig {
    fn default() -> Self {
        Self {
            platform: default_platform(),
            store: StoreConfig::default(),
        }
    }
}

impl PorticoConfig {
    /// Portico's home directory (`~/.portico`).
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".portico")
    }

    /// Default config file path (`~/.portico/config.toml`).
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Resolved store database path.
    pub fn store_path(&self) -> PathBuf {
        self.store
            .path
            .clone()
            .unwrap_or_else(|| Self::home_dir().join("store.db"))
    }

    /// Load from the default path, falling back to defaults if the file does
    /// not exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| PorticoError::config(format!("{}: {e}", path.display())))
    }

    /// Persist to the given path, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(self)
            .map_err(|e| PorticoError::config(format!("serialize: {e}")))?;
        std::fs::write(path, raw)?;
        Ok(())
    }
}
