//! Per-plugin persistent key-value store, backed by TOML
//!
//! Each plugin gets its own store file under the host's data directory, so
//! keys are namespaced by plugin without any naming convention.

use crate::error::PluginError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Typed key-value store persisted as a TOML file.
///
/// Writes go to disk on every mutation; the files are small and mutations
/// are rare.
#[derive(Debug, Default)]
pub struct PluginStore {
    path: Option<PathBuf>,
    values: HashMap<String, toml::Value>,
}

impl PluginStore {
    /// Load a store from `path`, or start empty if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, PluginError> {
        let values = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content).map_err(|e| PluginError::config(e.to_string()))?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            values,
        })
    }

    /// A store with no backing file. Used for tests and ephemeral plugins.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Read a value.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values.get(key).and_then(|v| v.clone().try_into().ok())
    }

    /// Write a value and persist.
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), PluginError> {
        let value =
            toml::Value::try_from(value).map_err(|e| PluginError::Serialization(e.to_string()))?;
        self.values.insert(key.to_string(), value);
        self.persist()
    }

    /// Remove a key and persist. No-op if absent.
    pub fn remove(&mut self, key: &str) -> Result<(), PluginError> {
        if self.values.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }

    /// Whether the store holds a value for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn persist(&self) -> Result<(), PluginError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let content = toml::to_string_pretty(&self.values)
            .map_err(|e| PluginError::Serialization(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.exists()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn in_memory_roundtrip() {
        let mut store = PluginStore::in_memory();
        store.set("greeting", "hello").unwrap();
        store.set("count", 2u32).unwrap();

        assert_eq!(store.get::<String>("greeting").as_deref(), Some("hello"));
        assert_eq!(store.get::<u32>("count"), Some(2));
        assert!(store.contains("count"));

        store.remove("count").unwrap();
        assert_eq!(store.get::<u32>("count"), None);
    }

    #[test]
    fn persists_across_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.toml");

        let mut store = PluginStore::load(&path).unwrap();
        store.set("volume", 7u32).unwrap();

        let reloaded = PluginStore::load(&path).unwrap();
        assert_eq!(reloaded.get::<u32>("volume"), Some(7));
    }

    #[test]
    fn load_missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store = PluginStore::load(&dir.path().join("absent.toml")).unwrap();
        assert!(!store.contains("anything"));
    }

    #[test]
    fn set_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/dir/store.toml");
        let mut store = PluginStore::load(&path).unwrap();
        store.set("k", 1u32).unwrap();
        assert!(path.exists());
    }
}
