//! Startup registry - plugins loaded automatically at host startup
//!
//! Stored as TOML, by default under the host's data directory as
//! `registry.toml`. Order is preserved so dependencies listed earlier come
//! up before their dependents (the resolver would load them anyway, but
//! keeping declaration order makes startup deterministic).

use crate::error::HostError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Persisted list of plugin ids to load at startup.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StartupRegistry {
    #[serde(default)]
    pub autoload: Vec<String>,
}

impl StartupRegistry {
    /// Load from a TOML file. Missing file means an empty registry.
    pub fn load(path: &Path) -> Result<Self, HostError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let registry: Self =
            toml::from_str(&content).map_err(|e| HostError::Registry(e.to_string()))?;
        Ok(registry)
    }

    /// Save to a TOML file, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), HostError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| HostError::Registry(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.exists()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Append an id, keeping the list duplicate-free.
    pub fn add(&mut self, id: &str) {
        if !self.contains(id) {
            self.autoload.push(id.to_string());
        }
    }

    /// Remove an id. No-op if absent.
    pub fn remove(&mut self, id: &str) {
        self.autoload.retain(|entry| entry != id);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.autoload.iter().any(|entry| entry == id)
    }

    /// Ids in startup order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.autoload.iter().map(String::as_str)
    }
}
