//! Plugin-tagged logging facade
//!
//! Every record carries the owning plugin id under the `plugin` field and
//! the `plugin` target, so host log filtering can separate plugin output
//! from runtime output.

/// Namespaced logging handle for a single plugin.
#[derive(Debug, Clone)]
pub struct PluginLog {
    plugin_id: String,
}

impl PluginLog {
    /// Create a log handle for the given plugin id.
    pub fn new(plugin_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
        }
    }

    /// The owning plugin id.
    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn log(&self, message: &str) {
        tracing::info!(target: "plugin", plugin = %self.plugin_id, "{message}");
    }

    pub fn info(&self, message: &str) {
        tracing::info!(target: "plugin", plugin = %self.plugin_id, "{message}");
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(target: "plugin", plugin = %self.plugin_id, "{message}");
    }

    pub fn error(&self, message: &str) {
        tracing::error!(target: "plugin", plugin = %self.plugin_id, "{message}");
    }

    pub fn debug(&self, message: &str) {
        tracing::debug!(target: "plugin", plugin = %self.plugin_id, "{message}");
    }
}
