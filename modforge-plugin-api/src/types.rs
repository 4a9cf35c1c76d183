//! Plugin descriptor and metadata types

use serde::{Deserialize, Serialize};

/// Plugin descriptor, fetched as `plugin.json` from the plugin source.
///
/// Immutable once loaded; the host validates it before constructing an
/// instance. `id` is the plugin's identity everywhere in the runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Unique identifier, pattern `[A-Za-z0-9_-]+`
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Dotted-numeric version string (e.g. "1.2.0")
    pub version: String,
    /// Plugin author
    #[serde(default)]
    pub author: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Entry-point file, relative to the plugin directory
    #[serde(default)]
    pub main: Option<String>,
    /// Capability names the plugin declares it uses
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Plugins that must be loaded and version-compatible first
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
    /// Catalog category
    #[serde(default)]
    pub category: Option<String>,
    /// Catalog tags
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A declared dependency on another plugin.
///
/// `version` is a minimum: the installed dependency must compare greater
/// than or equal to it, component-wise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencySpec {
    /// Id of the required plugin
    pub id: String,
    /// Minimum required version
    pub version: String,
}

/// Summary of a plugin as seen through the `plugins` facade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginStatus {
    /// Plugin id
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Installed version
    pub version: String,
    /// Whether the plugin is currently enabled
    pub enabled: bool,
}

/// Severity attached to user-facing notices raised through `GameApi::notify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A menu entry contributed through the `ui` facade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuItem {
    /// Stable identifier, used to remove the entry again
    pub id: String,
    /// Displayed label
    pub label: String,
}
