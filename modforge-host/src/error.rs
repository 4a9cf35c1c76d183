//! Host error taxonomy
//!
//! Fatal errors surface to the caller and are mirrored as a `PluginError`
//! host event. Hook callback failures are not errors at this level - they
//! are isolated inside the pipeline and reported as `HookError` events.

use crate::manifest::ValidationError;
use thiserror::Error;

/// Lifecycle phase in which a plugin's own code failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Initialize,
    Enable,
    Disable,
    Cleanup,
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LifecyclePhase::Initialize => "initialize",
            LifecyclePhase::Enable => "on_enable",
            LifecyclePhase::Disable => "on_disable",
            LifecyclePhase::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// Errors raised by the plugin host.
#[derive(Error, Debug)]
pub enum HostError {
    /// Descriptor failed structural validation
    #[error("Plugin '{id}' descriptor invalid: {source}")]
    Validation {
        id: String,
        #[source]
        source: ValidationError,
    },

    /// Descriptor or code could not be fetched from the plugin source
    #[error("Failed to fetch plugin '{id}': {reason}")]
    Fetch { id: String, reason: String },

    /// An installed dependency is older than the declared constraint
    #[error(
        "Plugin '{plugin}' requires '{dependency}' {required} but {installed} is installed"
    )]
    DependencyVersion {
        plugin: String,
        dependency: String,
        installed: String,
        required: String,
    },

    /// Plugin was built against a different API version
    #[error("Plugin '{id}' API version mismatch: host expects {expected}, plugin has {found}")]
    ApiVersionMismatch {
        id: String,
        expected: u32,
        found: u32,
    },

    /// The plugin's own lifecycle code failed; the plugin keeps its prior state
    #[error("Plugin '{id}' failed in {phase}: {reason}")]
    Lifecycle {
        id: String,
        phase: LifecyclePhase,
        reason: String,
    },

    /// An in-flight load of the same plugin failed; this caller shared its fate
    #[error("Plugin '{id}' failed to load: {reason}")]
    LoadFailed { id: String, reason: String },

    /// Plugin not found in the loaded table
    #[error("Plugin '{id}' not loaded")]
    NotLoaded { id: String },

    /// Startup registry file could not be read or written
    #[error("Registry error: {0}")]
    Registry(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HostError {
    /// Owning plugin id, when the error names one.
    pub fn plugin_id(&self) -> Option<&str> {
        match self {
            HostError::Validation { id, .. }
            | HostError::Fetch { id, .. }
            | HostError::ApiVersionMismatch { id, .. }
            | HostError::Lifecycle { id, .. }
            | HostError::LoadFailed { id, .. }
            | HostError::NotLoaded { id } => Some(id),
            HostError::DependencyVersion { plugin, .. } => Some(plugin),
            HostError::Registry(_) | HostError::Io(_) => None,
        }
    }
}
