//! modforge-host - plugin runtime for the modforge game shell
//!
//! Hosts independently-authored plugins: loads them from a directory of
//! dynamic libraries (or a set of built-in factories), resolves declared
//! dependencies with minimum-version constraints, sandboxes each instance
//! behind a capability surface, and runs an ordered hook pipeline with
//! per-callback failure isolation. Plugins can be enabled, disabled,
//! reloaded and unloaded at runtime without restarting the host.
//!
//! The entry point is [`PluginHost`]; everything else hangs off it.
//!
//! ```ignore
//! use modforge_host::{HostConfig, PluginHost, DirectorySource, HostSurface};
//!
//! let host = PluginHost::new(
//!     HostConfig::default(),
//!     Box::new(DirectorySource::new("/var/lib/modforge/plugins")),
//!     HostSurface::default(),
//! );
//! host.load_startup_plugins().await?;
//! let result = host.invoke_hook("game:start", serde_json::json!({})).await;
//! ```

pub mod catalog;
pub mod commands;
pub mod error;
pub mod events;
pub mod hooks;
pub mod host;
pub mod loader;
pub mod manifest;
pub mod registry;
pub mod resolver;
pub mod sandbox;
pub mod version;

pub use catalog::Catalog;
pub use commands::{CommandInfo, CommandTable, command_path, parse_command_line};
pub use error::{HostError, LifecyclePhase};
pub use events::{HostEvent, HostEvents};
pub use hooks::{BUILTIN_HOOKS, HookRegistry};
pub use host::{HostConfig, HostMetrics, PluginHost, PluginState};
pub use loader::{DirectorySource, Loader, PluginFactory, PluginSource, StaticSource};
pub use manifest::ValidationError;
pub use registry::StartupRegistry;
pub use sandbox::HostSurface;
