//! modforge-plugin-api - Plugin API for the modforge game shell
//!
//! This crate provides the traits and types needed to write modforge
//! plugins. A plugin attaches callbacks to named lifecycle hooks, registers
//! commands under its own namespace, and talks to the host only through the
//! restricted [`CapabilitySurface`] it is constructed with.
//!
//! # Example
//!
//! ```ignore
//! use modforge_plugin_api::{
//!     CapabilitySurface, CommandSpec, HookSpec, Plugin, PluginError, export_plugin,
//! };
//! use serde_json::json;
//!
//! pub struct ChatLogger {
//!     surface: CapabilitySurface,
//! }
//!
//! impl ChatLogger {
//!     pub fn new(surface: CapabilitySurface) -> Self {
//!         Self { surface }
//!     }
//! }
//!
//! impl Plugin for ChatLogger {
//!     fn hooks(&self) -> Vec<HookSpec> {
//!         let log = self.surface.log.clone();
//!         vec![HookSpec::new("chat:message", move |payload| {
//!             let log = log.clone();
//!             async move {
//!                 log.info(&payload.to_string());
//!                 Ok(None)
//!             }
//!         })]
//!     }
//! }
//!
//! export_plugin!(ChatLogger);
//! ```

pub mod command;
pub mod error;
pub mod hook;
pub mod log;
pub mod store;
pub mod surface;
pub mod timers;
pub mod types;

pub use command::{CommandArgs, CommandFuture, CommandHandler, CommandSpec};
pub use error::PluginError;
pub use hook::{HookFn, HookFuture, HookSpec};
pub use log::PluginLog;
pub use store::PluginStore;
pub use surface::{
    AnalyticsApi, CapabilitySurface, ChatApi, GameApi, I18nApi, PlayerApi, PluginsApi,
    SurfaceError, SurfaceResult, UiApi, Utils, WorldApi,
};
pub use timers::{TimerId, Timers};
pub use types::{DependencySpec, MenuItem, NoticeLevel, PluginDescriptor, PluginStatus};

use async_trait::async_trait;

/// Current plugin API version. Dynamic-library plugins must match this
/// exactly; the host checks it before instantiating.
pub const API_VERSION: u32 = 1;

/// The core plugin trait.
///
/// A plugin type is constructed from exactly one input, the sandbox-built
/// capability surface (`fn new(surface: CapabilitySurface) -> Self` for
/// types exported with [`export_plugin!`]). The host queries `hooks()` and
/// `commands()` once, right after construction; lifecycle methods have
/// default no-op implementations.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Hook callbacks this plugin contributes.
    fn hooks(&self) -> Vec<HookSpec> {
        Vec::new()
    }

    /// Commands this plugin contributes. The host namespaces each as
    /// `/{plugin-id}/{name}`.
    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }

    /// Called once after hooks and commands are registered, before the
    /// plugin transitions to Loaded.
    async fn initialize(&mut self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called when the plugin transitions to Enabled.
    async fn on_enable(&mut self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called when the plugin transitions to Disabled.
    async fn on_disable(&mut self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called during unload, after the plugin has been disabled.
    async fn cleanup(&mut self) -> Result<(), PluginError> {
        Ok(())
    }
}

/// Export a plugin type for dynamic loading.
///
/// The type must provide `fn new(surface: CapabilitySurface) -> Self`.
///
/// # Generated functions
///
/// - `_modforge_plugin_create(surface)`: consumes a boxed surface and
///   returns a new plugin instance
/// - `_modforge_plugin_api_version()`: returns [`API_VERSION`]
/// - `_modforge_plugin_destroy(ptr)`: destroys a plugin instance
#[macro_export]
macro_rules! export_plugin {
    ($plugin_type:ty) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn _modforge_plugin_create(
            surface: *mut $crate::CapabilitySurface,
        ) -> *mut dyn $crate::Plugin {
            let surface = unsafe { *Box::from_raw(surface) };
            let plugin: Box<dyn $crate::Plugin> = Box::new(<$plugin_type>::new(surface));
            Box::into_raw(plugin)
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn _modforge_plugin_api_version() -> u32 {
            $crate::API_VERSION
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn _modforge_plugin_destroy(ptr: *mut dyn $crate::Plugin) {
            if !ptr.is_null() {
                unsafe {
                    drop(Box::from_raw(ptr));
                }
            }
        }
    };
}
