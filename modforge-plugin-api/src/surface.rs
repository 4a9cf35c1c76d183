//! Capability surface - the restricted view of the host a plugin receives
//!
//! The host application owns the concrete implementations of these facades;
//! the runtime's sandbox wraps them and hands each plugin a
//! [`CapabilitySurface`] at construction time. A facade that the host does
//! not provide is simply absent (`None`) from the surface - there is no
//! runtime permission check beyond that.

use crate::command::CommandArgs;
use crate::log::PluginLog;
use crate::store::PluginStore;
use crate::timers::Timers;
use crate::types::{MenuItem, NoticeLevel, PluginStatus};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Error raised by a capability surface call.
#[derive(Error, Debug)]
pub enum SurfaceError {
    /// The requested capability or entity is not available
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The host application rejected or failed the call
    #[error("{0}")]
    Failed(String),
}

impl SurfaceError {
    /// Shorthand for a failed call.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Result alias for surface calls.
pub type SurfaceResult<T> = Result<T, SurfaceError>;

// ─── Host-application facades ────────────────────────────────────────

/// Game state and persistence.
pub trait GameApi: Send + Sync {
    /// Snapshot of the current game state
    fn state(&self) -> SurfaceResult<Value>;
    /// Current game settings (language, volume, graphics, ...)
    fn settings(&self) -> SurfaceResult<Value>;
    /// Persist the current game
    fn save(&self) -> SurfaceResult<()>;
    /// Restore a saved game by slot id
    fn load(&self, slot: &str) -> SurfaceResult<()>;
    /// Raise a user-facing notice
    fn notify(&self, message: &str, level: NoticeLevel) -> SurfaceResult<()>;
}

/// Dialogs, HUD and menus.
pub trait UiApi: Send + Sync {
    fn show_dialog(&self, title: &str, content: &str) -> SurfaceResult<()>;
    fn close_dialog(&self) -> SurfaceResult<()>;
    fn set_hud_visible(&self, visible: bool) -> SurfaceResult<()>;
    fn refresh_hud(&self) -> SurfaceResult<()>;
    fn add_menu_item(&self, item: MenuItem) -> SurfaceResult<()>;
    fn remove_menu_item(&self, id: &str) -> SurfaceResult<()>;
}

/// The local player: stats and inventory.
pub trait PlayerApi: Send + Sync {
    fn level(&self) -> SurfaceResult<u32>;
    fn experience(&self) -> SurfaceResult<u64>;
    fn add_experience(&self, amount: u64) -> SurfaceResult<()>;
    fn health(&self) -> SurfaceResult<i32>;
    fn set_health(&self, health: i32) -> SurfaceResult<()>;
    /// Inventory contents as host-defined JSON
    fn inventory(&self) -> SurfaceResult<Value>;
    fn has_item(&self, item_id: &str) -> SurfaceResult<bool>;
    fn item_count(&self, item_id: &str) -> SurfaceResult<u32>;
    fn give_item(&self, item: Value) -> SurfaceResult<()>;
    fn take_item(&self, item_id: &str) -> SurfaceResult<()>;
}

/// The game world: entities and time.
pub trait WorldApi: Send + Sync {
    fn location(&self) -> SurfaceResult<String>;
    /// World time in milliseconds since the epoch of the game clock
    fn time(&self) -> SurfaceResult<i64>;
    fn set_time(&self, time: i64) -> SurfaceResult<()>;
    fn is_daytime(&self) -> SurfaceResult<bool>;
    /// NPCs currently in scope, as host-defined JSON
    fn npcs(&self) -> SurfaceResult<Value>;
    fn spawn_object(&self, kind: &str, position: Value) -> SurfaceResult<String>;
    fn remove_entity(&self, entity_id: &str) -> SurfaceResult<()>;
}

/// Chat channels.
pub trait ChatApi: Send + Sync {
    fn send_message(&self, channel: &str, message: &str) -> SurfaceResult<()>;
}

/// Product analytics sink.
pub trait AnalyticsApi: Send + Sync {
    fn track_event(&self, event: &str, properties: Value) -> SurfaceResult<()>;
    fn track_metric(&self, metric: &str, value: f64) -> SurfaceResult<()>;
    fn set_user_property(&self, property: &str, value: &str) -> SurfaceResult<()>;
}

/// Localization.
pub trait I18nApi: Send + Sync {
    fn translate(&self, key: &str, params: &Value) -> SurfaceResult<String>;
    fn language(&self) -> SurfaceResult<String>;
    fn set_language(&self, language: &str) -> SurfaceResult<()>;
}

// ─── Runtime-owned facade ────────────────────────────────────────────

/// The plugin runtime itself, as seen from inside a plugin.
///
/// Implemented by the host; lifecycle calls re-enter the host's own load
/// path, so they are async.
#[async_trait]
pub trait PluginsApi: Send + Sync {
    /// List all loaded plugins
    fn list(&self) -> Vec<PluginStatus>;
    fn is_loaded(&self, id: &str) -> bool;
    fn is_enabled(&self, id: &str) -> bool;

    async fn load(&self, id: &str) -> SurfaceResult<()>;
    async fn unload(&self, id: &str) -> SurfaceResult<()>;
    async fn reload(&self, id: &str) -> SurfaceResult<()>;
    async fn enable(&self, id: &str) -> SurfaceResult<bool>;
    async fn disable(&self, id: &str) -> SurfaceResult<bool>;

    /// Fire a hook through the host pipeline and return the final payload
    async fn invoke_hook(&self, name: &str, payload: Value) -> Value;

    /// Dispatch a namespaced command (`/{plugin}/{command}`)
    async fn dispatch_command(&self, command: &str, args: CommandArgs) -> SurfaceResult<String>;
}

// ─── Utilities ───────────────────────────────────────────────────────

/// Formatting, id generation and per-plugin persistent storage.
///
/// Unlike the facades above this is provided by the runtime itself, so it is
/// a concrete type rather than a trait.
pub struct Utils {
    store: std::sync::Mutex<PluginStore>,
}

impl Utils {
    /// Create utils backed by the given store.
    pub fn new(store: PluginStore) -> Self {
        Self {
            store: std::sync::Mutex::new(store),
        }
    }

    /// A fresh unique identifier.
    pub fn generate_id(&self) -> String {
        format!("plugin_{}", uuid::Uuid::new_v4())
    }

    /// Format a number with thousands separators (`1234567.5` -> `"1,234,567.5"`).
    pub fn format_number(&self, value: f64) -> String {
        let negative = value < 0.0;
        let value = value.abs();
        let whole = value.trunc() as u64;
        let digits = whole.to_string();
        let mut grouped = String::new();
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(c);
        }
        let mut out = String::new();
        if negative {
            out.push('-');
        }
        out.push_str(&grouped);
        // up to two fractional digits, no trailing zeros
        let frac = (value.fract() * 100.0).round() as u32;
        if frac > 0 && frac < 100 {
            if frac % 10 == 0 {
                out.push_str(&format!(".{}", frac / 10));
            } else {
                out.push_str(&format!(".{:02}", frac));
            }
        }
        out
    }

    /// Format a millisecond timestamp as `YYYY-MM-DD HH:MM:SS` UTC.
    /// Out-of-range timestamps come back as the raw number.
    pub fn format_date(&self, timestamp_ms: i64) -> String {
        match chrono::DateTime::<chrono::Utc>::from_timestamp_millis(timestamp_ms) {
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => timestamp_ms.to_string(),
        }
    }

    /// Read a value from the plugin's persistent store.
    pub fn storage_get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.store.lock().ok()?.get(key)
    }

    /// Write a value to the plugin's persistent store.
    pub fn storage_set<T: serde::Serialize>(
        &self,
        key: &str,
        value: T,
    ) -> Result<(), crate::error::PluginError> {
        let mut store = self
            .store
            .lock()
            .map_err(|_| crate::error::PluginError::config("storage lock poisoned"))?;
        store.set(key, value)
    }

    /// Remove a key from the plugin's persistent store.
    pub fn storage_remove(&self, key: &str) -> Result<(), crate::error::PluginError> {
        let mut store = self
            .store
            .lock()
            .map_err(|_| crate::error::PluginError::config("storage lock poisoned"))?;
        store.remove(key)
    }
}

// ─── The surface itself ──────────────────────────────────────────────

/// The restricted capability surface handed to a plugin.
///
/// Facade fields are `None` when the host application does not provide that
/// capability group. `log`, `timers` and `utils` are always present and are
/// owned by the runtime.
#[derive(Clone)]
pub struct CapabilitySurface {
    pub game: Option<Arc<dyn GameApi>>,
    pub ui: Option<Arc<dyn UiApi>>,
    pub player: Option<Arc<dyn PlayerApi>>,
    pub world: Option<Arc<dyn WorldApi>>,
    pub chat: Option<Arc<dyn ChatApi>>,
    pub analytics: Option<Arc<dyn AnalyticsApi>>,
    pub i18n: Option<Arc<dyn I18nApi>>,
    pub plugins: Option<Arc<dyn PluginsApi>>,

    /// Namespaced logging, tagged with the plugin id
    pub log: PluginLog,
    /// Host-bound timers, cancelled when the plugin is unloaded
    pub timers: Timers,
    /// Formatting helpers and per-plugin persistent storage
    pub utils: Arc<Utils>,
}

impl CapabilitySurface {
    /// Game facade or an error naming the missing capability.
    pub fn game(&self) -> SurfaceResult<&Arc<dyn GameApi>> {
        self.game
            .as_ref()
            .ok_or_else(|| SurfaceError::Unavailable("game".into()))
    }

    /// Player facade or an error naming the missing capability.
    pub fn player(&self) -> SurfaceResult<&Arc<dyn PlayerApi>> {
        self.player
            .as_ref()
            .ok_or_else(|| SurfaceError::Unavailable("player".into()))
    }

    /// Plugins facade or an error naming the missing capability.
    pub fn plugins(&self) -> SurfaceResult<&Arc<dyn PluginsApi>> {
        self.plugins
            .as_ref()
            .ok_or_else(|| SurfaceError::Unavailable("plugins".into()))
    }
}
