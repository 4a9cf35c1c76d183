//! Sandbox: builds the per-plugin capability surface
//!
//! The host application contributes facade implementations through
//! [`HostSurface`]; absent facades stay absent on the plugin's surface.
//! Every facade handed to a plugin is wrapped so failed calls are logged
//! under the plugin's id before the error is returned to the plugin.

use modforge_plugin_api::{
    AnalyticsApi, CapabilitySurface, ChatApi, GameApi, I18nApi, MenuItem, NoticeLevel, PlayerApi,
    PluginError, PluginLog, PluginStore, PluginsApi, SurfaceResult, Timers, UiApi, Utils, WorldApi,
};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// Facade implementations the host application provides.
///
/// Everything is optional. A plugin calling into a facade the application
/// did not provide gets `SurfaceError::Unavailable`.
#[derive(Default, Clone)]
pub struct HostSurface {
    pub game: Option<Arc<dyn GameApi>>,
    pub ui: Option<Arc<dyn UiApi>>,
    pub player: Option<Arc<dyn PlayerApi>>,
    pub world: Option<Arc<dyn WorldApi>>,
    pub chat: Option<Arc<dyn ChatApi>>,
    pub analytics: Option<Arc<dyn AnalyticsApi>>,
    pub i18n: Option<Arc<dyn I18nApi>>,
}

/// Build the surface a single plugin sees.
///
/// When `data_dir` is given the plugin's persistent store lives at
/// `<data_dir>/<id>/store.toml`; otherwise storage is in-memory only.
pub fn build_surface(
    plugin_id: &str,
    host: &HostSurface,
    plugins: Option<Arc<dyn PluginsApi>>,
    data_dir: Option<&Path>,
) -> Result<CapabilitySurface, PluginError> {
    let store = match data_dir {
        Some(dir) => PluginStore::load(&dir.join(plugin_id).join("store.toml"))?,
        None => PluginStore::in_memory(),
    };

    Ok(CapabilitySurface {
        game: host.game.clone().map(|f| guard(plugin_id, "game", f) as Arc<dyn GameApi>),
        ui: host.ui.clone().map(|f| guard(plugin_id, "ui", f) as Arc<dyn UiApi>),
        player: host
            .player
            .clone()
            .map(|f| guard(plugin_id, "player", f) as Arc<dyn PlayerApi>),
        world: host
            .world
            .clone()
            .map(|f| guard(plugin_id, "world", f) as Arc<dyn WorldApi>),
        chat: host.chat.clone().map(|f| guard(plugin_id, "chat", f) as Arc<dyn ChatApi>),
        analytics: host
            .analytics
            .clone()
            .map(|f| guard(plugin_id, "analytics", f) as Arc<dyn AnalyticsApi>),
        i18n: host.i18n.clone().map(|f| guard(plugin_id, "i18n", f) as Arc<dyn I18nApi>),
        plugins,
        log: PluginLog::new(plugin_id),
        timers: Timers::new(),
        utils: Arc::new(Utils::new(store)),
    })
}

fn guard<T: ?Sized>(plugin_id: &str, facade: &'static str, inner: Arc<T>) -> Arc<Guard<T>> {
    Arc::new(Guard {
        plugin_id: plugin_id.to_string(),
        facade,
        inner,
    })
}

/// Delegating wrapper that logs failed calls under the owning plugin.
struct Guard<T: ?Sized> {
    plugin_id: String,
    facade: &'static str,
    inner: Arc<T>,
}

impl<T: ?Sized> Guard<T> {
    fn call<V>(&self, method: &'static str, result: SurfaceResult<V>) -> SurfaceResult<V> {
        if let Err(e) = &result {
            tracing::warn!(
                plugin = %self.plugin_id,
                facade = %self.facade,
                method = %method,
                error = %e,
                "Capability call failed"
            );
        }
        result
    }
}

impl GameApi for Guard<dyn GameApi> {
    fn state(&self) -> SurfaceResult<Value> {
        self.call("state", self.inner.state())
    }
    fn settings(&self) -> SurfaceResult<Value> {
        self.call("settings", self.inner.settings())
    }
    fn save(&self) -> SurfaceResult<()> {
        self.call("save", self.inner.save())
    }
    fn load(&self, slot: &str) -> SurfaceResult<()> {
        self.call("load", self.inner.load(slot))
    }
    fn notify(&self, message: &str, level: NoticeLevel) -> SurfaceResult<()> {
        self.call("notify", self.inner.notify(message, level))
    }
}

impl UiApi for Guard<dyn UiApi> {
    fn show_dialog(&self, title: &str, content: &str) -> SurfaceResult<()> {
        self.call("show_dialog", self.inner.show_dialog(title, content))
    }
    fn close_dialog(&self) -> SurfaceResult<()> {
        self.call("close_dialog", self.inner.close_dialog())
    }
    fn set_hud_visible(&self, visible: bool) -> SurfaceResult<()> {
        self.call("set_hud_visible", self.inner.set_hud_visible(visible))
    }
    fn refresh_hud(&self) -> SurfaceResult<()> {
        self.call("refresh_hud", self.inner.refresh_hud())
    }
    fn add_menu_item(&self, item: MenuItem) -> SurfaceResult<()> {
        self.call("add_menu_item", self.inner.add_menu_item(item))
    }
    fn remove_menu_item(&self, id: &str) -> SurfaceResult<()> {
        self.call("remove_menu_item", self.inner.remove_menu_item(id))
    }
}

impl PlayerApi for Guard<dyn PlayerApi> {
    fn level(&self) -> SurfaceResult<u32> {
        self.call("level", self.inner.level())
    }
    fn experience(&self) -> SurfaceResult<u64> {
        self.call("experience", self.inner.experience())
    }
    fn add_experience(&self, amount: u64) -> SurfaceResult<()> {
        self.call("add_experience", self.inner.add_experience(amount))
    }
    fn health(&self) -> SurfaceResult<i32> {
        self.call("health", self.inner.health())
    }
    fn set_health(&self, health: i32) -> SurfaceResult<()> {
        self.call("set_health", self.inner.set_health(health))
    }
    fn inventory(&self) -> SurfaceResult<Value> {
        self.call("inventory", self.inner.inventory())
    }
    fn has_item(&self, item_id: &str) -> SurfaceResult<bool> {
        self.call("has_item", self.inner.has_item(item_id))
    }
    fn item_count(&self, item_id: &str) -> SurfaceResult<u32> {
        self.call("item_count", self.inner.item_count(item_id))
    }
    fn give_item(&self, item: Value) -> SurfaceResult<()> {
        self.call("give_item", self.inner.give_item(item))
    }
    fn take_item(&self, item_id: &str) -> SurfaceResult<()> {
        self.call("take_item", self.inner.take_item(item_id))
    }
}

impl WorldApi for Guard<dyn WorldApi> {
    fn location(&self) -> SurfaceResult<String> {
        self.call("location", self.inner.location())
    }
    fn time(&self) -> SurfaceResult<i64> {
        self.call("time", self.inner.time())
    }
    fn set_time(&self, time: i64) -> SurfaceResult<()> {
        self.call("set_time", self.inner.set_time(time))
    }
    fn is_daytime(&self) -> SurfaceResult<bool> {
        self.call("is_daytime", self.inner.is_daytime())
    }
    fn npcs(&self) -> SurfaceResult<Value> {
        self.call("npcs", self.inner.npcs())
    }
    fn spawn_object(&self, kind: &str, position: Value) -> SurfaceResult<String> {
        self.call("spawn_object", self.inner.spawn_object(kind, position))
    }
    fn remove_entity(&self, entity_id: &str) -> SurfaceResult<()> {
        self.call("remove_entity", self.inner.remove_entity(entity_id))
    }
}

impl ChatApi for Guard<dyn ChatApi> {
    fn send_message(&self, channel: &str, message: &str) -> SurfaceResult<()> {
        self.call("send_message", self.inner.send_message(channel, message))
    }
}

impl AnalyticsApi for Guard<dyn AnalyticsApi> {
    fn track_event(&self, event: &str, properties: Value) -> SurfaceResult<()> {
        self.call("track_event", self.inner.track_event(event, properties))
    }
    fn track_metric(&self, metric: &str, value: f64) -> SurfaceResult<()> {
        self.call("track_metric", self.inner.track_metric(metric, value))
    }
    fn set_user_property(&self, property: &str, value: &str) -> SurfaceResult<()> {
        self.call("set_user_property", self.inner.set_user_property(property, value))
    }
}

impl I18nApi for Guard<dyn I18nApi> {
    fn translate(&self, key: &str, params: &Value) -> SurfaceResult<String> {
        self.call("translate", self.inner.translate(key, params))
    }
    fn language(&self) -> SurfaceResult<String> {
        self.call("language", self.inner.language())
    }
    fn set_language(&self, language: &str) -> SurfaceResult<()> {
        self.call("set_language", self.inner.set_language(language))
    }
}
