//! PluginHost - owns the plugin lifecycle state machine
//!
//! Single entry point external code calls. Wires the loader, resolver,
//! sandbox and registries together. All mutable state lives behind one
//! `RwLock` that is never held across an await; plugin code runs with no
//! host lock held, on instances checked out of the table for the duration
//! of the call.

use libloading::Library;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use tokio::sync::{broadcast, watch};

use async_trait::async_trait;
use modforge_plugin_api::{
    CommandArgs, Plugin, PluginDescriptor, PluginStatus, PluginsApi, SurfaceError, SurfaceResult,
    Timers,
};

use crate::catalog::Catalog;
use crate::commands::{self, CommandInfo, CommandTable};
use crate::error::{HostError, LifecyclePhase};
use crate::events::{HostEvent, HostEvents};
use crate::hooks::{self, HookRegistry};
use crate::loader::{Loader, PluginSource};
use crate::registry::StartupRegistry;
use crate::resolver;
use crate::sandbox::{self, HostSurface};

/// Capabilities every plugin is expected to declare. Missing ones are
/// logged as warnings at load time, never fatal.
const REQUIRED_PERMISSIONS: &[&str] = &["read.game_state", "write.game_state"];

/// Lifecycle state of a loaded plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    /// Loaded but never enabled; bindings are registered and inactive
    Loaded,
    /// Bindings active, lifecycle hooks firing
    Enabled,
    /// Previously enabled, bindings inactive but still in place
    Disabled,
}

/// A loaded plugin with its runtime state.
struct PluginRecord {
    descriptor: Arc<PluginDescriptor>,
    state: PluginState,
    /// Checked out (`None`) while one of its own lifecycle methods runs
    instance: Option<Box<dyn Plugin>>,
    /// Handle to the plugin's timers, cancelled on unload
    timers: Timers,
    /// Declared before `_library` must not be: the instance drops first
    _library: Option<Library>,
}

/// Configuration for [`PluginHost`].
pub struct HostConfig {
    /// Root for per-plugin persistent stores; `None` keeps storage in memory
    pub data_dir: Option<PathBuf>,
    /// Startup registry file; defaults to `<data_dir>/registry.toml`
    pub registry_path: Option<PathBuf>,
    /// Capacity of the host event channel
    pub event_capacity: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir().map(|d| d.join("modforge")),
            registry_path: None,
            event_capacity: 256,
        }
    }
}

impl HostConfig {
    /// Config with no filesystem footprint. Used by ephemeral hosts and tests.
    pub fn in_memory() -> Self {
        Self {
            data_dir: None,
            registry_path: None,
            event_capacity: 256,
        }
    }
}

/// Host metrics snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostMetrics {
    pub loaded: usize,
    pub enabled: usize,
    pub hooks: usize,
    pub bindings: usize,
    pub commands: usize,
    pub uptime_seconds: i64,
}

/// Everything mutable, behind a single lock.
struct HostState {
    records: HashMap<String, PluginRecord>,
    hooks: HookRegistry,
    commands: CommandTable,
    catalog: Catalog,
}

type LoadResult = Option<Result<(), String>>;

/// The plugin host.
///
/// Constructed as an `Arc` because loading re-enters the host: dependency
/// resolution and the `plugins` capability facade both call back in.
pub struct PluginHost {
    loader: Loader,
    surface: HostSurface,
    events: HostEvents,
    data_dir: Option<PathBuf>,
    registry_path: Option<PathBuf>,
    started_at: chrono::DateTime<chrono::Utc>,
    state: RwLock<HostState>,
    /// In-flight loads by id; concurrent callers await the shared result
    inflight: Mutex<HashMap<String, watch::Receiver<LoadResult>>>,
}

impl PluginHost {
    /// Create a host over the given plugin source and application surface.
    pub fn new(config: HostConfig, source: Box<dyn PluginSource>, surface: HostSurface) -> Arc<Self> {
        let registry_path = config.registry_path.or_else(|| {
            config
                .data_dir
                .as_ref()
                .map(|dir| dir.join("registry.toml"))
        });

        Arc::new(Self {
            loader: Loader::new(source),
            surface,
            events: HostEvents::new(config.event_capacity),
            data_dir: config.data_dir,
            registry_path,
            started_at: chrono::Utc::now(),
            state: RwLock::new(HostState {
                records: HashMap::new(),
                hooks: HookRegistry::with_builtin_hooks(),
                commands: CommandTable::new(),
                catalog: Catalog::new(),
            }),
            inflight: Mutex::new(HashMap::new()),
        })
    }

    /// Subscribe to host notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.events.subscribe()
    }

    // ─── Lifecycle ───────────────────────────────────────────────────

    /// Load a plugin and its dependencies. No-op if already loaded.
    ///
    /// Concurrent calls for the same id share one load: exactly one
    /// instance is constructed and one `PluginLoaded` event emitted.
    pub async fn load_plugin(self: &Arc<Self>, id: &str) -> Result<(), HostError> {
        self.clone().load_chained(id.to_string(), Vec::new()).await
    }

    /// Boxed so dependency resolution can recurse through the host.
    fn load_chained(
        self: Arc<Self>,
        id: String,
        chain: Vec<String>,
    ) -> Pin<Box<dyn Future<Output = Result<(), HostError>> + Send>> {
        Box::pin(async move {
            if self.is_loaded(&id) {
                return Ok(());
            }
            if chain.contains(&id) {
                return Err(HostError::LoadFailed {
                    id: id.clone(),
                    reason: format!("dependency cycle: {} -> {id}", chain.join(" -> ")),
                });
            }

            enum Role {
                Leader(watch::Sender<LoadResult>),
                Follower(watch::Receiver<LoadResult>),
            }

            let role = {
                let mut inflight = self.inflight_lock();
                if let Some(rx) = inflight.get(&id) {
                    Role::Follower(rx.clone())
                } else {
                    let (tx, rx) = watch::channel(None);
                    inflight.insert(id.clone(), rx);
                    Role::Leader(tx)
                }
            };

            match role {
                Role::Follower(mut rx) => loop {
                    let settled = rx.borrow_and_update().clone();
                    if let Some(result) = settled {
                        return result.map_err(|reason| HostError::LoadFailed {
                            id: id.clone(),
                            reason,
                        });
                    }
                    if rx.changed().await.is_err() {
                        return Err(HostError::LoadFailed {
                            id,
                            reason: "load abandoned".to_string(),
                        });
                    }
                },
                Role::Leader(tx) => {
                    // evicts the in-flight entry even if this future is
                    // dropped mid-load, so later callers can lead a fresh load
                    let clear = InflightClear {
                        host: self.clone(),
                        id: id.clone(),
                    };
                    let result = self.do_load(&id, chain).await;
                    if let Err(e) = &result {
                        tracing::error!(plugin = %id, error = %e, "Plugin load failed");
                        self.events.emit(HostEvent::PluginError {
                            id: id.clone(),
                            message: e.to_string(),
                        });
                    }
                    let shared = result.as_ref().map(|_| ()).map_err(|e| e.to_string());
                    drop(clear);
                    let _ = tx.send(Some(shared));
                    result
                }
            }
        })
    }

    async fn do_load(self: &Arc<Self>, id: &str, chain: Vec<String>) -> Result<(), HostError> {
        let descriptor = self.loader.load_descriptor(id).await?;

        let host = self.clone();
        let mut next_chain = chain;
        next_chain.push(id.to_string());
        resolver::resolve(
            id,
            &descriptor.dependencies,
            |dep| self.version_of(dep),
            |dep| host.clone().load_chained(dep, next_chain.clone()),
        )
        .await?;

        for permission in REQUIRED_PERMISSIONS {
            if !descriptor.permissions.iter().any(|p| p == permission) {
                tracing::warn!(
                    plugin = %id,
                    permission = %permission,
                    "Plugin does not declare a required permission"
                );
            }
        }

        let factory = self.loader.load_factory(&descriptor).await?;

        let plugins_api: Arc<dyn PluginsApi> = Arc::new(HostPluginsApi {
            host: Arc::downgrade(self),
        });
        let surface = sandbox::build_surface(
            id,
            &self.surface,
            Some(plugins_api),
            self.data_dir.as_deref(),
        )
        .map_err(|e| HostError::LoadFailed {
            id: id.to_string(),
            reason: e.to_string(),
        })?;
        let timers = surface.timers.clone();

        let (instance, library) = factory.build(surface);

        // register contributions while the plugin starts out inactive
        let hook_specs = instance.hooks();
        let command_specs = instance.commands();
        {
            let mut state = self.state_write();
            for spec in &hook_specs {
                state.hooks.bind(&spec.name, id, spec.callback.clone());
            }
            state.hooks.set_owner_disabled(id, true);
            for spec in &command_specs {
                state
                    .commands
                    .register(id, &spec.name, &spec.description, spec.handler.clone());
            }
            state.commands.set_owner_disabled(id, true);
            state.catalog.add(descriptor.clone());
        }

        let (instance, init_result) = self
            .run_lifecycle(id, LifecyclePhase::Initialize, instance)
            .await;

        let rollback = |host: &PluginHost| {
            let mut state = host.state_write();
            state.hooks.remove_owner(id);
            state.commands.remove_owner(id);
            state.catalog.remove(id);
            timers.cancel_all();
        };

        if let Err(e) = init_result {
            rollback(self);
            return Err(e);
        }
        let Some(instance) = instance else {
            rollback(self);
            return Err(HostError::LoadFailed {
                id: id.to_string(),
                reason: "instance lost during initialize".to_string(),
            });
        };

        self.state_write().records.insert(
            id.to_string(),
            PluginRecord {
                descriptor: descriptor.clone(),
                state: PluginState::Loaded,
                instance: Some(instance),
                timers,
                _library: library,
            },
        );

        tracing::info!(plugin = %id, version = %descriptor.version, "Plugin loaded");
        self.events.emit(HostEvent::PluginLoaded {
            id: id.to_string(),
            version: descriptor.version.clone(),
        });
        Ok(())
    }

    /// Enable a loaded plugin: activate its bindings and fire `on_enable`.
    ///
    /// Returns `Ok(false)` if the plugin is not loaded or already enabled.
    /// A failing `on_enable` leaves the plugin in its prior state.
    pub async fn enable_plugin(&self, id: &str) -> Result<bool, HostError> {
        let instance = {
            let mut state = self.state_write();
            let instance = match state.records.get_mut(id) {
                Some(record) if record.state != PluginState::Enabled => record.instance.take(),
                _ => None,
            };
            let Some(instance) = instance else {
                return Ok(false);
            };
            state.hooks.set_owner_disabled(id, false);
            state.commands.set_owner_disabled(id, false);
            instance
        };

        let (instance, result) = self
            .run_lifecycle(id, LifecyclePhase::Enable, instance)
            .await;

        {
            let mut state = self.state_write();
            if let Some(record) = state.records.get_mut(id) {
                record.instance = instance;
                if result.is_ok() {
                    record.state = PluginState::Enabled;
                }
            }
            if result.is_err() {
                state.hooks.set_owner_disabled(id, true);
                state.commands.set_owner_disabled(id, true);
            }
        }

        match result {
            Ok(()) => {
                tracing::info!(plugin = %id, "Plugin enabled");
                Ok(true)
            }
            Err(e) => {
                self.events.emit(HostEvent::PluginError {
                    id: id.to_string(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Disable an enabled plugin: deactivate its bindings in place and fire
    /// `on_disable`. Returns `Ok(false)` if the plugin is not enabled.
    pub async fn disable_plugin(&self, id: &str) -> Result<bool, HostError> {
        let instance = {
            let mut state = self.state_write();
            let instance = match state.records.get_mut(id) {
                Some(record) if record.state == PluginState::Enabled => record.instance.take(),
                _ => None,
            };
            let Some(instance) = instance else {
                return Ok(false);
            };
            state.hooks.set_owner_disabled(id, true);
            state.commands.set_owner_disabled(id, true);
            instance
        };

        let (instance, result) = self
            .run_lifecycle(id, LifecyclePhase::Disable, instance)
            .await;

        {
            let mut state = self.state_write();
            if let Some(record) = state.records.get_mut(id) {
                record.instance = instance;
                if result.is_ok() {
                    record.state = PluginState::Disabled;
                }
            }
            if result.is_err() {
                state.hooks.set_owner_disabled(id, false);
                state.commands.set_owner_disabled(id, false);
            }
        }

        match result {
            Ok(()) => {
                tracing::info!(plugin = %id, "Plugin disabled");
                Ok(true)
            }
            Err(e) => {
                self.events.emit(HostEvent::PluginError {
                    id: id.to_string(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Unload a plugin: disable it if enabled, fire `cleanup`, remove every
    /// binding, catalog entry and timer it owns.
    ///
    /// A failing `on_disable` or `cleanup` aborts the unload: the error
    /// surfaces to the caller and the plugin stays registered in its prior
    /// state, bindings intact.
    pub async fn unload_plugin(&self, id: &str) -> Result<(), HostError> {
        if !self.is_loaded(id) {
            return Err(HostError::NotLoaded { id: id.to_string() });
        }

        if self.is_enabled(id) {
            self.disable_plugin(id).await?;
        }

        let instance = {
            let mut state = self.state_write();
            state.records.get_mut(id).and_then(|r| r.instance.take())
        };
        if let Some(instance) = instance {
            let (instance, result) = self
                .run_lifecycle(id, LifecyclePhase::Cleanup, instance)
                .await;
            if let Err(e) = result {
                {
                    let mut state = self.state_write();
                    if let Some(record) = state.records.get_mut(id) {
                        record.instance = instance;
                    }
                }
                self.events.emit(HostEvent::PluginError {
                    id: id.to_string(),
                    message: e.to_string(),
                });
                return Err(e);
            }
        }

        let record = {
            let mut state = self.state_write();
            state.hooks.remove_owner(id);
            state.commands.remove_owner(id);
            state.catalog.remove(id);
            state.records.remove(id)
        };
        if let Some(record) = record {
            record.timers.cancel_all();
        }

        tracing::info!(plugin = %id, "Plugin unloaded");
        self.events.emit(HostEvent::PluginUnloaded { id: id.to_string() });
        Ok(())
    }

    /// Reload a plugin from source: unload, drop the cached descriptor,
    /// load again, and restore the enabled state it had before.
    pub async fn reload_plugin(self: &Arc<Self>, id: &str) -> Result<(), HostError> {
        let was_enabled = self.is_enabled(id);
        if self.is_loaded(id) {
            self.unload_plugin(id).await?;
        }
        self.loader.invalidate(Some(id));
        self.load_plugin(id).await?;
        if was_enabled {
            self.enable_plugin(id).await?;
        }
        Ok(())
    }

    /// Tear the host down: unload every plugin, best-effort. A plugin whose
    /// lifecycle code fails is logged and evicted anyway, with its timers
    /// cancelled, so nothing keeps running after shutdown returns.
    pub async fn shutdown(&self) {
        let ids: Vec<String> = {
            let state = self.state_read();
            state.records.keys().cloned().collect()
        };

        for id in &ids {
            if let Err(e) = self.unload_plugin(id).await {
                tracing::warn!(plugin = %id, error = %e, "Plugin resisted shutdown, evicting");
                let record = {
                    let mut state = self.state_write();
                    state.hooks.remove_owner(id);
                    state.commands.remove_owner(id);
                    state.catalog.remove(id);
                    state.records.remove(id)
                };
                if let Some(record) = record {
                    record.timers.cancel_all();
                }
                self.events.emit(HostEvent::PluginUnloaded { id: id.clone() });
            }
        }

        tracing::info!(plugins = ids.len(), "Host shut down");
    }

    /// Run one plugin lifecycle method on its own task so a panic inside
    /// plugin code is contained. The instance comes back unless it panicked.
    async fn run_lifecycle(
        &self,
        id: &str,
        phase: LifecyclePhase,
        mut instance: Box<dyn Plugin>,
    ) -> (Option<Box<dyn Plugin>>, Result<(), HostError>) {
        let joined = tokio::spawn(async move {
            let result = match phase {
                LifecyclePhase::Initialize => instance.initialize().await,
                LifecyclePhase::Enable => instance.on_enable().await,
                LifecyclePhase::Disable => instance.on_disable().await,
                LifecyclePhase::Cleanup => instance.cleanup().await,
            };
            (instance, result)
        })
        .await;

        match joined {
            Ok((instance, Ok(()))) => (Some(instance), Ok(())),
            Ok((instance, Err(e))) => (
                Some(instance),
                Err(HostError::Lifecycle {
                    id: id.to_string(),
                    phase,
                    reason: e.to_string(),
                }),
            ),
            Err(join) => {
                let reason = if join.is_panic() {
                    "plugin panicked".to_string()
                } else {
                    join.to_string()
                };
                (
                    None,
                    Err(HostError::Lifecycle {
                        id: id.to_string(),
                        phase,
                        reason,
                    }),
                )
            }
        }
    }

    // ─── Hooks and commands ──────────────────────────────────────────

    /// Fire a hook through the pipeline and return the final payload.
    ///
    /// An undefined hook returns the payload unchanged without emitting
    /// anything.
    pub async fn invoke_hook(&self, name: &str, payload: Value) -> Value {
        let snapshot = { self.state_read().hooks.snapshot(name) };
        let Some(bindings) = snapshot else {
            return payload;
        };

        let result = hooks::run_pipeline(name, bindings, payload.clone(), &self.events).await;
        self.events.emit(HostEvent::HookExecuted {
            hook: name.to_string(),
            payload,
            result: result.clone(),
        });
        result
    }

    /// Define a custom hook ahead of time, with a description.
    pub fn define_hook(&self, name: &str, description: &str) {
        self.state_write().hooks.define(name, description);
    }

    /// Dispatch a namespaced command (`/{plugin}/{command}`).
    pub async fn dispatch_command(
        &self,
        path: &str,
        args: CommandArgs,
    ) -> Result<String, modforge_plugin_api::PluginError> {
        let handler = { self.state_read().commands.handler(path) }?;
        handler(args).await
    }

    /// Parse and dispatch a raw command line.
    pub async fn dispatch_command_line(
        &self,
        line: &str,
    ) -> Result<String, modforge_plugin_api::PluginError> {
        let (path, args) = commands::parse_command_line(line)?;
        self.dispatch_command(&path, args).await
    }

    /// All registered commands.
    pub fn list_commands(&self) -> Vec<CommandInfo> {
        self.state_read().commands.list()
    }

    // ─── Queries ─────────────────────────────────────────────────────

    pub fn is_loaded(&self, id: &str) -> bool {
        self.state_read().records.contains_key(id)
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.state_read()
            .records
            .get(id)
            .is_some_and(|r| r.state == PluginState::Enabled)
    }

    /// Lifecycle state of a loaded plugin.
    pub fn plugin_state(&self, id: &str) -> Option<PluginState> {
        self.state_read().records.get(id).map(|r| r.state)
    }

    /// Descriptor of a loaded plugin.
    pub fn descriptor(&self, id: &str) -> Option<Arc<PluginDescriptor>> {
        self.state_read().records.get(id).map(|r| r.descriptor.clone())
    }

    fn version_of(&self, id: &str) -> Option<String> {
        self.state_read()
            .records
            .get(id)
            .map(|r| r.descriptor.version.clone())
    }

    /// Status of all loaded plugins, sorted by id.
    pub fn list(&self) -> Vec<PluginStatus> {
        let state = self.state_read();
        let mut statuses: Vec<PluginStatus> = state
            .records
            .values()
            .map(|r| PluginStatus {
                id: r.descriptor.id.clone(),
                name: r.descriptor.name.clone(),
                version: r.descriptor.version.clone(),
                enabled: r.state == PluginState::Enabled,
            })
            .collect();
        statuses.sort_by(|a, b| a.id.cmp(&b.id));
        statuses
    }

    /// Catalog search over id, name, description and author.
    pub fn search(&self, query: &str) -> Vec<Arc<PluginDescriptor>> {
        self.state_read().catalog.search(query)
    }

    pub fn plugins_by_category(&self, category: &str) -> Vec<Arc<PluginDescriptor>> {
        self.state_read().catalog.by_category(category)
    }

    pub fn plugins_by_tag(&self, tag: &str) -> Vec<Arc<PluginDescriptor>> {
        self.state_read().catalog.by_tag(tag)
    }

    pub fn plugins_by_author(&self, author: &str) -> Vec<Arc<PluginDescriptor>> {
        self.state_read().catalog.by_author(author)
    }

    /// Counts and uptime.
    pub fn metrics(&self) -> HostMetrics {
        let state = self.state_read();
        HostMetrics {
            loaded: state.records.len(),
            enabled: state
                .records
                .values()
                .filter(|r| r.state == PluginState::Enabled)
                .count(),
            hooks: state.hooks.hook_count(),
            bindings: state.hooks.binding_count(),
            commands: state.commands.len(),
            uptime_seconds: (chrono::Utc::now() - self.started_at).num_seconds(),
        }
    }

    // ─── Startup registry ────────────────────────────────────────────

    /// Load and enable every plugin in the startup registry. Failures are
    /// logged and skipped; returns the number of plugins brought up.
    pub async fn load_startup_plugins(self: &Arc<Self>) -> Result<usize, HostError> {
        let Some(path) = self.registry_path.clone() else {
            return Ok(0);
        };
        let registry = StartupRegistry::load(&path)?;

        let mut count = 0;
        for id in registry.ids() {
            match self.load_plugin(id).await {
                Ok(()) => {
                    if let Err(e) = self.enable_plugin(id).await {
                        tracing::warn!(plugin = %id, error = %e, "Startup plugin failed to enable");
                    } else {
                        count += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(plugin = %id, error = %e, "Startup plugin failed to load");
                }
            }
        }
        Ok(count)
    }

    /// Add a plugin id to the persisted startup registry.
    pub fn add_startup_plugin(&self, id: &str) -> Result<(), HostError> {
        let Some(path) = self.registry_path.clone() else {
            return Err(HostError::Registry("no registry path configured".to_string()));
        };
        let mut registry = StartupRegistry::load(&path)?;
        registry.add(id);
        registry.save(&path)
    }

    /// Remove a plugin id from the persisted startup registry.
    pub fn remove_startup_plugin(&self, id: &str) -> Result<(), HostError> {
        let Some(path) = self.registry_path.clone() else {
            return Err(HostError::Registry("no registry path configured".to_string()));
        };
        let mut registry = StartupRegistry::load(&path)?;
        registry.remove(id);
        registry.save(&path)
    }

    /// Path of the startup registry file, when one is configured.
    pub fn registry_path(&self) -> Option<&Path> {
        self.registry_path.as_deref()
    }

    // ─── Lock helpers ────────────────────────────────────────────────

    // A poisoned lock means a panic while holding it; plugin code never
    // runs under these locks, so the state is still coherent.

    fn state_read(&self) -> RwLockReadGuard<'_, HostState> {
        match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn state_write(&self) -> RwLockWriteGuard<'_, HostState> {
        match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn inflight_lock(&self) -> MutexGuard<'_, HashMap<String, watch::Receiver<LoadResult>>> {
        match self.inflight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Removes a plugin's in-flight load entry when dropped. Held by the load
/// leader across `do_load` so an abandoned load never wedges the entry.
struct InflightClear {
    host: Arc<PluginHost>,
    id: String,
}

impl Drop for InflightClear {
    fn drop(&mut self) {
        self.host.inflight_lock().remove(&self.id);
    }
}

/// The `plugins` capability facade, backed by a live host.
///
/// Holds a `Weak` so a plugin keeping its surface alive past unload cannot
/// keep the whole host alive with it.
struct HostPluginsApi {
    host: Weak<PluginHost>,
}

impl HostPluginsApi {
    fn host(&self) -> SurfaceResult<Arc<PluginHost>> {
        self.host
            .upgrade()
            .ok_or_else(|| SurfaceError::Unavailable("plugins".to_string()))
    }
}

#[async_trait]
impl PluginsApi for HostPluginsApi {
    fn list(&self) -> Vec<PluginStatus> {
        self.host.upgrade().map(|h| h.list()).unwrap_or_default()
    }

    fn is_loaded(&self, id: &str) -> bool {
        self.host.upgrade().is_some_and(|h| h.is_loaded(id))
    }

    fn is_enabled(&self, id: &str) -> bool {
        self.host.upgrade().is_some_and(|h| h.is_enabled(id))
    }

    async fn load(&self, id: &str) -> SurfaceResult<()> {
        let host = self.host()?;
        host.load_plugin(id)
            .await
            .map_err(|e| SurfaceError::failed(e.to_string()))
    }

    async fn unload(&self, id: &str) -> SurfaceResult<()> {
        let host = self.host()?;
        host.unload_plugin(id)
            .await
            .map_err(|e| SurfaceError::failed(e.to_string()))
    }

    async fn reload(&self, id: &str) -> SurfaceResult<()> {
        let host = self.host()?;
        host.reload_plugin(id)
            .await
            .map_err(|e| SurfaceError::failed(e.to_string()))
    }

    async fn enable(&self, id: &str) -> SurfaceResult<bool> {
        let host = self.host()?;
        host.enable_plugin(id)
            .await
            .map_err(|e| SurfaceError::failed(e.to_string()))
    }

    async fn disable(&self, id: &str) -> SurfaceResult<bool> {
        let host = self.host()?;
        host.disable_plugin(id)
            .await
            .map_err(|e| SurfaceError::failed(e.to_string()))
    }

    async fn invoke_hook(&self, name: &str, payload: Value) -> Value {
        match self.host.upgrade() {
            Some(host) => host.invoke_hook(name, payload).await,
            None => payload,
        }
    }

    async fn dispatch_command(&self, command: &str, args: CommandArgs) -> SurfaceResult<String> {
        let host = self.host()?;
        host.dispatch_command(command, args)
            .await
            .map_err(|e| SurfaceError::failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::StaticSource;
    use serde_json::json;

    struct Quiet;
    impl Plugin for Quiet {}

    fn host_with(ids: &[&str]) -> Arc<PluginHost> {
        let source = StaticSource::new();
        for id in ids {
            source.register(
                json!({ "id": id, "name": "Quiet", "version": "1.0.0" }),
                |_surface| Box::new(Quiet) as Box<dyn Plugin>,
            );
        }
        PluginHost::new(
            HostConfig::in_memory(),
            Box::new(source),
            HostSurface::default(),
        )
    }

    #[tokio::test]
    async fn load_is_idempotent() {
        let host = host_with(&["a"]);
        host.load_plugin("a").await.unwrap();
        host.load_plugin("a").await.unwrap();
        assert_eq!(host.metrics().loaded, 1);
    }

    #[tokio::test]
    async fn fresh_plugin_starts_not_enabled() {
        let host = host_with(&["a"]);
        host.load_plugin("a").await.unwrap();
        assert_eq!(host.plugin_state("a"), Some(PluginState::Loaded));
        assert!(!host.is_enabled("a"));
    }

    #[tokio::test]
    async fn enable_disable_state_machine() {
        let host = host_with(&["a"]);
        host.load_plugin("a").await.unwrap();

        assert!(host.enable_plugin("a").await.unwrap());
        assert!(!host.enable_plugin("a").await.unwrap());
        assert_eq!(host.plugin_state("a"), Some(PluginState::Enabled));

        assert!(host.disable_plugin("a").await.unwrap());
        assert!(!host.disable_plugin("a").await.unwrap());
        assert_eq!(host.plugin_state("a"), Some(PluginState::Disabled));
    }

    #[tokio::test]
    async fn enable_unknown_plugin_is_a_quiet_no_op() {
        let host = host_with(&[]);
        assert!(!host.enable_plugin("ghost").await.unwrap());
    }

    #[tokio::test]
    async fn unload_unknown_plugin_errors() {
        let host = host_with(&[]);
        let err = host.unload_plugin("ghost").await.unwrap_err();
        assert!(matches!(err, HostError::NotLoaded { .. }));
    }

    #[tokio::test]
    async fn dependency_cycle_is_detected() {
        let source = StaticSource::new();
        source.register(
            json!({
                "id": "a", "name": "A", "version": "1.0.0",
                "dependencies": [{ "id": "b", "version": "1.0.0" }],
            }),
            |_surface| Box::new(Quiet) as Box<dyn Plugin>,
        );
        source.register(
            json!({
                "id": "b", "name": "B", "version": "1.0.0",
                "dependencies": [{ "id": "a", "version": "1.0.0" }],
            }),
            |_surface| Box::new(Quiet) as Box<dyn Plugin>,
        );
        let host = PluginHost::new(
            HostConfig::in_memory(),
            Box::new(source),
            HostSurface::default(),
        );

        let err = host.load_plugin("a").await.unwrap_err();
        assert!(err.to_string().contains("cycle"));
        assert!(!host.is_loaded("a"));
        assert!(!host.is_loaded("b"));
    }

    #[tokio::test]
    async fn undefined_hook_returns_payload_unchanged() {
        let host = host_with(&[]);
        let payload = json!({ "x": 1 });
        let out = host.invoke_hook("nobody:home", payload.clone()).await;
        assert_eq!(out, payload);
    }

    #[tokio::test]
    async fn metrics_count_hooks_and_plugins() {
        let host = host_with(&["a"]);
        host.load_plugin("a").await.unwrap();
        host.enable_plugin("a").await.unwrap();

        let metrics = host.metrics();
        assert_eq!(metrics.loaded, 1);
        assert_eq!(metrics.enabled, 1);
        assert_eq!(metrics.hooks, crate::hooks::BUILTIN_HOOKS.len());
        assert!(metrics.uptime_seconds >= 0);
    }

    #[tokio::test]
    async fn shutdown_unloads_every_plugin() {
        let host = host_with(&["a", "b"]);
        host.load_plugin("a").await.unwrap();
        host.load_plugin("b").await.unwrap();
        host.enable_plugin("a").await.unwrap();

        host.shutdown().await;

        let metrics = host.metrics();
        assert_eq!(metrics.loaded, 0);
        assert_eq!(metrics.bindings, 0);
        assert_eq!(metrics.commands, 0);
        assert!(host.list().is_empty());
    }
}
