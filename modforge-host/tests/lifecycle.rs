//! End-to-end lifecycle tests over an in-memory plugin source.

use async_trait::async_trait;
use modforge_host::{
    HostConfig, HostError, HostEvent, HostSurface, LifecyclePhase, PluginHost, PluginSource,
    PluginState, StaticSource,
};
use modforge_plugin_api::{
    CapabilitySurface, CommandSpec, HookSpec, Plugin, PluginDescriptor, PluginError,
};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;

type Journal = Arc<Mutex<Vec<String>>>;

fn push(journal: &Journal, entry: impl Into<String>) {
    journal.lock().unwrap().push(entry.into());
}

fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

/// Test plugin that records construction and every lifecycle call, appends
/// a label to the `test:chain` hook payload, and answers a `ping` command.
struct Recorder {
    id: String,
    label: Option<&'static str>,
    fail_hook: bool,
    fail_phase: Option<&'static str>,
    journal: Journal,
}

impl Recorder {
    fn factory(
        id: &'static str,
        label: Option<&'static str>,
        fail_hook: bool,
        fail_phase: Option<&'static str>,
        journal: Journal,
    ) -> impl Fn(CapabilitySurface) -> Box<dyn Plugin> + Send + Sync + 'static {
        move |_surface| {
            push(&journal, format!("{id}:new"));
            Box::new(Recorder {
                id: id.to_string(),
                label,
                fail_hook,
                fail_phase,
                journal: journal.clone(),
            }) as Box<dyn Plugin>
        }
    }

    fn refuse(&self, phase: &'static str) -> Result<(), PluginError> {
        if self.fail_phase == Some(phase) {
            return Err(PluginError::custom(format!("{phase} refused")));
        }
        Ok(())
    }
}

#[async_trait]
impl Plugin for Recorder {
    fn hooks(&self) -> Vec<HookSpec> {
        if self.fail_hook {
            return vec![HookSpec::new("test:chain", |_payload| async move {
                Err(PluginError::custom("hook failed"))
            })];
        }
        let Some(label) = self.label else {
            return Vec::new();
        };
        vec![HookSpec::new("test:chain", move |payload: Value| async move {
            let mut items = payload.as_array().cloned().unwrap_or_default();
            items.push(json!(label));
            Ok(Some(Value::Array(items)))
        })]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        let id = self.id.clone();
        vec![CommandSpec::new("ping", "Replies with a pong", move |_args| {
            let id = id.clone();
            async move { Ok(format!("pong from {id}")) }
        })]
    }

    async fn initialize(&mut self) -> Result<(), PluginError> {
        push(&self.journal, format!("{}:initialize", self.id));
        self.refuse("initialize")
    }

    async fn on_enable(&mut self) -> Result<(), PluginError> {
        push(&self.journal, format!("{}:on_enable", self.id));
        self.refuse("on_enable")
    }

    async fn on_disable(&mut self) -> Result<(), PluginError> {
        push(&self.journal, format!("{}:on_disable", self.id));
        self.refuse("on_disable")
    }

    async fn cleanup(&mut self) -> Result<(), PluginError> {
        push(&self.journal, format!("{}:cleanup", self.id));
        self.refuse("cleanup")
    }
}

fn descriptor(id: &str, version: &str, deps: &[(&str, &str)]) -> Value {
    let deps: Vec<Value> = deps
        .iter()
        .map(|(id, version)| json!({ "id": id, "version": version }))
        .collect();
    json!({
        "id": id,
        "name": format!("{id} plugin"),
        "version": version,
        "permissions": ["read.game_state", "write.game_state"],
        "dependencies": deps,
    })
}

/// Forwards to a shared `StaticSource` so tests keep a handle for fetch
/// counts after the host takes ownership of the source.
struct SharedSource(Arc<StaticSource>);

#[async_trait]
impl PluginSource for SharedSource {
    async fn fetch_descriptor(&self, id: &str) -> Result<Value, HostError> {
        self.0.fetch_descriptor(id).await
    }
    async fn fetch_factory(
        &self,
        descriptor: &PluginDescriptor,
    ) -> Result<modforge_host::PluginFactory, HostError> {
        self.0.fetch_factory(descriptor).await
    }
}

fn host_over(source: Arc<StaticSource>) -> Arc<PluginHost> {
    PluginHost::new(
        HostConfig::in_memory(),
        Box::new(SharedSource(source)),
        HostSurface::default(),
    )
}

#[tokio::test]
async fn concurrent_loads_share_one_instance() {
    let journal: Journal = Default::default();
    let source = Arc::new(StaticSource::new());
    source.register(
        descriptor("solo", "1.0.0", &[]),
        Recorder::factory("solo", None, false, None, journal.clone()),
    );
    let host = host_over(source);
    let mut rx = host.subscribe();

    let (a, b) = tokio::join!(host.load_plugin("solo"), host.load_plugin("solo"));
    a.unwrap();
    b.unwrap();

    let constructions = entries(&journal)
        .iter()
        .filter(|e| *e == "solo:new")
        .count();
    assert_eq!(constructions, 1);

    let mut loaded_events = 0;
    loop {
        match rx.try_recv() {
            Ok(HostEvent::PluginLoaded { id, .. }) if id == "solo" => loaded_events += 1,
            Ok(_) => {}
            Err(TryRecvError::Empty) => break,
            Err(e) => panic!("event channel: {e}"),
        }
    }
    assert_eq!(loaded_events, 1);
}

#[tokio::test]
async fn dependencies_load_first_and_satisfy_version_constraints() {
    let journal: Journal = Default::default();
    let source = Arc::new(StaticSource::new());
    source.register(
        descriptor("core", "1.2.0", &[]),
        Recorder::factory("core", None, false, None, journal.clone()),
    );
    source.register(
        descriptor("dependent", "0.1.0", &[("core", "1.0.0")]),
        Recorder::factory("dependent", None, false, None, journal.clone()),
    );
    let host = host_over(source);

    host.load_plugin("dependent").await.unwrap();

    assert!(host.is_loaded("core"));
    assert!(host.is_loaded("dependent"));
    let log = entries(&journal);
    let core_pos = log.iter().position(|e| e == "core:new").unwrap();
    let dep_pos = log.iter().position(|e| e == "dependent:new").unwrap();
    assert!(core_pos < dep_pos);
}

#[tokio::test]
async fn newer_already_loaded_dependency_satisfies_the_constraint() {
    let journal: Journal = Default::default();
    let source = Arc::new(StaticSource::new());
    source.register(
        descriptor("core", "1.2.0", &[]),
        Recorder::factory("core", None, false, None, journal.clone()),
    );
    source.register(
        descriptor("chat-logger", "1.0.0", &[("core", "1.0.0")]),
        Recorder::factory("chat-logger", None, false, None, journal.clone()),
    );
    let host = host_over(source);

    host.load_plugin("core").await.unwrap();
    host.load_plugin("chat-logger").await.unwrap();

    assert!(host.is_loaded("chat-logger"));
    // the already loaded core was not constructed a second time
    let core_constructions = entries(&journal)
        .iter()
        .filter(|e| *e == "core:new")
        .count();
    assert_eq!(core_constructions, 1);
}

#[tokio::test]
async fn too_old_dependency_aborts_the_load_naming_both_versions() {
    let journal: Journal = Default::default();
    let source = Arc::new(StaticSource::new());
    source.register(
        descriptor("core", "0.9.0", &[]),
        Recorder::factory("core", None, false, None, journal.clone()),
    );
    source.register(
        descriptor("dependent", "0.1.0", &[("core", "2.0.0")]),
        Recorder::factory("dependent", None, false, None, journal.clone()),
    );
    let host = host_over(source);

    let err = host.load_plugin("dependent").await.unwrap_err();
    match err {
        HostError::DependencyVersion {
            plugin,
            dependency,
            installed,
            required,
        } => {
            assert_eq!(plugin, "dependent");
            assert_eq!(dependency, "core");
            assert_eq!(installed, "0.9.0");
            assert_eq!(required, "2.0.0");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!host.is_loaded("dependent"));
    // the dependent left nothing behind
    assert!(!entries(&journal).contains(&"dependent:new".to_string()));
}

#[tokio::test]
async fn hook_pipeline_preserves_registration_order_across_disable() {
    let journal: Journal = Default::default();
    let source = Arc::new(StaticSource::new());
    for (id, label) in [("a", "A"), ("b", "B"), ("c", "C")] {
        source.register(
            descriptor(id, "1.0.0", &[]),
            Recorder::factory(id, Some(label), false, None, journal.clone()),
        );
    }
    let host = host_over(source);
    for id in ["a", "b", "c"] {
        host.load_plugin(id).await.unwrap();
        host.enable_plugin(id).await.unwrap();
    }

    assert_eq!(
        host.invoke_hook("test:chain", json!([])).await,
        json!(["A", "B", "C"])
    );

    host.disable_plugin("b").await.unwrap();
    assert_eq!(
        host.invoke_hook("test:chain", json!([])).await,
        json!(["A", "C"])
    );

    // re-enabling restores the original position, not the end of the line
    host.enable_plugin("b").await.unwrap();
    assert_eq!(
        host.invoke_hook("test:chain", json!([])).await,
        json!(["A", "B", "C"])
    );
}

#[tokio::test]
async fn failing_hook_is_isolated_and_reported() {
    let journal: Journal = Default::default();
    let source = Arc::new(StaticSource::new());
    source.register(
        descriptor("a", "1.0.0", &[]),
        Recorder::factory("a", Some("A"), false, None, journal.clone()),
    );
    source.register(
        descriptor("b", "1.0.0", &[]),
        Recorder::factory("b", None, true, None, journal.clone()),
    );
    source.register(
        descriptor("c", "1.0.0", &[]),
        Recorder::factory("c", Some("C"), false, None, journal.clone()),
    );
    let host = host_over(source);
    for id in ["a", "b", "c"] {
        host.load_plugin(id).await.unwrap();
        host.enable_plugin(id).await.unwrap();
    }
    let mut rx = host.subscribe();

    let result = host.invoke_hook("test:chain", json!([])).await;
    assert_eq!(result, json!(["A", "C"]));

    let mut hook_errors = 0;
    let mut executed = 0;
    loop {
        match rx.try_recv() {
            Ok(HostEvent::HookError { hook, plugin, .. }) => {
                assert_eq!(hook, "test:chain");
                assert_eq!(plugin, "b");
                hook_errors += 1;
            }
            Ok(HostEvent::HookExecuted { hook, result, .. }) => {
                assert_eq!(hook, "test:chain");
                assert_eq!(result, json!(["A", "C"]));
                executed += 1;
            }
            Ok(_) => {}
            Err(TryRecvError::Empty) => break,
            Err(e) => panic!("event channel: {e}"),
        }
    }
    assert_eq!(hook_errors, 1);
    assert_eq!(executed, 1);
}

#[tokio::test]
async fn unload_disables_then_cleans_up_and_removes_bindings() {
    let journal: Journal = Default::default();
    let source = Arc::new(StaticSource::new());
    source.register(
        descriptor("x", "1.0.0", &[]),
        Recorder::factory("x", Some("X"), false, None, journal.clone()),
    );
    let host = host_over(source);
    host.load_plugin("x").await.unwrap();
    host.enable_plugin("x").await.unwrap();

    host.unload_plugin("x").await.unwrap();

    let log = entries(&journal);
    let disable_pos = log.iter().position(|e| e == "x:on_disable").unwrap();
    let cleanup_pos = log.iter().position(|e| e == "x:cleanup").unwrap();
    assert!(disable_pos < cleanup_pos);

    assert!(!host.is_loaded("x"));
    assert_eq!(host.metrics().bindings, 0);
    assert!(host.list_commands().is_empty());
    assert_eq!(host.invoke_hook("test:chain", json!([])).await, json!([]));
}

#[tokio::test]
async fn reload_restores_enabled_state_with_a_fresh_fetch() {
    let journal: Journal = Default::default();
    let source = Arc::new(StaticSource::new());
    source.register(
        descriptor("x", "1.0.0", &[]),
        Recorder::factory("x", Some("X"), false, None, journal.clone()),
    );
    let host = host_over(source.clone());

    host.load_plugin("x").await.unwrap();
    host.enable_plugin("x").await.unwrap();
    assert_eq!(source.descriptor_fetches("x"), 1);

    host.reload_plugin("x").await.unwrap();

    assert_eq!(host.plugin_state("x"), Some(PluginState::Enabled));
    assert_eq!(source.descriptor_fetches("x"), 2);
    let constructions = entries(&journal)
        .iter()
        .filter(|e| *e == "x:new")
        .count();
    assert_eq!(constructions, 2);
    assert_eq!(
        host.invoke_hook("test:chain", json!([])).await,
        json!(["X"])
    );
}

#[tokio::test]
async fn commands_are_namespaced_and_follow_enabled_state() {
    let journal: Journal = Default::default();
    let source = Arc::new(StaticSource::new());
    source.register(
        descriptor("alpha", "1.0.0", &[]),
        Recorder::factory("alpha", None, false, None, journal.clone()),
    );
    source.register(
        descriptor("beta", "1.0.0", &[]),
        Recorder::factory("beta", None, false, None, journal.clone()),
    );
    let host = host_over(source);
    for id in ["alpha", "beta"] {
        host.load_plugin(id).await.unwrap();
        host.enable_plugin(id).await.unwrap();
    }

    assert_eq!(
        host.dispatch_command_line("/alpha/ping").await.unwrap(),
        "pong from alpha"
    );
    assert_eq!(
        host.dispatch_command_line("/beta/ping").await.unwrap(),
        "pong from beta"
    );

    host.disable_plugin("alpha").await.unwrap();
    assert!(host.dispatch_command_line("/alpha/ping").await.is_err());
    assert_eq!(
        host.dispatch_command_line("/beta/ping").await.unwrap(),
        "pong from beta"
    );
}

#[tokio::test]
async fn failed_initialize_rolls_back_every_registration() {
    let journal: Journal = Default::default();
    let source = Arc::new(StaticSource::new());
    source.register(
        descriptor("broken", "1.0.0", &[]),
        Recorder::factory("broken", Some("B"), false, Some("initialize"), journal.clone()),
    );
    let host = host_over(source);
    let mut rx = host.subscribe();

    let err = host.load_plugin("broken").await.unwrap_err();
    assert!(matches!(
        err,
        HostError::Lifecycle {
            phase: LifecyclePhase::Initialize,
            ..
        }
    ));

    // nothing of the plugin survives the rollback
    assert!(!host.is_loaded("broken"));
    assert_eq!(host.metrics().bindings, 0);
    assert!(host.list_commands().is_empty());
    assert!(host.search("broken").is_empty());
    assert_eq!(host.invoke_hook("test:chain", json!([])).await, json!([]));

    let mut error_events = 0;
    loop {
        match rx.try_recv() {
            Ok(HostEvent::PluginError { id, .. }) if id == "broken" => error_events += 1,
            Ok(_) => {}
            Err(TryRecvError::Empty) => break,
            Err(e) => panic!("event channel: {e}"),
        }
    }
    assert_eq!(error_events, 1);
}

#[tokio::test]
async fn failed_enable_leaves_the_plugin_loaded_and_inactive() {
    let journal: Journal = Default::default();
    let source = Arc::new(StaticSource::new());
    source.register(
        descriptor("wobbly", "1.0.0", &[]),
        Recorder::factory("wobbly", Some("W"), false, Some("on_enable"), journal.clone()),
    );
    let host = host_over(source);
    host.load_plugin("wobbly").await.unwrap();

    let err = host.enable_plugin("wobbly").await.unwrap_err();
    assert!(matches!(
        err,
        HostError::Lifecycle {
            phase: LifecyclePhase::Enable,
            ..
        }
    ));

    assert_eq!(host.plugin_state("wobbly"), Some(PluginState::Loaded));
    assert_eq!(host.invoke_hook("test:chain", json!([])).await, json!([]));
}

#[tokio::test]
async fn failing_cleanup_aborts_the_unload() {
    let journal: Journal = Default::default();
    let source = Arc::new(StaticSource::new());
    source.register(
        descriptor("sticky", "1.0.0", &[]),
        Recorder::factory("sticky", Some("S"), false, Some("cleanup"), journal.clone()),
    );
    let host = host_over(source);
    host.load_plugin("sticky").await.unwrap();
    host.enable_plugin("sticky").await.unwrap();

    let err = host.unload_plugin("sticky").await.unwrap_err();
    assert!(matches!(
        err,
        HostError::Lifecycle {
            phase: LifecyclePhase::Cleanup,
            ..
        }
    ));

    // the disable happened, but the plugin and its bindings are still there
    assert!(host.is_loaded("sticky"));
    assert_eq!(host.plugin_state("sticky"), Some(PluginState::Disabled));
    assert_eq!(host.metrics().bindings, 1);
    assert!(!host.list_commands().is_empty());
}

#[tokio::test]
async fn failing_on_disable_aborts_the_unload() {
    let journal: Journal = Default::default();
    let source = Arc::new(StaticSource::new());
    source.register(
        descriptor("clingy", "1.0.0", &[]),
        Recorder::factory("clingy", Some("C"), false, Some("on_disable"), journal.clone()),
    );
    let host = host_over(source);
    host.load_plugin("clingy").await.unwrap();
    host.enable_plugin("clingy").await.unwrap();

    let err = host.unload_plugin("clingy").await.unwrap_err();
    assert!(matches!(
        err,
        HostError::Lifecycle {
            phase: LifecyclePhase::Disable,
            ..
        }
    ));

    // the plugin keeps its prior state and its hooks keep running
    assert_eq!(host.plugin_state("clingy"), Some(PluginState::Enabled));
    assert_eq!(
        host.invoke_hook("test:chain", json!([])).await,
        json!(["C"])
    );
}

#[tokio::test]
async fn shutdown_evicts_a_plugin_whose_cleanup_fails() {
    let journal: Journal = Default::default();
    let source = Arc::new(StaticSource::new());
    source.register(
        descriptor("tidy", "1.0.0", &[]),
        Recorder::factory("tidy", Some("T"), false, None, journal.clone()),
    );
    source.register(
        descriptor("messy", "1.0.0", &[]),
        Recorder::factory("messy", None, false, Some("cleanup"), journal.clone()),
    );
    let host = host_over(source);
    for id in ["tidy", "messy"] {
        host.load_plugin(id).await.unwrap();
        host.enable_plugin(id).await.unwrap();
    }

    host.shutdown().await;

    assert!(host.list().is_empty());
    assert_eq!(host.metrics().bindings, 0);
    assert!(host.list_commands().is_empty());
}

/// Stalls the first descriptor fetch forever so a caller can abandon it.
struct StallingSource {
    inner: Arc<StaticSource>,
    stall_next: AtomicBool,
}

#[async_trait]
impl PluginSource for StallingSource {
    async fn fetch_descriptor(&self, id: &str) -> Result<Value, HostError> {
        if self.stall_next.swap(false, Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.inner.fetch_descriptor(id).await
    }
    async fn fetch_factory(
        &self,
        descriptor: &PluginDescriptor,
    ) -> Result<modforge_host::PluginFactory, HostError> {
        self.inner.fetch_factory(descriptor).await
    }
}

#[tokio::test(start_paused = true)]
async fn abandoned_load_does_not_wedge_later_callers() {
    let journal: Journal = Default::default();
    let source = Arc::new(StaticSource::new());
    source.register(
        descriptor("slow", "1.0.0", &[]),
        Recorder::factory("slow", None, false, None, journal.clone()),
    );
    let host = PluginHost::new(
        HostConfig::in_memory(),
        Box::new(StallingSource {
            inner: source,
            stall_next: AtomicBool::new(true),
        }),
        HostSurface::default(),
    );

    // the first load stalls in the source and gets dropped at the timeout
    let abandoned = tokio::time::timeout(Duration::from_millis(10), host.load_plugin("slow")).await;
    assert!(abandoned.is_err());

    host.load_plugin("slow").await.unwrap();
    assert!(host.is_loaded("slow"));
}

#[tokio::test]
async fn hooks_of_a_loaded_but_never_enabled_plugin_stay_inactive() {
    let journal: Journal = Default::default();
    let source = Arc::new(StaticSource::new());
    source.register(
        descriptor("x", "1.0.0", &[]),
        Recorder::factory("x", Some("X"), false, None, journal.clone()),
    );
    let host = host_over(source);
    host.load_plugin("x").await.unwrap();

    assert_eq!(host.invoke_hook("test:chain", json!([])).await, json!([]));
    host.enable_plugin("x").await.unwrap();
    assert_eq!(
        host.invoke_hook("test:chain", json!([])).await,
        json!(["X"])
    );
}
