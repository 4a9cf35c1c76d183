//! Host notifications
//!
//! Everything externally observable about the runtime is published here:
//! lifecycle transitions, load failures, and hook pipeline activity.
//! Consumers (UI toasts, analytics, logs) subscribe to the broadcast
//! channel; the host never waits on them.

use serde_json::Value;
use tokio::sync::broadcast;

/// Notification published by the plugin host.
#[derive(Debug, Clone)]
pub enum HostEvent {
    /// A plugin finished loading
    PluginLoaded { id: String, version: String },
    /// A plugin was unloaded and all its bindings removed
    PluginUnloaded { id: String },
    /// A fatal lifecycle failure; mirrors the error returned to the caller
    PluginError { id: String, message: String },
    /// A hook pipeline ran to completion
    HookExecuted {
        hook: String,
        payload: Value,
        result: Value,
    },
    /// A single hook binding failed; the pipeline continued
    HookError {
        hook: String,
        plugin: String,
        message: String,
    },
}

/// Broadcast fan-out for [`HostEvent`]s.
pub struct HostEvents {
    tx: broadcast::Sender<HostEvent>,
}

impl HostEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Dropped silently when nobody is listening.
    pub fn emit(&self, event: HostEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for HostEvents {
    fn default() -> Self {
        Self::new(256)
    }
}
