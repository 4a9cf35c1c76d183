//! Hook callback types
//!
//! Hooks are named extension points. A plugin contributes a callback per
//! hook name; the host invokes all callbacks bound to a hook sequentially,
//! threading the payload through them.

use crate::error::PluginError;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Future returned by a hook callback.
pub type HookFuture = Pin<Box<dyn Future<Output = Result<Option<Value>, PluginError>> + Send>>;

/// A hook callback.
///
/// Receives the current payload. Returning `Ok(Some(value))` replaces the
/// payload for the next callback in the pipeline; `Ok(None)` leaves it
/// unchanged. An `Err` is isolated by the host: it is logged and reported,
/// and the pipeline continues with the payload as it was before this call.
pub type HookFn = Arc<dyn Fn(Value) -> HookFuture + Send + Sync>;

/// A hook contribution declared by a plugin.
#[derive(Clone)]
pub struct HookSpec {
    /// Hook name, e.g. `"player:levelUp"` or a custom name
    pub name: String,
    /// Callback to run when the hook fires
    pub callback: HookFn,
}

impl HookSpec {
    /// Build a hook spec from a closure returning the new payload (or `None`
    /// to leave it unchanged).
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Value>, PluginError>> + Send + 'static,
    {
        let f = Arc::new(f);
        Self {
            name: name.into(),
            callback: Arc::new(move |payload| {
                let f = f.clone();
                Box::pin(async move { f(payload).await })
            }),
        }
    }
}

impl std::fmt::Debug for HookSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookSpec").field("name", &self.name).finish()
    }
}
