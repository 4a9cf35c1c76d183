//! Hook registry and invocation pipeline
//!
//! Bindings for a hook name keep registration order for the life of the
//! process: disabling never reorders, re-enabling never moves a binding to
//! the end. Invocation is strictly sequential and threads the payload
//! through each enabled callback in turn; a failing callback is isolated
//! and reported, never fatal to the pipeline.

use crate::events::{HostEvent, HostEvents};
use modforge_plugin_api::HookFn;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Fixed hook catalog registered at host bootstrap. Plugins and callers may
/// also bind arbitrary custom names, defined lazily on first use.
pub const BUILTIN_HOOKS: &[(&str, &str)] = &[
    ("game:start", "Called when the game starts"),
    ("game:pause", "Called when the game is paused"),
    ("game:resume", "Called when the game is resumed"),
    ("game:save", "Called when the game is saved"),
    ("game:load", "Called when the game is loaded"),
    ("game:stop", "Called when the game stops"),
    ("player:login", "Called when a player logs in"),
    ("player:logout", "Called when a player logs out"),
    ("player:levelUp", "Called when a player levels up"),
    ("player:death", "Called when a player dies"),
    ("player:spawn", "Called when a player spawns"),
    ("ui:menu:open", "Called when a menu is opened"),
    ("ui:menu:close", "Called when a menu is closed"),
    ("ui:dialog:show", "Called when a dialog is shown"),
    ("ui:dialog:hide", "Called when a dialog is hidden"),
    ("item:pickup", "Called when an item is picked up"),
    ("item:use", "Called when an item is used"),
    ("item:drop", "Called when an item is dropped"),
    ("item:craft", "Called when an item is crafted"),
    ("quest:start", "Called when a quest starts"),
    ("quest:complete", "Called when a quest is completed"),
    ("quest:fail", "Called when a quest fails"),
    ("combat:start", "Called when combat starts"),
    ("combat:end", "Called when combat ends"),
    ("combat:damage", "Called when damage is dealt"),
    ("combat:heal", "Called when healing occurs"),
    ("chat:message", "Called when a chat message is sent"),
    ("chat:command", "Called when a chat command is used"),
    ("system:tick", "Called every game tick"),
    ("system:render", "Called during rendering"),
    ("system:update", "Called during update loop"),
    ("system:error", "Called when an error occurs"),
];

/// One callback attached to a hook.
pub struct HookBinding {
    /// Plugin that owns this binding
    pub owner: String,
    /// The callback itself
    pub callback: HookFn,
    /// Disabled bindings stay in place and are skipped during invocation
    pub disabled: bool,
}

struct HookDefinition {
    description: String,
    bindings: Vec<HookBinding>,
}

/// Ordered multi-subscriber hook table.
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<String, HookDefinition>,
}

impl HookRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with [`BUILTIN_HOOKS`].
    pub fn with_builtin_hooks() -> Self {
        let mut registry = Self::new();
        for (name, description) in BUILTIN_HOOKS {
            registry.define(name, description);
        }
        registry
    }

    /// Define a hook. No-op if the name is already known.
    pub fn define(&mut self, name: &str, description: &str) {
        self.hooks
            .entry(name.to_string())
            .or_insert_with(|| HookDefinition {
                description: description.to_string(),
                bindings: Vec::new(),
            });
    }

    /// Whether a hook name is defined.
    pub fn is_defined(&self, name: &str) -> bool {
        self.hooks.contains_key(name)
    }

    /// Description of a defined hook.
    pub fn description(&self, name: &str) -> Option<&str> {
        self.hooks.get(name).map(|h| h.description.as_str())
    }

    /// Append a binding, auto-defining unknown hooks. Append-only:
    /// registration order is invocation order.
    pub fn bind(&mut self, name: &str, owner: &str, callback: HookFn) {
        if !self.is_defined(name) {
            self.define(name, &format!("Custom hook: {name}"));
        }
        if let Some(hook) = self.hooks.get_mut(name) {
            hook.bindings.push(HookBinding {
                owner: owner.to_string(),
                callback,
                disabled: false,
            });
        }
    }

    /// Remove the first binding whose callback is the same `Arc` as
    /// `callback`. No-op if not found.
    pub fn unbind(&mut self, name: &str, callback: &HookFn) {
        if let Some(hook) = self.hooks.get_mut(name) {
            if let Some(pos) = hook
                .bindings
                .iter()
                .position(|b| Arc::ptr_eq(&b.callback, callback))
            {
                hook.bindings.remove(pos);
            }
        }
    }

    /// Flip the disabled flag on the given owner's bindings for one hook.
    /// Bindings stay at their original positions.
    pub fn set_disabled(&mut self, name: &str, owner: &str, disabled: bool) {
        if let Some(hook) = self.hooks.get_mut(name) {
            for binding in hook.bindings.iter_mut().filter(|b| b.owner == owner) {
                binding.disabled = disabled;
            }
        }
    }

    /// Flip the disabled flag on all of an owner's bindings, on every hook.
    pub fn set_owner_disabled(&mut self, owner: &str, disabled: bool) {
        for hook in self.hooks.values_mut() {
            for binding in hook.bindings.iter_mut().filter(|b| b.owner == owner) {
                binding.disabled = disabled;
            }
        }
    }

    /// Remove every binding owned by `owner`. Hook definitions remain.
    pub fn remove_owner(&mut self, owner: &str) {
        for hook in self.hooks.values_mut() {
            hook.bindings.retain(|b| b.owner != owner);
        }
    }

    /// Whether any binding owned by `owner` exists.
    pub fn has_owner(&self, owner: &str) -> bool {
        self.hooks
            .values()
            .any(|h| h.bindings.iter().any(|b| b.owner == owner))
    }

    /// Total number of bindings across all hooks.
    pub fn binding_count(&self) -> usize {
        self.hooks.values().map(|h| h.bindings.len()).sum()
    }

    /// Number of defined hooks.
    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    /// Enabled bindings for a hook, in registration order. `None` when the
    /// hook is undefined.
    pub fn snapshot(&self, name: &str) -> Option<Vec<(String, HookFn)>> {
        self.hooks.get(name).map(|hook| {
            hook.bindings
                .iter()
                .filter(|b| !b.disabled)
                .map(|b| (b.owner.clone(), b.callback.clone()))
                .collect()
        })
    }
}

/// Run a snapshot of enabled bindings sequentially, threading the payload.
///
/// Each callback runs in its own task so a panic is contained exactly like
/// an `Err`: logged, reported as a [`HostEvent::HookError`], and the
/// pipeline continues with the payload as of before the failing call.
pub async fn run_pipeline(
    hook: &str,
    bindings: Vec<(String, HookFn)>,
    payload: Value,
    events: &HostEvents,
) -> Value {
    let mut current = payload;

    for (owner, callback) in bindings {
        let fut = callback(current.clone());
        match tokio::spawn(fut).await {
            Ok(Ok(Some(next))) => current = next,
            Ok(Ok(None)) => {}
            Ok(Err(e)) => {
                tracing::warn!(hook = %hook, plugin = %owner, error = %e, "Hook callback failed");
                events.emit(HostEvent::HookError {
                    hook: hook.to_string(),
                    plugin: owner,
                    message: e.to_string(),
                });
            }
            Err(join) => {
                let message = if join.is_panic() {
                    "hook callback panicked".to_string()
                } else {
                    join.to_string()
                };
                tracing::error!(hook = %hook, plugin = %owner, "{message}");
                events.emit(HostEvent::HookError {
                    hook: hook.to_string(),
                    plugin: owner,
                    message,
                });
            }
        }
    }

    current
}
