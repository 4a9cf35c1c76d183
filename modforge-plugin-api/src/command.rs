//! Command types
//!
//! Commands registered by a plugin are namespaced by the host as
//! `/{plugin-id}/{command-name}` so two plugins can never collide.

use crate::error::PluginError;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Arguments passed to a command handler.
#[derive(Debug, Default, Clone)]
pub struct CommandArgs {
    /// Positional arguments
    pub args: Vec<String>,
    /// Named flags (`--flag=value` or `--flag value`)
    pub flags: HashMap<String, String>,
}

impl CommandArgs {
    /// Positional argument at `index`, if present.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Value of a named flag, if present.
    pub fn flag(&self, name: &str) -> Option<&str> {
        self.flags.get(name).map(String::as_str)
    }
}

/// Future returned by a command handler.
pub type CommandFuture = Pin<Box<dyn Future<Output = Result<String, PluginError>> + Send>>;

/// A command handler. Returns the command's output text.
pub type CommandHandler = Arc<dyn Fn(CommandArgs) -> CommandFuture + Send + Sync>;

/// A command contributed by a plugin.
#[derive(Clone)]
pub struct CommandSpec {
    /// Command name within the plugin's namespace
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Handler invoked on dispatch
    pub handler: CommandHandler,
}

impl CommandSpec {
    /// Build a command spec from an async closure.
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        F: Fn(CommandArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, PluginError>> + Send + 'static,
    {
        let f = Arc::new(f);
        Self {
            name: name.into(),
            description: description.into(),
            handler: Arc::new(move |args| {
                let f = f.clone();
                Box::pin(async move { f(args).await })
            }),
        }
    }
}

impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}
