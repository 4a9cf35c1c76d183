//! Slash-command table
//!
//! Commands are namespaced per plugin as `/{plugin}/{command}` so two
//! plugins can both register a `stats` command without colliding.

use modforge_plugin_api::{CommandArgs, CommandHandler, PluginError};
use std::collections::HashMap;

struct CommandEntry {
    owner: String,
    description: String,
    handler: CommandHandler,
    disabled: bool,
}

/// Registered command under its full `/{plugin}/{command}` path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInfo {
    pub path: String,
    pub owner: String,
    pub description: String,
    pub disabled: bool,
}

/// Host-wide command registry, keyed by full path.
#[derive(Default)]
pub struct CommandTable {
    commands: HashMap<String, CommandEntry>,
}

/// Full path for a plugin-owned command.
pub fn command_path(plugin: &str, command: &str) -> String {
    format!("/{plugin}/{command}")
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command. Replaces any previous registration at the same
    /// path, which can only come from the same plugin.
    pub fn register(
        &mut self,
        plugin: &str,
        command: &str,
        description: &str,
        handler: CommandHandler,
    ) -> String {
        let path = command_path(plugin, command);
        self.commands.insert(
            path.clone(),
            CommandEntry {
                owner: plugin.to_string(),
                description: description.to_string(),
                handler,
                disabled: false,
            },
        );
        path
    }

    /// Flip the disabled flag on all commands owned by `owner`.
    pub fn set_owner_disabled(&mut self, owner: &str, disabled: bool) {
        for entry in self.commands.values_mut().filter(|e| e.owner == owner) {
            entry.disabled = disabled;
        }
    }

    /// Remove all commands owned by `owner`.
    pub fn remove_owner(&mut self, owner: &str) {
        self.commands.retain(|_, e| e.owner != owner);
    }

    /// Look up an enabled handler by full path.
    pub fn handler(&self, path: &str) -> Result<CommandHandler, PluginError> {
        match self.commands.get(path) {
            Some(entry) if entry.disabled => Err(PluginError::command(format!(
                "command {path} belongs to a disabled plugin"
            ))),
            Some(entry) => Ok(entry.handler.clone()),
            None => Err(PluginError::command(format!("unknown command: {path}"))),
        }
    }

    /// All registered commands, sorted by path for stable listings.
    pub fn list(&self) -> Vec<CommandInfo> {
        let mut items: Vec<CommandInfo> = self
            .commands
            .iter()
            .map(|(path, entry)| CommandInfo {
                path: path.clone(),
                owner: entry.owner.clone(),
                description: entry.description.clone(),
                disabled: entry.disabled,
            })
            .collect();
        items.sort_by(|a, b| a.path.cmp(&b.path));
        items
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Parse a raw command line of the form `/{plugin}/{command} args... --flag=value`.
pub fn parse_command_line(line: &str) -> Result<(String, CommandArgs), PluginError> {
    let mut parts = line.split_whitespace();
    let Some(path) = parts.next() else {
        return Err(PluginError::command("empty command line"));
    };
    if !path.starts_with('/') {
        return Err(PluginError::command(format!(
            "command must start with '/': {path}"
        )));
    }

    let mut args = CommandArgs::default();
    for part in parts {
        if let Some(flag) = part.strip_prefix("--") {
            match flag.split_once('=') {
                Some((name, value)) => {
                    args.flags.insert(name.to_string(), value.to_string());
                }
                None => {
                    args.flags.insert(flag.to_string(), "true".to_string());
                }
            }
        } else {
            args.args.push(part.to_string());
        }
    }

    Ok((path.to_string(), args))
}
