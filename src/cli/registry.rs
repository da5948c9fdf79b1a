use std::collections::HashMap;

use crate::cli::core::{CommandError, CommandResult};
use crate::cli::shell_context::ShellContext;

pub type CommandHandler = fn(&mut ShellContext, &[&str]) -> CommandResult;

pub struct CommandEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub usage: &'static str,
    pub aliases: &'static [&'static str],
    pub handler: CommandHandler,
}

impl CommandEntry {
    pub const fn new(
        name: &'static str,
        description: &'static str,
        usage: &'static str,
        handler: CommandHandler,
    ) -> Self {
        Self {
            name,
            description,
            usage,
            aliases: &[],
            handler,
        }
    }

    pub const fn with_aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }
}

/// Command table keyed by name, with aliases resolving to their command.
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<&'static str, CommandEntry>,
    aliases: HashMap<&'static str, &'static str>,
    order: Vec<&'static str>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a command. Names and aliases share one namespace, so a clash
    /// with anything already registered is an error.
    pub fn register(&mut self, entry: CommandEntry) -> Result<(), CommandError> {
        for key in std::iter::once(&entry.name).chain(entry.aliases.iter()) {
            if self.resolve(key).is_some() {
                return Err(CommandError::Message(format!(
                    "duplicate command name or alias `{key}`"
                )));
            }
        }
        if entry.aliases.contains(&entry.name) {
            return Err(CommandError::Message(format!(
                "command `{}` lists itself as an alias",
                entry.name
            )));
        }
        let name = entry.name;
        for alias in entry.aliases {
            self.aliases.insert(*alias, name);
        }
        self.commands.insert(name, entry);
        self.order.push(name);
        Ok(())
    }

    fn resolve(&self, name: &str) -> Option<&'static str> {
        if let Some((key, _)) = self.commands.get_key_value(name) {
            return Some(key);
        }
        self.aliases.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&CommandEntry> {
        self.resolve(name).and_then(|key| self.commands.get(key))
    }

    /// Commands sorted by name.
    pub fn list(&self) -> Vec<&CommandEntry> {
        let mut entries: Vec<_> = self
            .order
            .iter()
            .filter_map(|name| self.commands.get(name))
            .collect();
        entries.sort_by_key(|entry| entry.name);
        entries
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.order.iter().copied()
    }

    pub fn handler(&self, name: &str) -> Option<CommandHandler> {
        self.get(name).map(|entry| entry.handler)
    }
}
