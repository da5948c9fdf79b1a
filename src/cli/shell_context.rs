use std::{cell::RefCell, collections::VecDeque, path::PathBuf};

use anselus_config::ConfigManager;
use dialoguer::theme::ColorfulTheme;

use crate::client::AnselusClient;

use super::registry::CommandRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliMode {
    Interactive,
    Script,
}

/// Queued answers for secret prompts when no terminal is attached.
#[derive(Debug, Default)]
pub struct SecretOverride {
    queue: RefCell<VecDeque<String>>,
}

impl SecretOverride {
    pub fn push(&self, secret: impl Into<String>) {
        self.queue.borrow_mut().push_back(secret.into());
    }

    pub fn pop(&self) -> Option<String> {
        self.queue.borrow_mut().pop_front()
    }
}

pub struct ShellContext {
    pub mode: CliMode,
    pub registry: CommandRegistry,
    pub theme: ColorfulTheme,
    pub client: AnselusClient,
    pub config_manager: ConfigManager,
    pub pwd: PathBuf,
    pub oldpwd: PathBuf,
    pub secret_override: Option<SecretOverride>,
    pub running: bool,
}

impl ShellContext {
    pub fn prompt(&self) -> String {
        format!("{}> ", self.client.get_active_profile_name())
    }

    pub fn profile_names(&self) -> Vec<String> {
        self.client
            .get_profiles()
            .iter()
            .map(|profile| profile.name.clone())
            .collect()
    }
}
