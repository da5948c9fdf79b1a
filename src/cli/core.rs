//! Core CLI loop, dispatch, and shell context helpers.

use std::{
    env, io,
    path::{Path, PathBuf},
};

use anselus_config::{Config, ConfigError, ConfigManager};
use dialoguer::theme::ColorfulTheme;
use rustyline::error::ReadlineError;
use strsim::levenshtein;
use tracing::debug;

use crate::{client::AnselusClient, errors::ClientError, utils::paths};

pub use crate::errors::CliError;

use super::commands;
use super::io as cli_io;
use super::registry::{CommandEntry, CommandRegistry};
pub use super::shell_context::{CliMode, SecretOverride, ShellContext};

const SECRETS_ENV: &str = "ANSELUS_CLI_SECRETS";
const PROFILES_DIR: &str = "profiles";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopControl {
    Continue,
    Exit,
}

pub type CommandResult = Result<(), CommandError>;

impl ShellContext {
    pub fn new(mode: CliMode) -> Result<Self, CliError> {
        Self::with_base_dir(mode, paths::app_data_dir())
    }

    /// Builds a context whose config and profiles live under `base`.
    pub fn with_base_dir(mode: CliMode, base: PathBuf) -> Result<Self, CliError> {
        let mut registry = CommandRegistry::new();
        commands::register_all(&mut registry).map_err(CliError::from)?;

        let config_manager = ConfigManager::with_base_dir(base.clone())?;
        let config = config_manager.load()?;
        cli_io::apply_config(&config);
        let client = AnselusClient::new(base.join(PROFILES_DIR), config)?;
        let pwd = env::current_dir()?;
        debug!(base = %base.display(), "shell context ready");

        Ok(ShellContext {
            mode,
            registry,
            theme: ColorfulTheme::default(),
            client,
            config_manager,
            oldpwd: pwd.clone(),
            pwd,
            secret_override: secret_override_from_env(),
            running: true,
        })
    }

    pub(crate) fn dispatch(
        &mut self,
        command: &str,
        raw: &str,
        args: &[&str],
    ) -> Result<LoopControl, CommandError> {
        if let Some(handler) = self.registry.handler(command) {
            match handler(self, args) {
                Ok(()) => Ok(LoopControl::Continue),
                Err(CommandError::ExitRequested) => Ok(LoopControl::Exit),
                Err(err) => Err(err),
            }
        } else {
            self.suggest_command(raw);
            Ok(LoopControl::Continue)
        }
    }

    #[cfg(test)]
    pub(crate) fn process_line(&mut self, line: &str) -> Result<LoopControl, CommandError> {
        let tokens = match crate::cli::shell::parse_command_line(line) {
            Ok(tokens) => tokens,
            Err(err) => {
                self.print_warning(&err.to_string());
                return Ok(LoopControl::Continue);
            }
        };

        if tokens.is_empty() {
            return Ok(LoopControl::Continue);
        }

        let command = tokens[0].to_lowercase();
        let args: Vec<&str> = tokens.iter().skip(1).map(String::as_str).collect();
        self.dispatch(&command, &tokens[0], &args)
    }

    pub(crate) fn suggest_command(&self, input: &str) {
        cli_io::print_warning(format!(
            "Unknown command `{}`. Type `help` to see available commands.",
            input
        ));
        if let Some(best) = self.closest_command(input) {
            cli_io::print_info(format!("Suggestion: `{}`?", best));
        }
    }

    pub(crate) fn closest_command(&self, input: &str) -> Option<&'static str> {
        let input = input.to_lowercase();
        self.registry
            .names()
            .map(|key| (levenshtein(key, &input), key))
            .min_by_key(|(distance, _)| *distance)
            .filter(|(distance, _)| *distance <= 3)
            .map(|(_, key)| key)
    }

    pub(crate) fn command(&self, name: &str) -> Option<&CommandEntry> {
        self.registry.get(name)
    }

    pub(crate) fn confirm_exit(&self) -> Result<bool, CliError> {
        if self.mode == CliMode::Script {
            return Ok(true);
        }
        cli_io::confirm_action(&self.theme, "Exit shell?", false).map_err(CliError::from)
    }

    /// Asks a yes/no question. Scripts have no one to ask, so they proceed.
    pub(crate) fn confirm(&self, prompt: &str) -> Result<bool, CommandError> {
        if self.mode == CliMode::Script {
            return Ok(true);
        }
        cli_io::confirm_action(&self.theme, prompt, false)
    }

    /// Reads a password, from the queued secrets in script mode.
    pub(crate) fn read_secret(&self, prompt: &str) -> Result<String, CommandError> {
        if let Some(secret) = self.secret_override.as_ref().and_then(SecretOverride::pop) {
            return Ok(secret);
        }
        if self.mode == CliMode::Script {
            return Err(CommandError::InvalidArguments(format!(
                "`{prompt}` needs input; set {SECRETS_ENV} when running scripts"
            )));
        }
        cli_io::prompt_secret(&self.theme, prompt)
    }

    pub(crate) fn report_error(&self, err: CommandError) -> Result<(), CliError> {
        match err {
            CommandError::ExitRequested => Ok(()),
            CommandError::InvalidArguments(message) => {
                self.print_error(&message);
                self.print_hint("Use `help <command>` for usage details.");
                Ok(())
            }
            CommandError::Usage(usage) => {
                self.print_error(&format!("Usage: {usage}"));
                Ok(())
            }
            other => {
                self.print_error(&other.to_string());
                Ok(())
            }
        }
    }

    pub(crate) fn print_error(&self, message: &str) {
        cli_io::print_error(message);
    }

    pub(crate) fn print_warning(&self, message: &str) {
        cli_io::print_warning(message);
    }

    pub(crate) fn print_hint(&self, message: &str) {
        cli_io::print_hint(message);
    }

    pub(crate) fn show_config(&self) -> CommandResult {
        cli_io::print_info(format!(
            "Config file: {}",
            self.config_manager.config_path().display()
        ));
        for (key, value) in self.client.config().entries() {
            cli_io::print_info(format!("  {:<22} {}", key, value));
        }
        Ok(())
    }

    /// Changes one preference on disk and in the running client.
    pub(crate) fn set_config_value(&mut self, key: &str, value: &str) -> CommandResult {
        let config = self
            .config_manager
            .update(|config| config.set_value(key, value))?;
        self.use_config(config);
        Ok(())
    }

    pub(crate) fn replace_config(&mut self, config: Config) -> CommandResult {
        self.config_manager.save(&config)?;
        self.use_config(config);
        Ok(())
    }

    fn use_config(&mut self, config: Config) {
        cli_io::apply_config(&config);
        self.client.set_config(config);
        cli_io::print_success("Configuration updated.");
    }

    /// Changes the working directory, expanding a leading `~`.
    pub(crate) fn change_dir(&mut self, target: Option<&str>) -> CommandResult {
        if let Some(target) = target {
            let path = expand_home(target);
            env::set_current_dir(&path).map_err(|err| {
                CommandError::Message(format!("cannot change to {}: {err}", path.display()))
            })?;
        }
        self.oldpwd = std::mem::replace(&mut self.pwd, env::current_dir()?);
        Ok(())
    }
}

pub(crate) fn expand_home(value: &str) -> PathBuf {
    match (value.strip_prefix('~'), dirs::home_dir()) {
        (Some(rest), Some(home)) => {
            let rest = rest.trim_start_matches(['/', '\\']);
            if rest.is_empty() {
                home
            } else {
                home.join(rest)
            }
        }
        _ => Path::new(value).to_path_buf(),
    }
}

fn secret_override_from_env() -> Option<SecretOverride> {
    let raw = env::var(SECRETS_ENV).ok()?;
    let secrets = SecretOverride::default();
    for token in raw.split('|').filter(|s| !s.is_empty()) {
        secrets.push(token);
    }
    Some(secrets)
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{0}")]
    InvalidArguments(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Core(#[from] ClientError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Dialoguer(#[from] dialoguer::Error),
    #[error("exit requested")]
    ExitRequested,
}

impl From<CliError> for CommandError {
    fn from(err: CliError) -> Self {
        match err {
            CliError::Core(inner) => CommandError::Core(inner),
            CliError::Input(message) | CliError::Command(message) => {
                CommandError::InvalidArguments(message)
            }
        }
    }
}

impl From<CommandError> for CliError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::Core(inner) => CliError::Core(inner),
            other => CliError::Command(other.to_string()),
        }
    }
}

impl From<io::Error> for CliError {
    fn from(err: io::Error) -> Self {
        CliError::Command(err.to_string())
    }
}

impl From<ReadlineError> for CliError {
    fn from(err: ReadlineError) -> Self {
        CliError::Input(err.to_string())
    }
}

#[cfg(test)]
pub(crate) fn process_script(base: &Path, lines: &[&str]) -> Result<ShellContext, CliError> {
    let mut app = ShellContext::with_base_dir(CliMode::Script, base.to_path_buf())?;
    for line in lines {
        match app.process_line(line) {
            Ok(LoopControl::Continue) => {}
            Ok(LoopControl::Exit) => break,
            Err(err) => app.report_error(err)?,
        }
    }
    Ok(app)
}
