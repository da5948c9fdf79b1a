//! Terminal prompts, plus short names for the styled output helpers.

use std::fmt;

use dialoguer::{theme::ColorfulTheme, Confirm, Password};

use crate::cli::core::CommandError;
use crate::cli::output;

pub use crate::cli::output::{
    apply_config, error as print_error, info as print_info, success as print_success,
    warning as print_warning,
};

pub fn print_hint(message: impl fmt::Display) {
    output::info(format!("Hint: {message}"));
}

/// Yes/no question. Escape or Ctrl-C counts as "no".
pub fn confirm_action(
    theme: &ColorfulTheme,
    prompt: &str,
    default: bool,
) -> Result<bool, CommandError> {
    let answer = Confirm::with_theme(theme)
        .with_prompt(prompt)
        .default(default)
        .interact_opt()?;
    Ok(answer.unwrap_or(false))
}

/// Reads a password without echo. Empty answers are allowed so the server
/// decides what to do with them.
pub fn prompt_secret(theme: &ColorfulTheme, prompt: &str) -> Result<String, CommandError> {
    Password::with_theme(theme)
        .with_prompt(prompt)
        .allow_empty_password(true)
        .interact()
        .map_err(CommandError::from)
}
