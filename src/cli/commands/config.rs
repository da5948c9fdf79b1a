use anselus_config::Config;

use crate::cli::core::{CommandError, CommandResult, ShellContext};
use crate::cli::io;
use crate::cli::registry::CommandEntry;

const USAGE: &str = "config [show|get <key>|set <key> <value>|reset]";

pub(crate) fn definitions() -> Vec<CommandEntry> {
    vec![CommandEntry::new(
        "config",
        "View and change client preferences",
        USAGE,
        cmd_config,
    )]
}

fn cmd_config(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let action = args.first().map(|action| action.to_lowercase());
    match (action.as_deref(), args.get(1..).unwrap_or_default()) {
        (None, _) | (Some("show"), []) => context.show_config(),
        (Some("get"), [key]) => {
            let key = key.to_lowercase();
            let value = context
                .client
                .config()
                .entries()
                .into_iter()
                .find_map(|(name, value)| (name == key).then_some(value))
                .ok_or_else(|| {
                    CommandError::InvalidArguments(format!(
                        "unknown key `{key}`; valid keys are {}",
                        Config::KEYS.join(", ")
                    ))
                })?;
            io::print_info(format!("{key} = {value}"));
            Ok(())
        }
        (Some("set"), [key, value @ ..]) if !value.is_empty() => {
            let value = value.join(" ");
            context.set_config_value(key, value.trim())
        }
        (Some("reset"), []) => {
            if !context.confirm("Restore every preference to its default?")? {
                io::print_info("Operation cancelled.");
                return Ok(());
            }
            context.replace_config(Config::default())
        }
        _ => Err(CommandError::Usage(USAGE)),
    }
}
