use crate::cli::core::{CommandError, CommandResult, ShellContext};
use crate::cli::io;
use crate::cli::output::section as output_section;
use crate::cli::registry::CommandEntry;

pub const PROFILE_VERBS: [&str; 6] = ["create", "delete", "list", "rename", "set", "setdefault"];

const USAGE: &str = "profile [list|create <name>|delete <name>|set <name>|setdefault <name>|rename <old> <new>]";

pub(crate) fn definitions() -> Vec<CommandEntry> {
    vec![CommandEntry::new("profile", "Manage profiles", USAGE, cmd_profile)]
}

fn cmd_profile(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let Some(verb) = args.first().map(|verb| verb.to_lowercase()) else {
        io::print_info(format!(
            "Active profile: {}",
            context.client.get_active_profile_name()
        ));
        return Ok(());
    };

    match (verb.as_str(), &args[1..]) {
        ("list", []) => list_profiles(context),
        ("create", [name]) => {
            let profile = context.client.create_profile(name)?;
            io::print_success(format!("Profile '{}' created.", profile.name));
            Ok(())
        }
        ("delete", [name]) => {
            io::print_warning("This will delete the profile and all of its files. It can't be undone.");
            if !context.confirm(&format!("Really delete profile '{name}'?"))? {
                io::print_info("Operation cancelled.");
                return Ok(());
            }
            context.client.delete_profile(name)?;
            io::print_success(format!("Profile '{name}' has been deleted."));
            Ok(())
        }
        ("set", [name]) => {
            let active = context.client.activate_profile(name)?;
            io::print_success(format!("Active profile is now '{active}'."));
            Ok(())
        }
        ("setdefault", [name]) => {
            context.client.set_default_profile(name)?;
            io::print_success(format!("Profile '{name}' will be loaded on startup."));
            Ok(())
        }
        ("rename", [old, new]) => {
            context.client.rename_profile(old, new)?;
            io::print_success(format!("Profile '{old}' renamed to '{new}'."));
            Ok(())
        }
        _ => Err(CommandError::Usage(USAGE)),
    }
}

fn list_profiles(context: &ShellContext) -> CommandResult {
    let active = context.client.get_active_profile_name();
    output_section("Profiles");
    for profile in context.client.get_profiles() {
        let mut tags = Vec::new();
        if profile.isdefault {
            tags.push("default");
        }
        if profile.name == active {
            tags.push("active");
        }
        if tags.is_empty() {
            io::print_info(format!("  {}", profile.name));
        } else {
            io::print_info(format!("  {} ({})", profile.name, tags.join(", ")));
        }
    }
    Ok(())
}
