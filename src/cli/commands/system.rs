use crate::cli::core::{CommandError, CommandResult, ShellContext};
use crate::cli::help;
use crate::cli::io;
use crate::cli::output::section as output_section;
use crate::cli::registry::CommandEntry;
use crate::utils::build_info;

pub(crate) fn definitions() -> Vec<CommandEntry> {
    vec![
        CommandEntry::new("version", "Show build metadata", "version", cmd_version),
        CommandEntry::new(
            "help",
            "Show help on a command",
            "help [command...]",
            cmd_help,
        )
        .with_aliases(&["?"]),
        CommandEntry::new(
            "exit",
            "Exits the shell",
            "exit",
            cmd_exit,
        )
        .with_aliases(&["x", "q"]),
    ]
}

fn cmd_version(_context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    let meta = build_info::current();
    output_section(format!("Anselus CLI {}", meta.version));
    io::print_info(format!(
        "  Build hash   : {} ({})",
        meta.git_hash, meta.git_status
    ));
    io::print_info(format!("  Built at     : {}", meta.timestamp));
    io::print_info(format!("  Target       : {}", meta.target));
    io::print_info(format!("  Profile      : {}", meta.profile));
    io::print_info(format!("  Rustc        : {}", meta.rustc));
    Ok(())
}

fn cmd_help(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    if args.is_empty() {
        help::print_overview(&context.registry);
        return Ok(());
    }

    for name in args.iter().filter(|name| !name.is_empty()) {
        match context.command(&name.to_lowercase()) {
            Some(entry) => help::print_command(entry),
            None => io::print_warning(format!("No help on `{name}`")),
        }
    }
    Ok(())
}

fn cmd_exit(context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    context.client.disconnect()?;
    Err(CommandError::ExitRequested)
}
