use std::process::{Command, ExitStatus};

use crate::cli::core::{CommandError, CommandResult, ShellContext};
use crate::cli::io;
use crate::cli::registry::CommandEntry;

pub(crate) fn definitions() -> Vec<CommandEntry> {
    vec![
        CommandEntry::new(
            "chdir",
            "Change directory/location",
            "chdir <location>",
            cmd_chdir,
        )
        .with_aliases(&["cd"]),
        CommandEntry::new("ls", "List directory contents", "ls [args]", cmd_ls)
            .with_aliases(&["dir"]),
        CommandEntry::new("shell", "Run a shell command", "shell <command>", cmd_shell)
            .with_aliases(&["sh", "`"]),
    ]
}

fn cmd_chdir(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    context.change_dir(args.first().copied())?;
    io::print_info(context.pwd.display());
    Ok(())
}

fn cmd_ls(_context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let status = if cfg!(windows) {
        Command::new("cmd")
            .args(["/C", "dir", "/w"])
            .args(args)
            .status()?
    } else {
        Command::new("ls").arg("--color=auto").args(args).status()?
    };
    report_status("ls", status);
    Ok(())
}

fn cmd_shell(_context: &mut ShellContext, args: &[&str]) -> CommandResult {
    if args.is_empty() {
        return Err(CommandError::Usage("shell <command>"));
    }
    let line = args.join(" ");
    let status = if cfg!(windows) {
        Command::new("cmd").args(["/C", line.as_str()]).status()
    } else {
        let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
        Command::new(shell).args(["-c", line.as_str()]).status()
    }
    .map_err(|err| CommandError::Message(format!("Error running command: {err}")))?;
    report_status(&line, status);
    Ok(())
}

fn report_status(what: &str, status: ExitStatus) {
    if !status.success() {
        match status.code() {
            Some(code) => io::print_warning(format!("`{what}` exited with status {code}")),
            None => io::print_warning(format!("`{what}` was terminated")),
        }
    }
}
