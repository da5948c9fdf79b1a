use crate::cli::core::{CommandError, CommandResult, ShellContext};
use crate::cli::io;
use crate::cli::registry::CommandEntry;

pub(crate) fn definitions() -> Vec<CommandEntry> {
    vec![
        CommandEntry::new(
            "connect",
            "Connect to a server",
            "connect <host[:port]>",
            cmd_connect,
        ),
        CommandEntry::new(
            "disconnect",
            "Close the server connection",
            "disconnect",
            cmd_disconnect,
        ),
        CommandEntry::new("login", "Log into a server", "login [address]", cmd_login),
    ]
}

fn cmd_connect(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [server] = args else {
        return Err(CommandError::Usage("connect <host[:port]>"));
    };
    let connection = context.client.connect(server)?;
    let version = connection.version();
    if version.is_empty() {
        io::print_success(format!("Connected to {}", connection.peer()));
    } else {
        io::print_success(format!(
            "Connected to {} (server version {version})",
            connection.peer()
        ));
    }
    Ok(())
}

fn cmd_disconnect(context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    if !context.client.is_connected() {
        io::print_info("Not connected.");
        return Ok(());
    }
    context.client.disconnect()?;
    io::print_success("Disconnected.");
    Ok(())
}

fn cmd_login(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    if args.len() > 1 {
        return Err(CommandError::Usage("login [address]"));
    }
    let password = context.read_secret("Password")?;
    context.client.login(args.first().copied(), &password)?;
    io::print_success("Login successful.");
    Ok(())
}
