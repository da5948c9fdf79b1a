use crate::cli::core::{CommandError, CommandResult, ShellContext};
use crate::cli::io;
use crate::cli::registry::CommandEntry;
use crate::encryption::check_password_complexity;
use crate::errors::ClientError;
use crate::protocol::RegistrationStatus;

pub(crate) fn definitions() -> Vec<CommandEntry> {
    vec![
        CommandEntry::new(
            "register",
            "Register a new account on a server",
            "register <server[:port]>",
            cmd_register,
        ),
        CommandEntry::new(
            "unregister",
            "Delete your account from the connected server",
            "unregister",
            cmd_unregister,
        ),
        CommandEntry::new(
            "preregister",
            "Preregister a new account for someone",
            "preregister <port> [userid]",
            cmd_preregister,
        ),
        CommandEntry::new(
            "setuserid",
            "Set the user ID for the workspace",
            "setuserid <userid>",
            cmd_setuserid,
        ),
    ]
}

fn has_forbidden_chars(uid: &str) -> bool {
    uid.contains('"') || uid.contains('/')
}

pub(crate) fn status_message(status: RegistrationStatus) -> &'static str {
    match status {
        RegistrationStatus::Registered => "Registration success.",
        RegistrationStatus::Pending => "Registration request sent. Awaiting approval.",
        RegistrationStatus::Closed => "This server does not allow self-registration.",
        RegistrationStatus::PaymentRequired => {
            "This server requires payment before registration can be completed."
        }
        RegistrationStatus::ServerError => {
            "Registration unsuccessful. The server had an error. Please contact technical \
             support for the organization for assistance."
        }
        RegistrationStatus::WorkspaceExists => {
            "The server rejected every generated workspace ID. Please try again later."
        }
    }
}

fn read_new_passphrase(context: &ShellContext) -> Result<String, CommandError> {
    io::print_info(
        "Please enter a passphrase of at least 10 characters with a combination of \
         uppercase and lowercase letters and preferably a number or symbol. Non-English \
         letters such as ß, ñ, Ω and Ç are welcome.",
    );
    loop {
        let password = context.read_secret("Passphrase")?;
        let confirmation = context.read_secret("Confirm passphrase")?;
        if password != confirmation {
            io::print_warning("The passphrases did not match. Please try again.");
            continue;
        }
        match check_password_complexity(&password) {
            Ok(_) => return Ok(password),
            Err(ClientError::WeakPassphrase { strength }) => io::print_warning(format!(
                "That passphrase is {strength}. Please use a stronger one."
            )),
            Err(err) => io::print_warning(err),
        }
    }
}

fn cmd_register(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [server] = args else {
        return Err(CommandError::Usage("register <server[:port]>"));
    };
    let password = read_new_passphrase(context)?;
    let result = context.client.register_account(server, &password)?;

    let message = status_message(result.status);
    match result.status {
        RegistrationStatus::Registered => {
            io::print_success(message);
            if let Some(profile) = context.client.get_active_profile() {
                io::print_info(format!("Your workspace address is {}", profile.address()));
            }
        }
        RegistrationStatus::Pending => io::print_info(message),
        _ => io::print_error(message),
    }
    Ok(())
}

fn cmd_unregister(context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    if !context.client.is_connected() {
        return Err(CommandError::InvalidArguments(
            "Not connected. Use `connect` first.".into(),
        ));
    }
    if !context.confirm("This deletes your workspace from the server. Continue?")? {
        io::print_info("Operation cancelled.");
        return Ok(());
    }
    let password = context.read_secret("Password")?;
    let response = context.client.unregister_account(&password)?;
    if response.is_success() {
        io::print_success("The workspace has been removed from the server.");
    } else {
        io::print_error(format!("Unregistration failed: {response}"));
    }
    Ok(())
}

fn cmd_preregister(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    if args.is_empty() || args.len() > 2 {
        return Err(CommandError::Usage("preregister <port> [userid]"));
    }
    let port: u16 = args[0]
        .parse()
        .map_err(|_| CommandError::InvalidArguments("Bad port number".into()))?;
    let uid = args.get(1).copied();
    if uid.is_some_and(has_forbidden_chars) {
        return Err(CommandError::InvalidArguments(
            "User ID may not contain \" or /.".into(),
        ));
    }

    let info = context.client.preregister_account(port, uid)?;
    io::print_success("Preregistration success:");
    if let Some(uid) = &info.uid {
        io::print_info(format!("User ID: {uid}"));
    }
    io::print_info(format!("Workspace ID: {}", info.wid));
    io::print_info(format!("Registration Code: {}", info.regcode));
    Ok(())
}

fn cmd_setuserid(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let [uid] = args else {
        return Err(CommandError::Usage("setuserid <userid>"));
    };
    if has_forbidden_chars(uid) {
        return Err(CommandError::InvalidArguments(
            "A user id may not contain \" or /.".into(),
        ));
    }
    let address = context.client.set_user_id(uid)?;
    io::print_success(format!("Anselus address is now {address}"));
    Ok(())
}
