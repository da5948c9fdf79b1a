//! Long-form help for commands whose usage line is not enough.

const LOGIN: &str = "\
Usage: login [address]
Log into a server. The address is the full workspace address, e.g.
557207fd-0a0a-45bb-a402-c38461251f8f/example.com. Because one server may host
several domains, the domain part is required. When the address is omitted,
the identity workspace of the active profile is used. The password is
prompted for.

Examples:
login f009338a-ea14-4d59-aa48-016829835cd7/example.com
login";

const PROFILE: &str = "\
Usage: profile [action] [name]
Manage profiles. Without an action, the active profile is shown.

create <name> - create a new profile. Any name other than \"default\", which is
reserved, may be used. Once created it must be activated, and registering or
logging in is needed for it to be useful.

delete <name> - delete a profile and all of its files. This cannot be undone,
so confirmation is required.

rename <oldname> <newname> - change the name of a profile. Neither name may
be \"default\".

list - print all available profiles.

setdefault <name> - set the profile loaded on startup.

set <name> - activate the named profile. \"default\" selects the default one.";

const REGISTER: &str = "\
Usage: register <server[:port]>
Register a new workspace account on a server. The passphrase is prompted for
twice. Depending on how the server handles registration, the result may be
something other than plain success, such as a request awaiting approval.";

const UNREGISTER: &str = "\
Usage: unregister
Delete the identity workspace of the active profile from the connected
server. Local files are kept. Confirmation and the password are required.";

const PREREGISTER: &str = "\
Usage: preregister <port> [userid]
Provision a workspace on a server running on this machine for someone else.
The new workspace ID and registration code are printed so that they can be
passed on to the owner.";

const SHELL: &str = "\
Usage: shell <command>
Execute a command directly in the regular user shell. On Windows this is
Command Prompt. On UNIX-like platforms it is $SHELL, usually bash.";

const SETUSERID: &str = "\
Usage: setuserid <userid>
Set the user ID for the profile. This is the part before the slash in your
Anselus address.

The user ID must be one word without spaces. Letters, numbers and symbols
are allowed except the forward slash (/) and double quote (\"). Non-English
characters may be used. It can be up to 128 characters long.

Capitalization does not matter. If the user ID is already taken on your
server, choose another.

Examples:
KingArthur
Аделина
Aslan_the_Lion
大和
karlweiß-52";

const CHDIR: &str = "\
Usage: chdir <location>
Change to the specified directory. A leading ~ is your home directory.";

const LS: &str = "\
Usage: as per the bash ls command or the Windows dir command";

const CONNECT: &str = "\
Usage: connect <host[:port]>
Open a connection to a server. The port defaults to the configured
default_port, normally 2001.";

const CONFIG: &str = "\
Usage: config [show|get <key>|set <key> <value>|reset]
Show or change client preferences. Keys:
default_port, connect_timeout_secs, idle_timeout_secs - numbers
screen_reader, high_contrast, ui_color_enabled - on or off";

pub fn long_help(command: &str) -> Option<&'static str> {
    let text = match command {
        "login" => LOGIN,
        "profile" => PROFILE,
        "register" => REGISTER,
        "unregister" => UNREGISTER,
        "preregister" => PREREGISTER,
        "shell" => SHELL,
        "setuserid" => SETUSERID,
        "chdir" => CHDIR,
        "ls" => LS,
        "connect" => CONNECT,
        "config" => CONFIG,
        _ => return None,
    };
    Some(text)
}
