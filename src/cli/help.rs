use crate::cli::helptext;
use crate::cli::io;
use crate::cli::output::section as output_section;
use crate::cli::registry::{CommandEntry, CommandRegistry};

pub fn print_overview(registry: &CommandRegistry) {
    output_section("Available commands");
    for entry in registry.list() {
        io::print_info(format!("  {:<16} {}", entry.name, entry.description));
    }
    io::print_info("Use `help <command>` for details.");
}

pub fn print_command(entry: &CommandEntry) {
    output_section(format!("Help: {}", entry.name));
    match helptext::long_help(entry.name) {
        Some(text) => {
            for line in text.lines() {
                io::print_info(line);
            }
        }
        None => {
            io::print_info(format!("Usage: {}", entry.usage));
            io::print_info(entry.description);
        }
    }
    if !entry.aliases.is_empty() {
        io::print_info(format!("Aliases: {}", entry.aliases.join(", ")));
    }
}
