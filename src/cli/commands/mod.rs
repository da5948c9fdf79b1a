pub mod account;
pub mod config;
pub mod connection;
pub mod fs;
pub mod profile;
pub mod system;

use crate::cli::core::CommandError;
use crate::cli::registry::CommandRegistry;

pub(crate) fn register_all(registry: &mut CommandRegistry) -> Result<(), CommandError> {
    let groups = [
        system::definitions(),
        fs::definitions(),
        connection::definitions(),
        account::definitions(),
        profile::definitions(),
        config::definitions(),
    ];
    for entry in groups.into_iter().flatten() {
        registry.register(entry)?;
    }
    Ok(())
}
