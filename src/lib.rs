#![doc(test(attr(deny(warnings))))]

//! Anselus CLI is a terminal client for Anselus servers. It registers
//! workspaces, logs in devices, and manages local identity profiles from a
//! REPL-style command environment.

pub mod address;
pub mod cli;
pub mod client;
pub mod encryption;
pub mod errors;
pub mod keycard;
pub mod profile;
pub mod protocol;
pub mod storage;
pub mod utils;
pub mod workspace;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup debug log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::debug!("Anselus CLI tracing initialized.");
    });
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_does_not_panic() {
        super::init();
        super::init();
    }
}
