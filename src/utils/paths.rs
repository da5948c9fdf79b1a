use std::{env, path::PathBuf};

const HOME_ENV: &str = "ANSELUS_HOME";
const DEFAULT_DIR_NAME: &str = "anselus";

/// Returns the client data directory. `ANSELUS_HOME` wins, then the
/// platform config directory, then `~/.anselus`.
pub fn app_data_dir() -> PathBuf {
    if let Some(custom) = env::var_os(HOME_ENV) {
        return PathBuf::from(custom);
    }
    if let Some(config) = dirs::config_dir() {
        return config.join(DEFAULT_DIR_NAME);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(format!(".{DEFAULT_DIR_NAME}"))
}
