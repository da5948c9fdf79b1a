use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Stores user-configurable client preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "Config::default_port_value")]
    pub default_port: u16,
    #[serde(default = "Config::default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "Config::default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default)]
    pub accessibility: AccessibilitySettings,
    #[serde(default = "Config::default_ui_color_enabled")]
    pub ui_color_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_port: Self::default_port_value(),
            connect_timeout_secs: Self::default_connect_timeout(),
            idle_timeout_secs: Self::default_idle_timeout(),
            accessibility: AccessibilitySettings::default(),
            ui_color_enabled: Self::default_ui_color_enabled(),
        }
    }
}

impl Config {
    pub const KEYS: [&'static str; 6] = [
        "default_port",
        "connect_timeout_secs",
        "idle_timeout_secs",
        "screen_reader",
        "high_contrast",
        "ui_color_enabled",
    ];

    pub fn default_port_value() -> u16 {
        2001
    }

    pub fn default_connect_timeout() -> u64 {
        10
    }

    pub fn default_idle_timeout() -> u64 {
        1800
    }

    pub fn default_ui_color_enabled() -> bool {
        true
    }

    /// Returns `(key, value)` pairs in display order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("default_port", self.default_port.to_string()),
            ("connect_timeout_secs", self.connect_timeout_secs.to_string()),
            ("idle_timeout_secs", self.idle_timeout_secs.to_string()),
            ("screen_reader", on_off(self.accessibility.screen_reader)),
            ("high_contrast", on_off(self.accessibility.high_contrast)),
            ("ui_color_enabled", on_off(self.ui_color_enabled)),
        ]
    }

    /// Updates a single preference from its textual form.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key.to_ascii_lowercase().as_str() {
            "default_port" => {
                let port: u16 = value.parse().map_err(|_| invalid())?;
                if port == 0 {
                    return Err(invalid());
                }
                self.default_port = port;
            }
            "connect_timeout_secs" => {
                let secs: u64 = value.parse().map_err(|_| invalid())?;
                if secs == 0 {
                    return Err(invalid());
                }
                self.connect_timeout_secs = secs;
            }
            "idle_timeout_secs" => {
                let secs: u64 = value.parse().map_err(|_| invalid())?;
                if secs == 0 {
                    return Err(invalid());
                }
                self.idle_timeout_secs = secs;
            }
            "screen_reader" => {
                self.accessibility.screen_reader = parse_switch(value).ok_or_else(invalid)?
            }
            "high_contrast" => {
                self.accessibility.high_contrast = parse_switch(value).ok_or_else(invalid)?
            }
            "ui_color_enabled" => self.ui_color_enabled = parse_switch(value).ok_or_else(invalid)?,
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessibilitySettings {
    #[serde(default)]
    pub screen_reader: bool,
    #[serde(default)]
    pub high_contrast: bool,
}

fn on_off(flag: bool) -> String {
    if flag { "on" } else { "off" }.to_string()
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}
