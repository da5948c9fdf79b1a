//! Workspace and server address parsing.

use std::fmt;

use crate::errors::{ClientError, Result};

const DASH_POSITIONS: [usize; 4] = [8, 13, 18, 23];
const MAX_USER_ID_LEN: usize = 128;

/// Checks the basic shape of a UUID. Version bits are ignored because the
/// administrator workspace uses a deliberately nonconformant ID.
pub fn validate_uuid(value: &str) -> bool {
    match value.len() {
        36 => value.char_indices().all(|(idx, ch)| {
            if DASH_POSITIONS.contains(&idx) {
                ch == '-'
            } else {
                ch.is_ascii_hexdigit()
            }
        }),
        32 => value.chars().all(|ch| ch.is_ascii_hexdigit()),
        _ => false,
    }
}

/// Validates a friendly user ID such as `cavs4life`.
pub fn validate_user_id(value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ClientError::BadParameterValue("user id is empty".into()));
    }
    if value.chars().count() > MAX_USER_ID_LEN {
        return Err(ClientError::BadParameterValue(format!(
            "user id longer than {MAX_USER_ID_LEN} characters"
        )));
    }
    if value.chars().any(|ch| ch.is_whitespace() || ch == '"' || ch == '/') {
        return Err(ClientError::BadParameterValue(
            "user id may not contain whitespace, \" or /".into(),
        ));
    }
    Ok(())
}

/// A numeric workspace address, `wid/domain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceAddress {
    pub wid: String,
    pub domain: String,
}

impl WorkspaceAddress {
    pub fn new(wid: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            wid: wid.into(),
            domain: domain.into(),
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        let parts: Vec<&str> = value.split('/').collect();
        if parts.len() != 2 || parts[1].is_empty() || !validate_uuid(parts[0]) {
            return Err(ClientError::BadParameterValue(format!(
                "bad workspace address `{value}`"
            )));
        }
        Ok(Self::new(parts[0], parts[1]))
    }
}

impl fmt::Display for WorkspaceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.wid, self.domain)
    }
}

/// Host and port of an Anselus server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl ServerAddress {
    /// Parses `host` or `host:port`, falling back to `default_port`.
    pub fn parse(value: &str, default_port: u16) -> Result<Self> {
        let value = value.trim();
        let bad = || ClientError::BadParameterValue(format!("bad server string `{value}`"));
        let (host, port) = match value.split_once(':') {
            Some((host, port)) => (host, port.parse::<u16>().map_err(|_| bad())?),
            None => (value, default_port),
        };
        if host.is_empty() || port == 0 {
            return Err(bad());
        }
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_shapes() {
        assert!(validate_uuid("5a56260b-aa5c-4013-9217-a78f094432c3"));
        assert!(validate_uuid("5a56260baa5c40139217a78f094432c3"));
        assert!(validate_uuid("00000000-0000-0000-0000-000000000000"));
        assert!(!validate_uuid("5a56260b-aa5c-4013-9217-a78f094432cz"));
        assert!(!validate_uuid("5a56260b_aa5c-4013-9217-a78f094432c3"));
        assert!(!validate_uuid(""));
    }

    #[test]
    fn workspace_address_round_trip() {
        let addr = WorkspaceAddress::parse("5a56260b-aa5c-4013-9217-a78f094432c3/example.com")
            .expect("address");
        assert_eq!(addr.domain, "example.com");
        assert_eq!(
            addr.to_string(),
            "5a56260b-aa5c-4013-9217-a78f094432c3/example.com"
        );
        assert!(WorkspaceAddress::parse("not-a-wid/example.com").is_err());
        assert!(WorkspaceAddress::parse("5a56260b-aa5c-4013-9217-a78f094432c3/").is_err());
        assert!(WorkspaceAddress::parse("a/b/c").is_err());
    }

    #[test]
    fn server_address_defaults_port() {
        let addr = ServerAddress::parse("example.com", 2001).expect("server");
        assert_eq!(addr.port, 2001);
        let addr = ServerAddress::parse("localhost:4000", 2001).expect("server");
        assert_eq!((addr.host.as_str(), addr.port), ("localhost", 4000));
        assert!(ServerAddress::parse("localhost:abc", 2001).is_err());
        assert!(ServerAddress::parse(":2001", 2001).is_err());
    }

    #[test]
    fn user_id_rules() {
        assert!(validate_user_id("cavs4life").is_ok());
        assert!(validate_user_id("Ünïcode").is_ok());
        assert!(validate_user_id("has space").is_err());
        assert!(validate_user_id("a/b").is_err());
        assert!(validate_user_id("\"quoted\"").is_err());
        assert!(validate_user_id(&"x".repeat(129)).is_err());
    }
}
