//! Blocking client for the Anselus line protocol.
//!
//! Requests are single `VERB args` lines terminated by CRLF. Every reply is
//! one line beginning with a three-digit status code.

use std::fmt;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use anselus_config::Config;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::address::validate_uuid;
use crate::encryption::derive_login_hash;
use crate::errors::{ClientError, Result};

pub const DEFAULT_PORT: u16 = 2001;

const MAX_REGISTER_ATTEMPTS: u32 = 30;
const COLLISIONS_BEFORE_PAUSE: u32 = 10;
const COLLISION_PAUSE: Duration = Duration::from_secs(3);

/// Socket timeouts. The connect timeout also bounds the wait for the
/// server greeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub idle: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            idle: Duration::from_secs(1800),
        }
    }
}

impl From<&Config> for Timeouts {
    fn from(config: &Config) -> Self {
        Self {
            connect: Duration::from_secs(config.connect_timeout_secs),
            idle: Duration::from_secs(config.idle_timeout_secs),
        }
    }
}

/// A parsed server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: u16,
    pub info: String,
}

impl Response {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let code = line
            .get(0..3)
            .and_then(|code| code.parse::<u16>().ok())
            .ok_or_else(|| ClientError::ServerError(format!("bad response `{line}`")))?;
        let info = line.get(3..).unwrap_or_default().trim().to_string();
        Ok(Self { code, info })
    }

    pub fn is_success(&self) -> bool {
        (100..300).contains(&self.code)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.info.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} {}", self.code, self.info)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    /// 101: the server queued the request for approval.
    Pending,
    /// 201: the workspace exists and the device is authorized.
    Registered,
    /// 304: registration is closed on this server.
    Closed,
    /// 406: the server requires payment.
    PaymentRequired,
    /// 300: the server failed or answered malformed data.
    ServerError,
    /// Every generated workspace ID collided with an existing one.
    WorkspaceExists,
}

impl RegistrationStatus {
    pub fn code(&self) -> u16 {
        match self {
            RegistrationStatus::Pending => 101,
            RegistrationStatus::Registered => 201,
            RegistrationStatus::Closed => 304,
            RegistrationStatus::PaymentRequired => 406,
            RegistrationStatus::ServerError => 300,
            RegistrationStatus::WorkspaceExists => 408,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            RegistrationStatus::Pending | RegistrationStatus::Registered
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationResult {
    pub status: RegistrationStatus,
    pub wid: String,
    pub devid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreregInfo {
    pub wid: String,
    pub regcode: String,
    pub uid: Option<String>,
}

/// An open session with an Anselus server.
pub struct ServerConnection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    peer: SocketAddr,
    version: String,
    collision_pause: Duration,
}

impl fmt::Debug for ServerConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConnection")
            .field("peer", &self.peer)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl ServerConnection {
    /// Connects and consumes the greeting, whose third token is the server
    /// version.
    pub fn connect(host: &str, port: u16, timeouts: &Timeouts) -> Result<Self> {
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map(Iterator::collect)
            .unwrap_or_default();
        if addrs.is_empty() {
            return Err(ClientError::ResourceNotFound(format!(
                "couldn't locate host {host}"
            )));
        }

        let mut last_error = None;
        let mut connected = None;
        for candidate in addrs {
            match TcpStream::connect_timeout(&candidate, timeouts.connect) {
                Ok(stream) => {
                    connected = Some((stream, candidate));
                    break;
                }
                Err(err) => {
                    debug!(addr = %candidate, error = %err, "connect attempt failed");
                    last_error = Some(err);
                }
            }
        }
        let (stream, addr) = connected.ok_or_else(|| {
            let reason = last_error
                .map(|err| err.to_string())
                .unwrap_or_default();
            ClientError::NetworkError(format!("couldn't connect to host {host}: {reason}"))
        })?;
        let network = |err: std::io::Error| ClientError::NetworkError(err.to_string());
        stream
            .set_read_timeout(Some(timeouts.connect))
            .map_err(network)?;
        let writer = stream.try_clone().map_err(network)?;

        let mut connection = Self {
            reader: BufReader::new(stream),
            writer,
            peer: addr,
            version: String::new(),
            collision_pause: COLLISION_PAUSE,
        };

        let greeting = connection.read_line()?;
        connection.version = greeting
            .split_whitespace()
            .nth(2)
            .unwrap_or_default()
            .to_string();

        let stream = connection.reader.get_ref();
        stream
            .set_read_timeout(Some(timeouts.idle))
            .map_err(network)?;
        connection
            .writer
            .set_write_timeout(Some(timeouts.idle))
            .map_err(network)?;

        info!(peer = %addr, version = %connection.version, "connected to server");
        Ok(connection)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Overrides the pause taken after every ten workspace ID collisions.
    pub fn set_collision_pause(&mut self, pause: Duration) {
        self.collision_pause = pause;
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .map_err(|err| ClientError::NetworkError(err.to_string()))?;
        if read == 0 {
            return Err(ClientError::NetworkError(
                "connection closed by server".into(),
            ));
        }
        Ok(line)
    }

    fn send_line(&mut self, line: &str) -> Result<()> {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .and_then(|_| self.writer.flush())
            .map_err(|err| ClientError::NetworkError(err.to_string()))
    }

    pub fn read_response(&mut self) -> Result<Response> {
        let line = self.read_line()?;
        Response::parse(&line)
    }

    fn request(&mut self, verb: &str, line: &str) -> Result<Response> {
        debug!(verb, "sending request");
        self.send_line(line)?;
        let response = self.read_response()?;
        debug!(verb, code = response.code, "received response");
        Ok(response)
    }

    /// Starts a login by naming the workspace.
    pub fn login(&mut self, wid: &str) -> Result<Response> {
        if !validate_uuid(wid) {
            return Err(ClientError::BadParameterValue(format!(
                "invalid workspace ID `{wid}`"
            )));
        }
        self.request("LOGIN", &format!("LOGIN {wid}"))
    }

    /// Sends the password credential derived for `wid`.
    pub fn password(&mut self, wid: &str, password: &str) -> Result<Response> {
        if !validate_uuid(wid) {
            return Err(ClientError::BadParameterValue(format!(
                "invalid workspace ID `{wid}`"
            )));
        }
        let hash = derive_login_hash(password, wid)?;
        self.request("PASSWORD", &format!("PASSWORD {hash}"))
    }

    /// Completes a login with the device ID and its session string.
    pub fn device(&mut self, devid: &str, session: &str) -> Result<Response> {
        if !validate_uuid(devid) {
            return Err(ClientError::BadParameterValue(format!(
                "invalid device ID `{devid}`"
            )));
        }
        self.request("DEVICE", &format!("DEVICE {devid} {session}"))
    }

    pub fn exists(&mut self, path: &str) -> Result<bool> {
        let response = self.request("EXISTS", &format!("EXISTS {path}"))?;
        Ok(response.code == 200)
    }

    /// Provisions a workspace for later registration by its owner.
    pub fn preregister(&mut self, uid: Option<&str>) -> Result<PreregInfo> {
        let line = match uid {
            Some(uid) => format!("PREREG {uid}"),
            None => "PREREG".to_string(),
        };
        let response = self.request("PREREG", &line)?;
        if response.code != 200 {
            return Err(ClientError::ServerError(response.to_string()));
        }

        let tokens: Vec<&str> = response.info.split_whitespace().collect();
        if !(3..=4).contains(&tokens.len()) {
            return Err(ClientError::ServerError(format!(
                "bad preregistration response `{response}`"
            )));
        }
        Ok(PreregInfo {
            wid: tokens[1].to_string(),
            regcode: tokens[2].to_string(),
            uid: tokens.get(3).map(|uid| uid.to_string()),
        })
    }

    /// Registers a new workspace, retrying with a fresh workspace ID when the
    /// server reports a collision.
    pub fn register(
        &mut self,
        password: &str,
        keytype: &str,
        devkey: &str,
    ) -> Result<RegistrationResult> {
        let mut collisions = 0;

        for _ in 0..MAX_REGISTER_ATTEMPTS {
            if collisions > 0 && collisions % COLLISIONS_BEFORE_PAUSE == 0 {
                thread::sleep(self.collision_pause);
            }

            let wid = Uuid::new_v4().to_string();
            let hash = derive_login_hash(password, &wid)?;
            let response =
                self.request("REGISTER", &format!("REGISTER {wid} {hash} {keytype} {devkey}"))?;

            let status = match response.code {
                304 => RegistrationStatus::Closed,
                406 => RegistrationStatus::PaymentRequired,
                300 => RegistrationStatus::ServerError,
                101 | 201 => {
                    let tokens: Vec<&str> = response.info.split_whitespace().collect();
                    let devid = match tokens.as_slice() {
                        [_, devid] if validate_uuid(devid) => devid.to_string(),
                        _ => {
                            warn!(%response, "malformed registration reply");
                            return Ok(RegistrationResult {
                                status: RegistrationStatus::ServerError,
                                wid,
                                devid: None,
                            });
                        }
                    };
                    let status = if response.code == 101 {
                        RegistrationStatus::Pending
                    } else {
                        RegistrationStatus::Registered
                    };
                    return Ok(RegistrationResult {
                        status,
                        wid,
                        devid: Some(devid),
                    });
                }
                408 => {
                    collisions += 1;
                    debug!(collisions, "workspace ID collision");
                    continue;
                }
                _ => {
                    return Err(ClientError::ServerError(format!(
                        "unexpected server response `{response}`"
                    )))
                }
            };

            return Ok(RegistrationResult {
                status,
                wid,
                devid: None,
            });
        }

        Ok(RegistrationResult {
            status: RegistrationStatus::WorkspaceExists,
            wid: String::new(),
            devid: None,
        })
    }

    /// Deletes the logged-in workspace on the server.
    pub fn unregister(&mut self, wid: &str, password: &str) -> Result<Response> {
        let hash = derive_login_hash(password, wid)?;
        self.request("UNREGISTER", &format!("UNREGISTER {hash}"))
    }

    /// Sends QUIT and closes the socket.
    pub fn disconnect(mut self) -> Result<()> {
        let sent = self.send_line("QUIT");
        let _ = self.writer.shutdown(std::net::Shutdown::Both);
        info!(peer = %self.peer, "disconnected from server");
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_responses() {
        let response = Response::parse("200 OK\r\n").expect("response");
        assert_eq!(response.code, 200);
        assert_eq!(response.info, "OK");
        assert!(response.is_success());
        assert_eq!(response.to_string(), "200 OK");

        let bare = Response::parse("408").expect("bare code");
        assert_eq!(bare.info, "");
        assert!(!bare.is_success());

        assert!(matches!(
            Response::parse("OK 200"),
            Err(ClientError::ServerError(_))
        ));
        assert!(Response::parse("").is_err());
    }

    #[test]
    fn registration_status_codes() {
        assert_eq!(RegistrationStatus::Pending.code(), 101);
        assert!(RegistrationStatus::Registered.is_success());
        assert!(!RegistrationStatus::PaymentRequired.is_success());
    }

    #[test]
    fn timeouts_follow_config() {
        let mut config = Config::default();
        config.connect_timeout_secs = 3;
        let timeouts = Timeouts::from(&config);
        assert_eq!(timeouts.connect, Duration::from_secs(3));
        assert_eq!(timeouts.idle, Duration::from_secs(1800));
        assert_eq!(Timeouts::default().connect, Duration::from_secs(10));
    }
}
