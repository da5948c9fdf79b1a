//! High-level client operations. Commands from the shell map onto the
//! methods of [`AnselusClient`] more or less one to one.

use std::path::PathBuf;

use anselus_config::Config;
use tracing::{debug, info, warn};

use crate::{
    address::{validate_user_id, ServerAddress, WorkspaceAddress},
    encryption::{KeyPair, Password, CURVE25519},
    errors::{ClientError, Result},
    profile::{Profile, ProfileManager},
    protocol::{PreregInfo, RegistrationResult, Response, ServerConnection, Timeouts},
    storage::{JsonStore, StorageBackend, StoredKey},
    workspace::Workspace,
};

const LOCALHOST: &str = "localhost";
const DEVICE_KEY_CATEGORY: &str = "device";

/// Ties the profile list, the active profile's store and the server
/// connection together.
#[derive(Debug)]
pub struct AnselusClient {
    profiles: ProfileManager,
    store: JsonStore,
    connection: Option<ServerConnection>,
    config: Config,
}

impl AnselusClient {
    /// Opens the profiles under `base_dir` and activates the default one.
    pub fn new(base_dir: impl Into<PathBuf>, config: Config) -> Result<Self> {
        let profiles = ProfileManager::new(base_dir)?;
        let store = open_active_store(&profiles)?;
        Ok(Self {
            profiles,
            store,
            connection: None,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    pub fn store(&self) -> &JsonStore {
        &self.store
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::from(&self.config)
    }

    /// Switches profiles. Any open connection is closed first.
    pub fn activate_profile(&mut self, name: &str) -> Result<String> {
        self.drop_connection();
        let profile = self.profiles.activate_profile(name)?.clone();
        self.store = JsonStore::open(&self.profiles.profile_dir(&profile))?;
        info!(profile = %profile.name, "activated profile");
        Ok(profile.name)
    }

    pub fn activate_default_profile(&mut self) -> Result<String> {
        self.activate_profile(crate::profile::DEFAULT_ALIAS)
    }

    pub fn get_profiles(&self) -> &[Profile] {
        self.profiles.get_profiles()
    }

    pub fn get_active_profile(&self) -> Option<&Profile> {
        self.profiles.get_active_profile()
    }

    pub fn get_active_profile_name(&self) -> String {
        self.get_active_profile()
            .map(|profile| profile.name.clone())
            .unwrap_or_default()
    }

    pub fn get_default_profile(&self) -> Option<&Profile> {
        self.profiles.get_default_profile()
    }

    pub fn create_profile(&mut self, name: &str) -> Result<Profile> {
        self.profiles.create_profile(name)
    }

    /// Deletes a profile. Deleting the active one reopens the store of
    /// whichever profile became active.
    pub fn delete_profile(&mut self, name: &str) -> Result<()> {
        let was_active = self
            .get_active_profile()
            .map(|profile| profile.name == name.trim().to_lowercase())
            .unwrap_or(false);
        if was_active {
            self.drop_connection();
        }
        self.profiles.delete_profile(name)?;
        if was_active {
            self.store = open_active_store(&self.profiles)?;
        }
        Ok(())
    }

    pub fn rename_profile(&mut self, old: &str, new: &str) -> Result<()> {
        self.profiles.rename_profile(old, new)
    }

    pub fn set_default_profile(&mut self, name: &str) -> Result<()> {
        self.profiles.set_default_profile(name)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn connection(&self) -> Option<&ServerConnection> {
        self.connection.as_ref()
    }

    /// Connects to `host[:port]`, replacing any existing connection.
    pub fn connect(&mut self, server: &str) -> Result<&ServerConnection> {
        let address = ServerAddress::parse(server, self.config.default_port)?;
        self.drop_connection();
        let connection = ServerConnection::connect(&address.host, address.port, &self.timeouts())?;
        Ok(self.connection.insert(connection))
    }

    pub fn disconnect(&mut self) -> Result<()> {
        match self.connection.take() {
            Some(connection) => connection.disconnect(),
            None => Ok(()),
        }
    }

    fn drop_connection(&mut self) {
        if let Err(err) = self.disconnect() {
            warn!(error = %err, "error while closing server connection");
        }
    }

    /// Registers a new workspace on `server` and builds the local workspace
    /// data for the active profile. Refused registrations create nothing locally.
    pub fn register_account(&mut self, server: &str, password: &str) -> Result<RegistrationResult> {
        let profile = self
            .get_active_profile()
            .cloned()
            .ok_or_else(|| ClientError::ResourceNotFound("no active profile".into()))?;
        if profile.has_identity() {
            return Err(ClientError::ResourceExists(
                "an individual workspace already exists".into(),
            ));
        }

        let address = ServerAddress::parse(server, self.config.default_port)?;
        let hashed = Password::set(password)?;

        let devkey = KeyPair::generate(DEVICE_KEY_CATEGORY);
        let session = devkey.public_key().to_string();
        let mut connection =
            ServerConnection::connect(&address.host, address.port, &self.timeouts())?;
        let outcome = connection.register(password, CURVE25519, &session);
        if let Err(err) = connection.disconnect() {
            debug!(error = %err, "disconnect after registration failed");
        }
        let result = outcome?;

        if !result.status.is_success() {
            info!(status = ?result.status, "registration refused");
            return Ok(result);
        }
        let devid = result
            .devid
            .clone()
            .ok_or_else(|| ClientError::BadData("registration reply lacked a device ID".into()))?;

        let profile_dir = self.profiles.profile_dir(&profile);
        let workspace = Workspace::generate(
            &mut self.store,
            &profile_dir,
            &address.host,
            &result.wid,
            &hashed,
        )?;
        let waddr = workspace.address();
        if let Err(err) =
            self.record_registration(&workspace, &devkey, &devid, &session, address.port)
        {
            warn!(address = %waddr, error = %err, "rolling back registration");
            workspace.remove_from_db(&mut self.store)?;
            return Err(err);
        }
        info!(address = %waddr, "registered workspace");
        Ok(result)
    }

    /// Stores the device key and session, then points the active profile at
    /// the new workspace.
    fn record_registration(
        &mut self,
        workspace: &Workspace,
        devkey: &KeyPair,
        devid: &str,
        session: &str,
        port: u16,
    ) -> Result<()> {
        let waddr = workspace.address();
        self.store.add_key(StoredKey::from_pair(devkey, &waddr))?;
        self.store.add_device_session(&waddr, devid, session, None)?;

        self.profiles.update_active(|profile| {
            profile.wid = workspace.wid().to_string();
            profile.domain = workspace.domain().to_string();
            profile.port = port;
        })
    }

    /// Asks a server on this machine to provision a workspace.
    pub fn preregister_account(&mut self, port: u16, uid: Option<&str>) -> Result<PreregInfo> {
        if let Some(uid) = uid {
            validate_user_id(uid)?;
        }
        let mut connection = ServerConnection::connect(LOCALHOST, port, &self.timeouts())?;
        let outcome = connection.preregister(uid);
        if let Err(err) = connection.disconnect() {
            debug!(error = %err, "disconnect after preregistration failed");
        }
        outcome
    }

    /// Logs in to `address`, or to the active profile's identity workspace.
    pub fn login(&mut self, address: Option<&str>, password: &str) -> Result<Response> {
        let profile = self
            .get_active_profile()
            .cloned()
            .ok_or_else(|| ClientError::ResourceNotFound("no active profile".into()))?;
        let target = match address {
            Some(value) => WorkspaceAddress::parse(value)?,
            None if profile.has_identity() => WorkspaceAddress::new(&profile.wid, &profile.domain),
            None => {
                return Err(ClientError::ResourceNotFound(
                    "this profile has no workspace; register first".into(),
                ))
            }
        };
        let session = self
            .store
            .get_session(&target.to_string())
            .ok_or_else(|| ClientError::ResourceNotFound(format!("no device session for {target}")))?;

        if self.connection.is_none() {
            let port = if target.domain == profile.domain {
                profile.port
            } else {
                self.config.default_port
            };
            let connection = ServerConnection::connect(&target.domain, port, &self.timeouts())?;
            self.connection = Some(connection);
        }
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| ClientError::NetworkError("not connected".into()))?;

        expect_code(connection.login(&target.wid)?, 100)?;
        expect_code(connection.password(&target.wid, password)?, 100)?;
        let response = expect_code(connection.device(&session.devid, &session.session)?, 200)?;
        info!(address = %target, "logged in");
        Ok(response)
    }

    /// Deletes the identity workspace on the connected server. Local data is kept.
    pub fn unregister_account(&mut self, password: &str) -> Result<Response> {
        let profile = self
            .get_active_profile()
            .cloned()
            .ok_or_else(|| ClientError::ResourceNotFound("no active profile".into()))?;
        if !profile.has_identity() {
            return Err(ClientError::ResourceNotFound(
                "this profile has no workspace".into(),
            ));
        }
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| ClientError::NetworkError("not connected to a server".into()))?;
        connection.unregister(&profile.wid, password)
    }

    /// Sets the user ID of the identity workspace and returns the new
    /// `uid/domain` address.
    pub fn set_user_id(&mut self, uid: &str) -> Result<String> {
        validate_user_id(uid)?;
        let profile = self
            .get_active_profile()
            .cloned()
            .ok_or_else(|| ClientError::ResourceNotFound("no active profile".into()))?;
        if !profile.has_identity() {
            return Err(ClientError::ResourceNotFound(
                "this profile has no workspace".into(),
            ));
        }
        self.store.set_user_id(&profile.wid, &profile.domain, uid)?;
        Ok(format!("{uid}/{}", profile.domain))
    }
}

impl Drop for AnselusClient {
    fn drop(&mut self) {
        self.drop_connection();
    }
}

fn open_active_store(profiles: &ProfileManager) -> Result<JsonStore> {
    let profile = profiles
        .get_active_profile()
        .ok_or_else(|| ClientError::ResourceNotFound("no active profile".into()))?;
    JsonStore::open(&profiles.profile_dir(profile))
}

fn expect_code(response: Response, code: u16) -> Result<Response> {
    if response.code == code {
        Ok(response)
    } else {
        Err(ClientError::ServerError(response.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn client() -> (tempfile::TempDir, AnselusClient) {
        let dir = tempdir().unwrap();
        let client = AnselusClient::new(dir.path(), Config::default()).unwrap();
        (dir, client)
    }

    #[test]
    fn starts_on_primary_profile() {
        let (_dir, client) = client();
        assert_eq!(client.get_active_profile_name(), "primary");
        assert!(!client.is_connected());
        assert!(client.store().path().ends_with("storage.json"));
    }

    #[test]
    fn switching_profiles_opens_their_store() {
        let (_dir, mut client) = client();
        client.create_profile("work").unwrap();
        let primary_store = client.store().path().to_path_buf();

        assert_eq!(client.activate_profile("work").unwrap(), "work");
        assert_ne!(client.store().path(), primary_store);
        assert_eq!(client.activate_default_profile().unwrap(), "primary");
        assert_eq!(client.store().path(), primary_store);
    }

    #[test]
    fn deleting_active_profile_falls_back_to_default() {
        let (_dir, mut client) = client();
        client.create_profile("temp").unwrap();
        client.activate_profile("temp").unwrap();
        client.delete_profile("temp").unwrap();
        assert_eq!(client.get_active_profile_name(), "primary");
    }

    #[test]
    fn identity_operations_need_a_workspace() {
        let (_dir, mut client) = client();
        assert!(matches!(
            client.login(None, "whatever"),
            Err(ClientError::ResourceNotFound(_))
        ));
        assert!(matches!(
            client.set_user_id("csimons"),
            Err(ClientError::ResourceNotFound(_))
        ));
        assert!(matches!(
            client.set_user_id("bad\"id"),
            Err(ClientError::BadParameterValue(_))
        ));
        assert!(matches!(
            client.unregister_account("whatever"),
            Err(ClientError::ResourceNotFound(_))
        ));
    }

    #[test]
    fn register_rejects_bad_input_before_connecting() {
        let (_dir, mut client) = client();
        assert!(matches!(
            client.register_account("host:notaport", "MyS3cretPassw*rd"),
            Err(ClientError::BadParameterValue(_))
        ));
        assert!(matches!(
            client.register_account("localhost:1", "short"),
            Err(ClientError::BadParameterValue(_))
        ));
    }

    #[test]
    fn register_refuses_when_profile_has_identity() {
        let (_dir, mut client) = client();
        client
            .profiles
            .update_active(|profile| {
                profile.wid = "b5a9367e-680d-46c0-bb2c-73932a6d4007".into();
                profile.domain = "example.com".into();
            })
            .unwrap();
        let err = client
            .register_account("localhost", "MyS3cretPassw*rd")
            .unwrap_err();
        assert!(err.to_string().contains("an individual workspace already exists"));
    }
}
