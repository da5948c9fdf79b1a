//! Local identity profiles. Each profile owns a folder named by its id that
//! holds the profile's workspace store.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    address::validate_uuid,
    errors::{ClientError, Result},
    protocol::DEFAULT_PORT,
    storage::write_atomic,
};

pub const PROFILES_FILE: &str = "profiles.json";
/// Reserved name that always refers to the current default profile.
pub const DEFAULT_ALIAS: &str = "default";
pub const PRIMARY_PROFILE: &str = "primary";

fn default_port() -> u16 {
    DEFAULT_PORT
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub isdefault: bool,
    pub id: String,
    #[serde(default)]
    pub wid: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            isdefault: false,
            id: Uuid::new_v4().to_string(),
            wid: String::new(),
            domain: String::new(),
            port: DEFAULT_PORT,
        }
    }

    /// The identity workspace address, `wid/domain`.
    pub fn address(&self) -> String {
        format!("{}/{}", self.wid, self.domain)
    }

    pub fn has_identity(&self) -> bool {
        !self.wid.is_empty() && !self.domain.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        !self.name.is_empty() && validate_uuid(&self.id)
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

fn reject_alias(name: &str) -> Result<()> {
    if name == DEFAULT_ALIAS {
        return Err(ClientError::BadParameterValue(
            "'default' is a reserved profile name".into(),
        ));
    }
    Ok(())
}

/// Loads, mutates and persists the profile list under a base directory.
#[derive(Debug)]
pub struct ProfileManager {
    base_dir: PathBuf,
    profiles: Vec<Profile>,
    active: Option<usize>,
}

impl ProfileManager {
    /// Opens the profile list in `base_dir`. An empty list is bootstrapped
    /// with a `primary` profile; otherwise the default profile is activated.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        let mut manager = Self {
            base_dir,
            profiles: Vec::new(),
            active: None,
        };
        manager.load()?;

        if manager.profiles.is_empty() {
            info!("no profiles found, creating `{PRIMARY_PROFILE}`");
            manager.create_profile(PRIMARY_PROFILE)?;
            manager.set_default_profile(PRIMARY_PROFILE)?;
        } else if !manager.profiles.iter().any(|p| p.isdefault) {
            let mut profiles = manager.profiles.clone();
            profiles[0].isdefault = true;
            manager.commit(profiles)?;
        }
        manager.activate_profile(DEFAULT_ALIAS)?;
        Ok(manager)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn profiles_path(&self) -> PathBuf {
        self.base_dir.join(PROFILES_FILE)
    }

    pub fn profile_dir(&self, profile: &Profile) -> PathBuf {
        self.base_dir.join(&profile.id)
    }

    pub fn get_profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn get_active_profile(&self) -> Option<&Profile> {
        self.active.and_then(|index| self.profiles.get(index))
    }

    pub fn get_default_profile(&self) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.isdefault)
    }

    pub fn create_profile(&mut self, name: &str) -> Result<Profile> {
        let name = normalize_name(name);
        if name.is_empty() {
            return Err(ClientError::BadParameterValue("profile name may not be empty".into()));
        }
        reject_alias(&name)?;
        if self.index_of(&name).is_some() {
            return Err(ClientError::ResourceExists(format!("profile `{name}`")));
        }

        let profile = Profile::new(name);
        let dir = self.profile_dir(&profile);
        fs::create_dir_all(&dir)?;
        let mut profiles = self.profiles.clone();
        profiles.push(profile.clone());
        if let Err(err) = self.commit(profiles) {
            fs::remove_dir_all(&dir).ok();
            return Err(err);
        }
        debug!(name = %profile.name, id = %profile.id, "created profile");
        Ok(profile)
    }

    pub fn delete_profile(&mut self, name: &str) -> Result<()> {
        let name = normalize_name(name);
        reject_alias(&name)?;
        let index = self
            .index_of(&name)
            .ok_or_else(|| ClientError::ResourceNotFound(format!("profile `{name}`")))?;
        if self.profiles.len() == 1 {
            return Err(ClientError::BadParameterValue(
                "the last profile may not be deleted".into(),
            ));
        }

        let mut profiles = self.profiles.clone();
        let removed = profiles.remove(index);
        if removed.isdefault {
            profiles[0].isdefault = true;
        }
        let active = match self.active {
            Some(active) if active == index => profiles.iter().position(|p| p.isdefault),
            Some(active) if active > index => Some(active - 1),
            other => other,
        };
        self.commit(profiles)?;
        self.active = active;

        let dir = self.profile_dir(&removed);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        debug!(%name, "deleted profile");
        Ok(())
    }

    pub fn rename_profile(&mut self, old: &str, new: &str) -> Result<()> {
        let old = normalize_name(old);
        let new = normalize_name(new);
        reject_alias(&old)?;
        reject_alias(&new)?;
        if new.is_empty() {
            return Err(ClientError::BadParameterValue("profile name may not be empty".into()));
        }
        let index = self
            .index_of(&old)
            .ok_or_else(|| ClientError::ResourceNotFound(format!("profile `{old}`")))?;
        if self.index_of(&new).is_some() {
            return Err(ClientError::ResourceExists(format!("profile `{new}`")));
        }
        let mut profiles = self.profiles.clone();
        profiles[index].name = new;
        self.commit(profiles)
    }

    pub fn set_default_profile(&mut self, name: &str) -> Result<()> {
        let name = normalize_name(name);
        let index = self
            .index_of(&name)
            .ok_or_else(|| ClientError::ResourceNotFound(format!("profile `{name}`")))?;
        let mut profiles = self.profiles.clone();
        for (i, profile) in profiles.iter_mut().enumerate() {
            profile.isdefault = i == index;
        }
        self.commit(profiles)
    }

    /// Makes `name` the active profile. `default` resolves to the default profile.
    pub fn activate_profile(&mut self, name: &str) -> Result<&Profile> {
        let name = normalize_name(name);
        let index = if name == DEFAULT_ALIAS {
            self.profiles.iter().position(|p| p.isdefault)
        } else {
            self.index_of(&name)
        }
        .ok_or_else(|| ClientError::ResourceNotFound(format!("profile `{name}`")))?;

        fs::create_dir_all(self.profile_dir(&self.profiles[index]))?;
        self.active = Some(index);
        Ok(&self.profiles[index])
    }

    /// Applies `update` to the active profile and persists the result.
    pub fn update_active<F>(&mut self, update: F) -> Result<()>
    where
        F: FnOnce(&mut Profile),
    {
        let index = self
            .active
            .ok_or_else(|| ClientError::ResourceNotFound("no active profile".into()))?;
        let mut profiles = self.profiles.clone();
        update(&mut profiles[index]);
        self.commit(profiles)
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.profiles.iter().position(|p| p.name == name)
    }

    fn load(&mut self) -> Result<()> {
        let path = self.profiles_path();
        if !path.exists() {
            return Ok(());
        }
        let data = fs::read_to_string(&path)?;
        let profiles: Vec<Profile> = serde_json::from_str(&data)?;
        if let Some(bad) = profiles.iter().find(|p| !p.is_valid()) {
            return Err(ClientError::BadData(format!(
                "invalid profile `{}` in {}",
                bad.name,
                path.display()
            )));
        }
        self.profiles = profiles;
        Ok(())
    }

    /// Writes `profiles` out and adopts them once the write succeeded.
    fn commit(&mut self, profiles: Vec<Profile>) -> Result<()> {
        let json = serde_json::to_string_pretty(&profiles)?;
        write_atomic(&self.profiles_path(), &json)?;
        self.profiles = profiles;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn sample_profile() -> Profile {
        Profile {
            name: "Primary".into(),
            isdefault: false,
            id: "ca7149eb-e533-4de6-90b1-3b0181d6fa16".into(),
            wid: "b5a9367e-680d-46c0-bb2c-73932a6d4007".into(),
            domain: "example.com".into(),
            port: 2001,
        }
    }

    #[test]
    fn profile_serializes_with_expected_keys() {
        let value = serde_json::to_value(sample_profile()).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "Primary",
                "isdefault": false,
                "id": "ca7149eb-e533-4de6-90b1-3b0181d6fa16",
                "wid": "b5a9367e-680d-46c0-bb2c-73932a6d4007",
                "domain": "example.com",
                "port": 2001
            })
        );
        let parsed: Profile = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, sample_profile());
    }

    #[test]
    fn profile_address_and_validity() {
        let profile = sample_profile();
        assert_eq!(
            profile.address(),
            "b5a9367e-680d-46c0-bb2c-73932a6d4007/example.com"
        );
        assert!(profile.is_valid());
        assert!(profile.has_identity());

        let mut bad = sample_profile();
        bad.id = "not-a-uuid".into();
        assert!(!bad.is_valid());
    }

    #[test]
    fn missing_port_defaults() {
        let parsed: Profile = serde_json::from_value(json!({
            "name": "old",
            "id": "ca7149eb-e533-4de6-90b1-3b0181d6fa16"
        }))
        .unwrap();
        assert_eq!(parsed.port, DEFAULT_PORT);
        assert!(!parsed.has_identity());
    }

    #[test]
    fn bootstrap_creates_primary() {
        let dir = tempdir().unwrap();
        let manager = ProfileManager::new(dir.path()).unwrap();

        assert_eq!(manager.get_profiles().len(), 1);
        let active = manager.get_active_profile().unwrap();
        assert_eq!(active.name, PRIMARY_PROFILE);
        assert!(active.isdefault);
        assert!(manager.profile_dir(active).is_dir());
        assert!(dir.path().join(PROFILES_FILE).exists());
    }

    #[test]
    fn reload_activates_default() {
        let dir = tempdir().unwrap();
        {
            let mut manager = ProfileManager::new(dir.path()).unwrap();
            manager.create_profile("Work").unwrap();
            manager.set_default_profile("work").unwrap();
        }
        let manager = ProfileManager::new(dir.path()).unwrap();
        assert_eq!(manager.get_active_profile().unwrap().name, "work");
        assert_eq!(manager.get_default_profile().unwrap().name, "work");
    }

    #[test]
    fn create_rejects_reserved_empty_and_duplicate() {
        let dir = tempdir().unwrap();
        let mut manager = ProfileManager::new(dir.path()).unwrap();

        assert!(matches!(
            manager.create_profile("default"),
            Err(ClientError::BadParameterValue(_))
        ));
        assert!(matches!(
            manager.create_profile("   "),
            Err(ClientError::BadParameterValue(_))
        ));
        assert!(matches!(
            manager.create_profile(" PRIMARY "),
            Err(ClientError::ResourceExists(_))
        ));
    }

    #[test]
    fn delete_moves_default_and_active() {
        let dir = tempdir().unwrap();
        let mut manager = ProfileManager::new(dir.path()).unwrap();
        let second = manager.create_profile("second").unwrap();
        let second_dir = manager.profile_dir(&second);
        assert!(second_dir.is_dir());

        assert!(matches!(
            manager.delete_profile("default"),
            Err(ClientError::BadParameterValue(_))
        ));
        assert!(matches!(
            manager.delete_profile("missing"),
            Err(ClientError::ResourceNotFound(_))
        ));

        manager.delete_profile("primary").unwrap();
        assert_eq!(manager.get_profiles().len(), 1);
        assert_eq!(manager.get_default_profile().unwrap().name, "second");
        assert_eq!(manager.get_active_profile().unwrap().name, "second");

        assert!(matches!(
            manager.delete_profile("second"),
            Err(ClientError::BadParameterValue(_))
        ));
        assert!(second_dir.is_dir());
    }

    #[test]
    fn delete_removes_profile_folder() {
        let dir = tempdir().unwrap();
        let mut manager = ProfileManager::new(dir.path()).unwrap();
        let extra = manager.create_profile("extra").unwrap();
        let extra_dir = manager.profile_dir(&extra);

        manager.delete_profile("extra").unwrap();
        assert!(!extra_dir.exists());
        assert_eq!(manager.get_active_profile().unwrap().name, PRIMARY_PROFILE);
    }

    #[test]
    fn failed_save_keeps_profiles_and_folders() {
        let dir = tempdir().unwrap();
        let mut manager = ProfileManager::new(dir.path()).unwrap();
        let extra = manager.create_profile("extra").unwrap();
        let extra_dir = manager.profile_dir(&extra);
        let blocker = dir.path().join(format!("{PROFILES_FILE}.tmp"));
        fs::create_dir(&blocker).unwrap();

        assert!(manager.delete_profile("extra").is_err());
        assert_eq!(manager.get_profiles().len(), 2);
        assert!(extra_dir.is_dir());

        assert!(manager.rename_profile("extra", "spare").is_err());
        assert!(manager.get_profiles().iter().any(|p| p.name == "extra"));
        assert!(manager.update_active(|p| p.port = 2020).is_err());
        assert_eq!(manager.get_active_profile().unwrap().port, DEFAULT_PORT);
        assert!(manager.create_profile("third").is_err());
        assert_eq!(manager.get_profiles().len(), 2);

        fs::remove_dir(&blocker).unwrap();
        manager.delete_profile("extra").unwrap();
        assert!(!extra_dir.exists());
    }

    #[test]
    fn rename_checks_names() {
        let dir = tempdir().unwrap();
        let mut manager = ProfileManager::new(dir.path()).unwrap();
        manager.create_profile("home").unwrap();

        assert!(matches!(
            manager.rename_profile("primary", "default"),
            Err(ClientError::BadParameterValue(_))
        ));
        assert!(matches!(
            manager.rename_profile("nope", "other"),
            Err(ClientError::ResourceNotFound(_))
        ));
        assert!(matches!(
            manager.rename_profile("primary", "home"),
            Err(ClientError::ResourceExists(_))
        ));

        manager.rename_profile("primary", "main").unwrap();
        assert_eq!(manager.get_active_profile().unwrap().name, "main");
        assert!(manager.get_default_profile().unwrap().isdefault);
    }

    #[test]
    fn activate_and_update_persist() {
        let dir = tempdir().unwrap();
        let mut manager = ProfileManager::new(dir.path()).unwrap();
        manager.create_profile("alt").unwrap();

        assert_eq!(manager.activate_profile("alt").unwrap().name, "alt");
        manager
            .update_active(|profile| {
                profile.wid = "b5a9367e-680d-46c0-bb2c-73932a6d4007".into();
                profile.domain = "example.com".into();
                profile.port = 2020;
            })
            .unwrap();
        assert_eq!(manager.activate_profile("default").unwrap().name, "primary");

        let reloaded = ProfileManager::new(dir.path()).unwrap();
        let alt = reloaded
            .get_profiles()
            .iter()
            .find(|p| p.name == "alt")
            .unwrap();
        assert_eq!(alt.domain, "example.com");
        assert_eq!(alt.port, 2020);
    }
}
