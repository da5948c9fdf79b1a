pub mod json_backend;

use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    encryption::{FolderMapping, KeyPair, KeyType, Password, SecretKey},
    errors::Result,
};

pub use json_backend::{JsonStore, STORAGE_FILE};

const TMP_SUFFIX: &str = "tmp";

/// A workspace the local device has an identity in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    pub wid: String,
    pub domain: String,
    pub password: String,
    pub pwhashtype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userid: Option<String>,
}

impl WorkspaceRecord {
    pub fn address(&self) -> String {
        format!("{}/{}", self.wid, self.domain)
    }
}

/// A device session on one server. Only one exists per address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSession {
    pub address: String,
    pub devid: String,
    pub session: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devname: Option<String>,
}

/// Key material as persisted. Symmetric keys have no public half.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredKey {
    pub id: String,
    pub address: String,
    pub key_type: KeyType,
    pub category: String,
    pub algorithm: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public: Option<String>,
    pub private: String,
}

impl StoredKey {
    pub fn from_pair(pair: &KeyPair, address: &str) -> Self {
        Self {
            id: pair.id().to_string(),
            address: address.to_string(),
            key_type: pair.key_type(),
            category: pair.category().to_string(),
            algorithm: pair.encryption_type().to_string(),
            public: Some(pair.public85()),
            private: pair.private85(),
        }
    }

    pub fn from_secret(key: &SecretKey, address: &str) -> Self {
        Self {
            id: key.id().to_string(),
            address: address.to_string(),
            key_type: key.key_type(),
            category: key.category().to_string(),
            algorithm: key.encryption_type().to_string(),
            public: None,
            private: key.key85(),
        }
    }
}

/// Persistence for the workspace data of a single profile.
pub trait StorageBackend: Send {
    fn add_workspace(&mut self, wid: &str, domain: &str, password: &Password) -> Result<()>;
    fn remove_workspace(&mut self, wid: &str, domain: &str) -> Result<()>;
    fn remove_workspace_entry(&mut self, wid: &str, domain: &str) -> Result<()>;
    fn get_workspace(&self, wid: &str, domain: &str) -> Option<WorkspaceRecord>;
    fn workspaces(&self) -> Vec<WorkspaceRecord>;
    fn set_user_id(&mut self, wid: &str, domain: &str, uid: &str) -> Result<()>;

    fn get_credentials(&self, wid: &str, domain: &str) -> Result<Password>;
    fn set_credentials(&mut self, wid: &str, domain: &str, password: &Password) -> Result<()>;

    fn add_device_session(
        &mut self,
        address: &str,
        devid: &str,
        session: &str,
        devname: Option<&str>,
    ) -> Result<()>;
    fn update_device_session(&mut self, devid: &str, session: &str) -> Result<()>;
    fn remove_device_session(&mut self, devid: &str) -> Result<()>;
    fn get_session(&self, address: &str) -> Option<DeviceSession>;

    fn add_key(&mut self, key: StoredKey) -> Result<()>;
    fn remove_key(&mut self, id: &str) -> Result<()>;
    fn get_key(&self, id: &str) -> Result<StoredKey>;

    fn add_folder(&mut self, folder: FolderMapping) -> Result<()>;
    fn remove_folder(&mut self, fid: &str) -> Result<()>;
    fn get_folder(&self, fid: &str) -> Result<FolderMapping>;
}

pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

/// Writes `data` next to `path` and renames it into place.
pub(crate) fn write_atomic(path: &Path, data: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    {
        let mut file = File::create(&tmp)?;
        file.write_all(data.as_bytes())?;
        file.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
