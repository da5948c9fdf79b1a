use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    address::{validate_user_id, WorkspaceAddress},
    encryption::{FolderMapping, Password},
    errors::{ClientError, Result},
};

use super::{write_atomic, DeviceSession, StorageBackend, StoredKey, WorkspaceRecord};

pub const STORAGE_FILE: &str = "storage.json";
const PASSWORD_HASH_TYPE: &str = "argon2id";
const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default = "default_schema_version")]
    schema_version: u32,
    #[serde(default)]
    workspaces: Vec<WorkspaceRecord>,
    #[serde(default)]
    sessions: Vec<DeviceSession>,
    #[serde(default)]
    keys: Vec<StoredKey>,
    #[serde(default)]
    folders: Vec<FolderMapping>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Workspace store kept as one JSON document inside a profile folder.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    doc: StoreDocument,
}

impl JsonStore {
    /// Opens `<profile_dir>/storage.json`, creating an empty store if absent.
    pub fn open(profile_dir: &Path) -> Result<Self> {
        fs::create_dir_all(profile_dir)?;
        let path = profile_dir.join(STORAGE_FILE);
        let doc = if path.exists() {
            let data = fs::read_to_string(&path)?;
            let doc: StoreDocument = serde_json::from_str(&data)?;
            if doc.schema_version > SCHEMA_VERSION {
                return Err(ClientError::StorageError(format!(
                    "storage `{}` is from a newer schema version",
                    path.display()
                )));
            }
            doc
        } else {
            StoreDocument {
                schema_version: SCHEMA_VERSION,
                ..StoreDocument::default()
            }
        };
        debug!(path = %path.display(), "opened workspace store");
        Ok(Self { path, doc })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn keys_for(&self, address: &str) -> Vec<StoredKey> {
        self.doc
            .keys
            .iter()
            .filter(|key| key.address == address)
            .cloned()
            .collect()
    }

    pub fn folders_for(&self, address: &str) -> Vec<FolderMapping> {
        self.doc
            .folders
            .iter()
            .filter(|folder| folder.address == address)
            .cloned()
            .collect()
    }

    /// Applies `change` to a copy of the document. The copy replaces the
    /// in-memory document only after it has been written out.
    fn commit<F>(&mut self, change: F) -> Result<()>
    where
        F: FnOnce(&mut StoreDocument) -> Result<()>,
    {
        let mut doc = self.doc.clone();
        change(&mut doc)?;
        write_atomic(&self.path, &serde_json::to_string_pretty(&doc)?)?;
        self.doc = doc;
        Ok(())
    }
}

impl StoreDocument {
    fn workspace_mut(&mut self, wid: &str, domain: &str) -> Result<&mut WorkspaceRecord> {
        self.workspaces
            .iter_mut()
            .find(|ws| ws.wid == wid && ws.domain == domain)
            .ok_or_else(|| workspace_not_found(wid, domain))
    }
}

fn workspace_not_found(wid: &str, domain: &str) -> ClientError {
    ClientError::ResourceNotFound(format!("workspace {wid}/{domain}"))
}

impl StorageBackend for JsonStore {
    fn add_workspace(&mut self, wid: &str, domain: &str, password: &Password) -> Result<()> {
        if self.doc.workspaces.iter().any(|ws| ws.wid == wid) {
            return Err(ClientError::ResourceExists(format!("workspace {wid}")));
        }
        let record = WorkspaceRecord {
            wid: wid.to_string(),
            domain: domain.to_string(),
            password: password.hash().to_string(),
            pwhashtype: PASSWORD_HASH_TYPE.to_string(),
            userid: None,
        };
        self.commit(|doc| {
            doc.workspaces.push(record);
            Ok(())
        })
    }

    fn remove_workspace(&mut self, wid: &str, domain: &str) -> Result<()> {
        if self.get_workspace(wid, domain).is_none() {
            return Err(workspace_not_found(wid, domain));
        }
        let address = format!("{wid}/{domain}");
        self.commit(|doc| {
            doc.workspaces
                .retain(|ws| !(ws.wid == wid && ws.domain == domain));
            doc.folders.retain(|folder| folder.address != address);
            doc.sessions.retain(|session| session.address != address);
            doc.keys.retain(|key| key.address != address);
            Ok(())
        })?;
        debug!(%address, "removed workspace and its data");
        Ok(())
    }

    fn remove_workspace_entry(&mut self, wid: &str, domain: &str) -> Result<()> {
        if self.get_workspace(wid, domain).is_none() {
            return Err(workspace_not_found(wid, domain));
        }
        self.commit(|doc| {
            doc.workspaces
                .retain(|ws| !(ws.wid == wid && ws.domain == domain));
            Ok(())
        })
    }

    fn get_workspace(&self, wid: &str, domain: &str) -> Option<WorkspaceRecord> {
        self.doc
            .workspaces
            .iter()
            .find(|ws| ws.wid == wid && ws.domain == domain)
            .cloned()
    }

    fn workspaces(&self) -> Vec<WorkspaceRecord> {
        self.doc.workspaces.clone()
    }

    fn set_user_id(&mut self, wid: &str, domain: &str, uid: &str) -> Result<()> {
        validate_user_id(uid)?;
        self.commit(|doc| {
            doc.workspace_mut(wid, domain)?.userid = Some(uid.to_string());
            Ok(())
        })
    }

    fn get_credentials(&self, wid: &str, domain: &str) -> Result<Password> {
        self.get_workspace(wid, domain)
            .map(|ws| Password::assign(ws.password))
            .ok_or_else(|| workspace_not_found(wid, domain))
    }

    fn set_credentials(&mut self, wid: &str, domain: &str, password: &Password) -> Result<()> {
        self.commit(|doc| {
            let record = doc.workspace_mut(wid, domain)?;
            record.password = password.hash().to_string();
            record.pwhashtype = PASSWORD_HASH_TYPE.to_string();
            Ok(())
        })
    }

    fn add_device_session(
        &mut self,
        address: &str,
        devid: &str,
        session: &str,
        devname: Option<&str>,
    ) -> Result<()> {
        let parsed = WorkspaceAddress::parse(address)?;
        if !self.doc.workspaces.iter().any(|ws| ws.wid == parsed.wid) {
            return Err(ClientError::ResourceNotFound(format!("workspace {address}")));
        }
        if self.doc.sessions.iter().any(|s| s.address == address) {
            return Err(ClientError::ResourceExists(format!("session for {address}")));
        }
        let entry = DeviceSession {
            address: address.to_string(),
            devid: devid.to_string(),
            session: session.to_string(),
            devname: devname.map(str::to_string),
        };
        self.commit(|doc| {
            doc.sessions.push(entry);
            Ok(())
        })
    }

    fn update_device_session(&mut self, devid: &str, session: &str) -> Result<()> {
        self.commit(|doc| {
            let entry = doc
                .sessions
                .iter_mut()
                .find(|s| s.devid == devid)
                .ok_or_else(|| ClientError::ResourceNotFound(format!("device {devid}")))?;
            entry.session = session.to_string();
            Ok(())
        })
    }

    fn remove_device_session(&mut self, devid: &str) -> Result<()> {
        if !self.doc.sessions.iter().any(|s| s.devid == devid) {
            return Err(ClientError::ResourceNotFound(format!("device {devid}")));
        }
        self.commit(|doc| {
            doc.sessions.retain(|s| s.devid != devid);
            Ok(())
        })
    }

    fn get_session(&self, address: &str) -> Option<DeviceSession> {
        self.doc
            .sessions
            .iter()
            .find(|s| s.address == address)
            .cloned()
    }

    fn add_key(&mut self, key: StoredKey) -> Result<()> {
        if self.doc.keys.iter().any(|k| k.id == key.id) {
            return Err(ClientError::ResourceExists(format!("key {}", key.id)));
        }
        self.commit(|doc| {
            doc.keys.push(key);
            Ok(())
        })
    }

    fn remove_key(&mut self, id: &str) -> Result<()> {
        if !self.doc.keys.iter().any(|k| k.id == id) {
            return Err(ClientError::ResourceNotFound(format!("key {id}")));
        }
        self.commit(|doc| {
            doc.keys.retain(|k| k.id != id);
            Ok(())
        })
    }

    fn get_key(&self, id: &str) -> Result<StoredKey> {
        self.doc
            .keys
            .iter()
            .find(|k| k.id == id)
            .cloned()
            .ok_or_else(|| ClientError::ResourceNotFound(format!("key {id}")))
    }

    fn add_folder(&mut self, folder: FolderMapping) -> Result<()> {
        if self.doc.folders.iter().any(|f| f.fid == folder.fid) {
            return Err(ClientError::ResourceExists(format!("folder {}", folder.fid)));
        }
        self.commit(|doc| {
            doc.folders.push(folder);
            Ok(())
        })
    }

    fn remove_folder(&mut self, fid: &str) -> Result<()> {
        if !self.doc.folders.iter().any(|f| f.fid == fid) {
            return Err(ClientError::ResourceNotFound(format!("folder {fid}")));
        }
        self.commit(|doc| {
            doc.folders.retain(|f| f.fid != fid);
            Ok(())
        })
    }

    fn get_folder(&self, fid: &str) -> Result<FolderMapping> {
        self.doc
            .folders
            .iter()
            .find(|f| f.fid == fid)
            .cloned()
            .ok_or_else(|| ClientError::ResourceNotFound(format!("folder {fid}")))
    }
}
