//! Creation and teardown of the local data for an individual workspace.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{
    encryption::{FolderMapping, KeyPair, Password, SecretKey},
    errors::{ClientError, Result},
    storage::{StorageBackend, StoredKey},
};

/// Folder mappings every new workspace starts with.
pub const DEFAULT_FOLDERS: [&str; 7] = [
    "messages",
    "contacts",
    "events",
    "tasks",
    "notes",
    "files",
    "files attachments",
];

const ROOT_PERMISSIONS: &str = "root";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    path: PathBuf,
    wid: String,
    domain: String,
}

impl Workspace {
    pub fn new(path: impl Into<PathBuf>, domain: impl Into<String>, wid: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            wid: wid.into(),
            domain: domain.into(),
        }
    }

    /// Adds the workspace record, its keys, folder mappings and on-disk folders.
    /// Partial state is removed when a later step fails.
    pub fn generate(
        store: &mut dyn StorageBackend,
        path: &Path,
        domain: &str,
        wid: &str,
        password: &Password,
    ) -> Result<Self> {
        let workspace = Self::new(path, domain, wid);
        store.add_workspace(wid, domain, password)?;
        let address = workspace.address();

        let identity = KeyPair::generate("identity");
        let conrequest = KeyPair::generate("conrequest");
        let broadcast = SecretKey::generate("broadcast");
        let folder = SecretKey::generate("folder");
        let keys = [
            StoredKey::from_pair(&identity, &address),
            StoredKey::from_pair(&conrequest, &address),
            StoredKey::from_secret(&broadcast, &address),
            StoredKey::from_secret(&folder, &address),
        ];
        for key in keys {
            if let Err(err) = store.add_key(key) {
                warn!(%address, error = %err, "failed to store workspace key");
                workspace.remove_from_db(store)?;
                return Err(err);
            }
        }

        for name in DEFAULT_FOLDERS {
            let mapping = FolderMapping::new(&address, folder.id(), name, ROOT_PERMISSIONS);
            if let Err(err) = store.add_folder(mapping) {
                workspace.remove_from_db(store)?;
                return Err(err);
            }
        }

        if let Err(err) = fs::create_dir_all(workspace.path.join("files").join("attachments")) {
            workspace.remove_from_db(store)?;
            return Err(ClientError::StorageError(format!(
                "unable to create workspace folders in {}: {err}",
                workspace.path.display()
            )));
        }

        debug!(%address, path = %workspace.path.display(), "generated workspace");
        Ok(workspace)
    }

    pub fn address(&self) -> String {
        format!("{}/{}", self.wid, self.domain)
    }

    pub fn wid(&self) -> &str {
        &self.wid
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_user_id(&self, store: &mut dyn StorageBackend, uid: &str) -> Result<()> {
        store.set_user_id(&self.wid, &self.domain, uid)
    }

    /// Removes every record belonging to this workspace.
    pub fn remove_from_db(&self, store: &mut dyn StorageBackend) -> Result<()> {
        store.remove_workspace(&self.wid, &self.domain)
    }
}
