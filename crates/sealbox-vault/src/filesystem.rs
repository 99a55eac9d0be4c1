//! [`RemoteStore`] backed by a local directory tree.
//!
//! Layout, one directory per namespace:
//!
//! ```text
//! {root}/{namespace}/manifest.json
//! {root}/{namespace}/index.json          {"revision":N,"data":"<base64>"}
//! {root}/{namespace}/folders/{guid}.json {"revision":N,"folder":{...}}
//! {root}/{namespace}/files/{guid}.blob   <base64>
//! ```
//!
//! Writes go to a temp file and are renamed into place. All writes through
//! one store are serialized by an async mutex, which makes conditional
//! writes race-free within a process. Separate processes sharing a
//! directory get no such guarantee.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use sealbox_core::{
    Error, Guid, RemoteStore, Result, Revision, VaultFolder, VaultManifest, VaultRoot, Versioned,
    WriteCondition,
};
use sealbox_crypto::{CryptoProvider, SoftwareProvider};

use crate::memory::next_revision;

const MANIFEST_FILE: &str = "manifest.json";
const INDEX_FILE: &str = "index.json";
const FOLDERS_DIR: &str = "folders";
const FILES_DIR: &str = "files";

#[derive(Serialize, Deserialize)]
struct IndexRecord {
    revision: Revision,
    data: String,
}

#[derive(Serialize, Deserialize)]
struct FolderRecord {
    revision: Revision,
    folder: VaultFolder,
}

/// Remote store persisted under a local directory.
pub struct FilesystemRemoteStore {
    root: PathBuf,
    provider: Arc<dyn CryptoProvider>,
    write_lock: Mutex<()>,
}

impl FilesystemRemoteStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_provider(root, SoftwareProvider::shared())
    }

    pub fn with_provider(root: impl Into<PathBuf>, provider: Arc<dyn CryptoProvider>) -> Self {
        Self {
            root: root.into(),
            provider,
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a namespace. Namespaces are lowercase hex only, so
    /// nothing outside `root` can be addressed.
    fn namespace_dir(&self, namespace: &str) -> Result<PathBuf> {
        if namespace.is_empty()
            || !namespace
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(Error::InvalidInput(format!(
                "Invalid vault namespace '{}'",
                namespace
            )));
        }
        Ok(self.root.join(namespace))
    }

    async fn existing_namespace_dir(&self, namespace: &str) -> Result<PathBuf> {
        let dir = self.namespace_dir(namespace)?;
        if !fs::try_exists(dir.join(MANIFEST_FILE)).await? {
            return Err(Error::NotFound(format!("vault {}", namespace)));
        }
        Ok(dir)
    }

    fn folder_path(dir: &Path, guid: &Guid) -> PathBuf {
        dir.join(FOLDERS_DIR).join(format!("{}.json", guid))
    }

    fn file_path(dir: &Path, guid: &Guid) -> PathBuf {
        dir.join(FILES_DIR).join(format!("{}.blob", guid))
    }

    /// Read the manifest of an existing vault.
    pub async fn manifest(&self, namespace: &str) -> Result<VaultManifest> {
        let dir = self.existing_namespace_dir(namespace).await?;
        read_json(&dir.join(MANIFEST_FILE))
            .await?
            .ok_or_else(|| Error::NotFound(format!("vault {}", namespace)))
    }
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Io(e)),
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match read_optional(path).await? {
        Some(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            Error::Storage(format!("Corrupt remote object {}: {}", path.display(), e))
        }),
        None => Ok(None),
    }
}

/// Atomic write: temp file + rename.
async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(|e| {
            warn!(parent = %parent.display(), error = %e, "fs_store: create_dir_all failed");
            e
        })?;
    }

    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&temp_path, path).await.map_err(|e| {
        warn!(from = %temp_path.display(), to = %path.display(), error = %e, "fs_store: rename failed");
        e
    })?;
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}

#[async_trait]
impl RemoteStore for FilesystemRemoteStore {
    async fn exists(&self, namespace: &str) -> Result<bool> {
        let dir = self.namespace_dir(namespace)?;
        Ok(fs::try_exists(dir.join(MANIFEST_FILE)).await?)
    }

    async fn create(&self, namespace: &str, owner_fingerprint: &str) -> Result<VaultRoot> {
        let dir = self.namespace_dir(namespace)?;
        let _guard = self.write_lock.lock().await;

        if fs::try_exists(dir.join(MANIFEST_FILE)).await? {
            return Err(Error::InvalidState(format!(
                "vault {} already exists",
                namespace
            )));
        }

        let root = Guid::generate(self.provider.as_ref())?;
        let folder = FolderRecord {
            revision: Revision::INITIAL,
            folder: VaultFolder::new(root.clone()),
        };
        write_atomic(&Self::folder_path(&dir, &root), &serde_json::to_vec(&folder)?).await?;

        // The manifest goes last: its presence is what makes the vault exist.
        let manifest = VaultManifest {
            namespace: namespace.to_string(),
            root_folder: root.clone(),
            owner_fingerprint: owner_fingerprint.to_string(),
            created_at: Utc::now(),
        };
        write_atomic(
            &dir.join(MANIFEST_FILE),
            &serde_json::to_vec_pretty(&manifest)?,
        )
        .await?;

        debug!(
            subsystem = "vault",
            component = "fs_store",
            op = "create",
            namespace,
            guid = %root,
            "Vault created"
        );
        Ok(VaultRoot { root_folder: root })
    }

    async fn lookup(&self, namespace: &str) -> Result<VaultRoot> {
        let manifest = self.manifest(namespace).await?;
        Ok(VaultRoot {
            root_folder: manifest.root_folder,
        })
    }

    async fn get_index(&self, namespace: &str) -> Result<Option<Versioned<String>>> {
        let dir = self.existing_namespace_dir(namespace).await?;
        let record: Option<IndexRecord> = read_json(&dir.join(INDEX_FILE)).await?;
        Ok(record.map(|r| Versioned::new(r.data, r.revision)))
    }

    async fn store_index(
        &self,
        namespace: &str,
        data: &str,
        condition: WriteCondition,
    ) -> Result<Revision> {
        let dir = self.existing_namespace_dir(namespace).await?;
        let path = dir.join(INDEX_FILE);
        let _guard = self.write_lock.lock().await;

        let current: Option<IndexRecord> = read_json(&path).await?;
        let revision = next_revision(current.map(|r| r.revision), condition, || {
            format!("index of {}", namespace)
        })?;
        let record = IndexRecord {
            revision,
            data: data.to_string(),
        };
        write_atomic(&path, &serde_json::to_vec(&record)?).await?;

        debug!(
            subsystem = "vault",
            component = "fs_store",
            op = "store_index",
            namespace,
            revision = revision.0,
            size_bytes = data.len(),
            "Index stored"
        );
        Ok(revision)
    }

    async fn get_folder(
        &self,
        namespace: &str,
        guid: &Guid,
    ) -> Result<Option<Versioned<VaultFolder>>> {
        let dir = self.existing_namespace_dir(namespace).await?;
        let record: Option<FolderRecord> = read_json(&Self::folder_path(&dir, guid)).await?;
        Ok(record.map(|r| Versioned::new(r.folder, r.revision)))
    }

    async fn store_folder(
        &self,
        namespace: &str,
        folder: &VaultFolder,
        condition: WriteCondition,
    ) -> Result<Revision> {
        let dir = self.existing_namespace_dir(namespace).await?;
        let path = Self::folder_path(&dir, &folder.id);
        let _guard = self.write_lock.lock().await;

        let current: Option<FolderRecord> = read_json(&path).await?;
        let revision = next_revision(current.map(|r| r.revision), condition, || {
            format!("folder {}", folder.id)
        })?;
        let record = FolderRecord {
            revision,
            folder: folder.clone(),
        };
        write_atomic(&path, &serde_json::to_vec(&record)?).await?;

        debug!(
            subsystem = "vault",
            component = "fs_store",
            op = "store_folder",
            namespace,
            guid = %folder.id,
            revision = revision.0,
            "Folder stored"
        );
        Ok(revision)
    }

    async fn delete_folder(&self, namespace: &str, guid: &Guid) -> Result<()> {
        let dir = self.existing_namespace_dir(namespace).await?;
        let _guard = self.write_lock.lock().await;
        remove_if_exists(&Self::folder_path(&dir, guid)).await
    }

    async fn get_file(&self, namespace: &str, guid: &Guid) -> Result<Option<String>> {
        let dir = self.existing_namespace_dir(namespace).await?;
        match read_optional(&Self::file_path(&dir, guid)).await? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| Error::Storage(format!("Corrupt file blob {}", guid))),
            None => Ok(None),
        }
    }

    async fn store_file(&self, namespace: &str, guid: &Guid, data: &str) -> Result<()> {
        let dir = self.existing_namespace_dir(namespace).await?;
        let _guard = self.write_lock.lock().await;
        write_atomic(&Self::file_path(&dir, guid), data.as_bytes()).await?;

        debug!(
            subsystem = "vault",
            component = "fs_store",
            op = "store_file",
            namespace,
            guid = %guid,
            size_bytes = data.len(),
            "File stored"
        );
        Ok(())
    }

    async fn delete_file(&self, namespace: &str, guid: &Guid) -> Result<()> {
        let dir = self.existing_namespace_dir(namespace).await?;
        let _guard = self.write_lock.lock().await;
        remove_if_exists(&Self::file_path(&dir, guid)).await
    }
}
