//! In-process [`RemoteStore`] for tests and local experiments.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use sealbox_core::{
    Error, Guid, RemoteStore, Result, Revision, VaultFolder, VaultManifest, VaultRoot, Versioned,
    WriteCondition,
};
use sealbox_crypto::{CryptoProvider, SoftwareProvider};

struct NamespaceData {
    manifest: VaultManifest,
    index: Option<Versioned<String>>,
    folders: HashMap<Guid, Versioned<VaultFolder>>,
    files: HashMap<Guid, String>,
}

/// Remote store backed by in-memory maps.
pub struct MemoryRemoteStore {
    provider: Arc<dyn CryptoProvider>,
    namespaces: RwLock<HashMap<String, NamespaceData>>,
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::with_provider(SoftwareProvider::shared())
    }

    /// Store drawing root folder GUIDs from `provider`.
    pub fn with_provider(provider: Arc<dyn CryptoProvider>) -> Self {
        Self {
            provider,
            namespaces: RwLock::new(HashMap::new()),
        }
    }

    /// Manifest of a namespace, if the vault exists.
    pub async fn manifest(&self, namespace: &str) -> Option<VaultManifest> {
        self.namespaces
            .read()
            .await
            .get(namespace)
            .map(|ns| ns.manifest.clone())
    }

    /// Number of file blobs held for a namespace.
    pub async fn file_count(&self, namespace: &str) -> usize {
        self.namespaces
            .read()
            .await
            .get(namespace)
            .map(|ns| ns.files.len())
            .unwrap_or(0)
    }
}

fn missing(namespace: &str) -> Error {
    Error::NotFound(format!("vault {}", namespace))
}

/// Apply `condition` against `current` and return the revision to store.
pub(crate) fn next_revision(
    current: Option<Revision>,
    condition: WriteCondition,
    what: impl FnOnce() -> String,
) -> Result<Revision> {
    if !condition.permits(current) {
        return Err(Error::StaleWrite(what()));
    }
    Ok(current.map(Revision::next).unwrap_or(Revision::INITIAL))
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn exists(&self, namespace: &str) -> Result<bool> {
        Ok(self.namespaces.read().await.contains_key(namespace))
    }

    async fn create(&self, namespace: &str, owner_fingerprint: &str) -> Result<VaultRoot> {
        let mut namespaces = self.namespaces.write().await;
        if namespaces.contains_key(namespace) {
            return Err(Error::InvalidState(format!(
                "vault {} already exists",
                namespace
            )));
        }

        let root = Guid::generate(self.provider.as_ref())?;
        let mut folders = HashMap::new();
        folders.insert(
            root.clone(),
            Versioned::new(VaultFolder::new(root.clone()), Revision::INITIAL),
        );
        namespaces.insert(
            namespace.to_string(),
            NamespaceData {
                manifest: VaultManifest {
                    namespace: namespace.to_string(),
                    root_folder: root.clone(),
                    owner_fingerprint: owner_fingerprint.to_string(),
                    created_at: Utc::now(),
                },
                index: None,
                folders,
                files: HashMap::new(),
            },
        );

        debug!(
            subsystem = "vault",
            component = "memory_store",
            op = "create",
            namespace,
            guid = %root,
            "Vault created"
        );
        Ok(VaultRoot { root_folder: root })
    }

    async fn lookup(&self, namespace: &str) -> Result<VaultRoot> {
        self.namespaces
            .read()
            .await
            .get(namespace)
            .map(|ns| VaultRoot {
                root_folder: ns.manifest.root_folder.clone(),
            })
            .ok_or_else(|| missing(namespace))
    }

    async fn get_index(&self, namespace: &str) -> Result<Option<Versioned<String>>> {
        let namespaces = self.namespaces.read().await;
        let ns = namespaces.get(namespace).ok_or_else(|| missing(namespace))?;
        Ok(ns.index.clone())
    }

    async fn store_index(
        &self,
        namespace: &str,
        data: &str,
        condition: WriteCondition,
    ) -> Result<Revision> {
        let mut namespaces = self.namespaces.write().await;
        let ns = namespaces
            .get_mut(namespace)
            .ok_or_else(|| missing(namespace))?;

        let current = ns.index.as_ref().map(|v| v.revision);
        let revision = next_revision(current, condition, || format!("index of {}", namespace))?;
        ns.index = Some(Versioned::new(data.to_string(), revision));

        debug!(
            subsystem = "vault",
            component = "memory_store",
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
        let namespaces = self.namespaces.read().await;
        let ns = namespaces.get(namespace).ok_or_else(|| missing(namespace))?;
        Ok(ns.folders.get(guid).cloned())
    }

    async fn store_folder(
        &self,
        namespace: &str,
        folder: &VaultFolder,
        condition: WriteCondition,
    ) -> Result<Revision> {
        let mut namespaces = self.namespaces.write().await;
        let ns = namespaces
            .get_mut(namespace)
            .ok_or_else(|| missing(namespace))?;

        let current = ns.folders.get(&folder.id).map(|v| v.revision);
        let revision = next_revision(current, condition, || format!("folder {}", folder.id))?;
        ns.folders
            .insert(folder.id.clone(), Versioned::new(folder.clone(), revision));

        debug!(
            subsystem = "vault",
            component = "memory_store",
            op = "store_folder",
            namespace,
            guid = %folder.id,
            revision = revision.0,
            "Folder stored"
        );
        Ok(revision)
    }

    async fn delete_folder(&self, namespace: &str, guid: &Guid) -> Result<()> {
        let mut namespaces = self.namespaces.write().await;
        let ns = namespaces
            .get_mut(namespace)
            .ok_or_else(|| missing(namespace))?;
        ns.folders.remove(guid);
        Ok(())
    }

    async fn get_file(&self, namespace: &str, guid: &Guid) -> Result<Option<String>> {
        let namespaces = self.namespaces.read().await;
        let ns = namespaces.get(namespace).ok_or_else(|| missing(namespace))?;
        Ok(ns.files.get(guid).cloned())
    }

    async fn store_file(&self, namespace: &str, guid: &Guid, data: &str) -> Result<()> {
        let mut namespaces = self.namespaces.write().await;
        let ns = namespaces
            .get_mut(namespace)
            .ok_or_else(|| missing(namespace))?;
        ns.files.insert(guid.clone(), data.to_string());

        debug!(
            subsystem = "vault",
            component = "memory_store",
            op = "store_file",
            namespace,
            guid = %guid,
            size_bytes = data.len(),
            "File stored"
        );
        Ok(())
    }

    async fn delete_file(&self, namespace: &str, guid: &Guid) -> Result<()> {
        let mut namespaces = self.namespaces.write().await;
        let ns = namespaces
            .get_mut(namespace)
            .ok_or_else(|| missing(namespace))?;
        ns.files.remove(guid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealbox_core::ErrorKind;

    const NS: &str = "00112233445566778899aabbccddeeff";

    #[tokio::test]
    async fn test_create_and_lookup() {
        let store = MemoryRemoteStore::new();
        assert!(!store.exists(NS).await.unwrap());

        let root = store.create(NS, "sha256:0011223344556677").await.unwrap();
        assert!(store.exists(NS).await.unwrap());
        assert_eq!(store.lookup(NS).await.unwrap(), root);

        let folder = store.get_folder(NS, &root.root_folder).await.unwrap().unwrap();
        assert!(folder.value.children.is_empty());
        assert_eq!(folder.revision, Revision::INITIAL);
        assert!(store.get_index(NS).await.unwrap().is_none());
        assert_eq!(
            store.manifest(NS).await.unwrap().owner_fingerprint,
            "sha256:0011223344556677"
        );
    }

    #[tokio::test]
    async fn test_create_twice_rejected() {
        let store = MemoryRemoteStore::new();
        store.create(NS, "sha256:0011223344556677").await.unwrap();
        let err = store.create(NS, "sha256:0011223344556677").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn test_unknown_namespace() {
        let store = MemoryRemoteStore::new();
        assert_eq!(store.lookup(NS).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(store.get_index(NS).await.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_index_revisions() {
        let store = MemoryRemoteStore::new();
        store.create(NS, "fp").await.unwrap();

        let r1 = store.store_index(NS, "a", WriteCondition::IfAbsent).await.unwrap();
        assert_eq!(r1, Revision::INITIAL);

        let err = store.store_index(NS, "b", WriteCondition::IfAbsent).await.unwrap_err();
        assert!(err.is_stale_write());

        let r2 = store
            .store_index(NS, "b", WriteCondition::IfRevision(r1))
            .await
            .unwrap();
        assert_eq!(r2, Revision(2));

        let err = store
            .store_index(NS, "stale", WriteCondition::IfRevision(r1))
            .await
            .unwrap_err();
        assert!(err.is_stale_write());
        assert_eq!(store.get_index(NS).await.unwrap().unwrap().value, "b");

        let r3 = store
            .store_index(NS, "c", WriteCondition::Unconditional)
            .await
            .unwrap();
        assert_eq!(r3, Revision(3));
    }

    #[tokio::test]
    async fn test_stale_folder_write_leaves_folder_untouched() {
        let store = MemoryRemoteStore::new();
        let root = store.create(NS, "fp").await.unwrap().root_folder;
        let read = store.get_folder(NS, &root).await.unwrap().unwrap();

        let mut first = read.value.clone();
        first.link("0a0a0a0a".parse().unwrap());
        store
            .store_folder(NS, &first, WriteCondition::IfRevision(read.revision))
            .await
            .unwrap();

        let mut second = read.value.clone();
        second.link("0b0b0b0b".parse().unwrap());
        let err = store
            .store_folder(NS, &second, WriteCondition::IfRevision(read.revision))
            .await
            .unwrap_err();
        assert!(err.is_stale_write());

        let stored = store.get_folder(NS, &root).await.unwrap().unwrap();
        assert_eq!(stored.value, first);
        assert_eq!(stored.revision, Revision(2));
    }

    #[tokio::test]
    async fn test_files() {
        let store = MemoryRemoteStore::new();
        store.create(NS, "fp").await.unwrap();
        let guid: Guid = "deadbeef".parse().unwrap();

        store.store_file(NS, &guid, "blob").await.unwrap();
        assert_eq!(store.get_file(NS, &guid).await.unwrap().as_deref(), Some("blob"));
        assert_eq!(store.file_count(NS).await, 1);

        store.delete_file(NS, &guid).await.unwrap();
        store.delete_file(NS, &guid).await.unwrap();
        assert!(store.get_file(NS, &guid).await.unwrap().is_none());
    }
}
