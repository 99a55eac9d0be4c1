//! Shared fixtures for vault integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tokio::sync::{Barrier, Notify};

use sealbox_core::{
    ConcurrencyMode, Guid, RemoteStore, Result, Revision, VaultFolder, VaultRoot, Versioned,
    WriteCondition,
};
use sealbox_crypto::{EncryptionAlgorithm, KeyManager, KeyPairRecord, SoftwareProvider};
use sealbox_vault::{MemoryRemoteStore, VaultService};

/// RSA-2048 keeps the fixture fast; the vault only needs RSA-OAEP.
pub fn owner() -> &'static KeyPairRecord {
    static CELL: OnceLock<KeyPairRecord> = OnceLock::new();
    CELL.get_or_init(|| {
        KeyManager::new(SoftwareProvider::shared())
            .with_rsa_modulus_bits(2048)
            .generate("owner", EncryptionAlgorithm::RsaOaep)
            .expect("RSA key generation")
    })
}

pub fn stranger() -> &'static KeyPairRecord {
    static CELL: OnceLock<KeyPairRecord> = OnceLock::new();
    CELL.get_or_init(|| {
        KeyManager::new(SoftwareProvider::shared())
            .with_rsa_modulus_bits(2048)
            .generate("stranger", EncryptionAlgorithm::RsaOaep)
            .expect("RSA key generation")
    })
}

pub async fn open_vault(store: Arc<dyn RemoteStore>, mode: ConcurrencyMode) -> VaultService {
    let vault = VaultService::new(SoftwareProvider::shared(), store).with_concurrency(mode);
    vault.set_identity(owner().clone()).await;
    vault.open_or_create().await.expect("open vault");
    vault
}

/// Store wrapper that, once armed, holds the next `parties` folder reads at
/// a barrier so that every reader sees the same revision.
pub struct GatedStore {
    inner: Arc<MemoryRemoteStore>,
    barrier: Barrier,
    parties: usize,
    armed: AtomicBool,
    gated: AtomicUsize,
}

impl GatedStore {
    pub fn new(inner: Arc<MemoryRemoteStore>, parties: usize) -> Self {
        Self {
            inner,
            barrier: Barrier::new(parties),
            parties,
            armed: AtomicBool::new(false),
            gated: AtomicUsize::new(0),
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteStore for GatedStore {
    async fn exists(&self, namespace: &str) -> Result<bool> {
        self.inner.exists(namespace).await
    }

    async fn create(&self, namespace: &str, owner_fingerprint: &str) -> Result<VaultRoot> {
        self.inner.create(namespace, owner_fingerprint).await
    }

    async fn lookup(&self, namespace: &str) -> Result<VaultRoot> {
        self.inner.lookup(namespace).await
    }

    async fn get_index(&self, namespace: &str) -> Result<Option<Versioned<String>>> {
        self.inner.get_index(namespace).await
    }

    async fn store_index(
        &self,
        namespace: &str,
        data: &str,
        condition: WriteCondition,
    ) -> Result<Revision> {
        self.inner.store_index(namespace, data, condition).await
    }

    async fn get_folder(
        &self,
        namespace: &str,
        guid: &Guid,
    ) -> Result<Option<Versioned<VaultFolder>>> {
        let result = self.inner.get_folder(namespace, guid).await;
        if self.armed.load(Ordering::SeqCst)
            && self.gated.fetch_add(1, Ordering::SeqCst) < self.parties
        {
            self.barrier.wait().await;
        }
        result
    }

    async fn store_folder(
        &self,
        namespace: &str,
        folder: &VaultFolder,
        condition: WriteCondition,
    ) -> Result<Revision> {
        self.inner.store_folder(namespace, folder, condition).await
    }

    async fn delete_folder(&self, namespace: &str, guid: &Guid) -> Result<()> {
        self.inner.delete_folder(namespace, guid).await
    }

    async fn get_file(&self, namespace: &str, guid: &Guid) -> Result<Option<String>> {
        self.inner.get_file(namespace, guid).await
    }

    async fn store_file(&self, namespace: &str, guid: &Guid, data: &str) -> Result<()> {
        self.inner.store_file(namespace, guid, data).await
    }

    async fn delete_file(&self, namespace: &str, guid: &Guid) -> Result<()> {
        self.inner.delete_file(namespace, guid).await
    }
}

/// Store wrapper that, once armed, pauses the next folder write: it signals
/// `reached`, then waits for `release` before forwarding the write.
pub struct HeldFolderWriteStore {
    inner: Arc<MemoryRemoteStore>,
    armed: AtomicBool,
    pub reached: Notify,
    pub release: Notify,
}

impl HeldFolderWriteStore {
    pub fn new(inner: Arc<MemoryRemoteStore>) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(false),
            reached: Notify::new(),
            release: Notify::new(),
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteStore for HeldFolderWriteStore {
    async fn exists(&self, namespace: &str) -> Result<bool> {
        self.inner.exists(namespace).await
    }

    async fn create(&self, namespace: &str, owner_fingerprint: &str) -> Result<VaultRoot> {
        self.inner.create(namespace, owner_fingerprint).await
    }

    async fn lookup(&self, namespace: &str) -> Result<VaultRoot> {
        self.inner.lookup(namespace).await
    }

    async fn get_index(&self, namespace: &str) -> Result<Option<Versioned<String>>> {
        self.inner.get_index(namespace).await
    }

    async fn store_index(
        &self,
        namespace: &str,
        data: &str,
        condition: WriteCondition,
    ) -> Result<Revision> {
        self.inner.store_index(namespace, data, condition).await
    }

    async fn get_folder(
        &self,
        namespace: &str,
        guid: &Guid,
    ) -> Result<Option<Versioned<VaultFolder>>> {
        self.inner.get_folder(namespace, guid).await
    }

    async fn store_folder(
        &self,
        namespace: &str,
        folder: &VaultFolder,
        condition: WriteCondition,
    ) -> Result<Revision> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.reached.notify_one();
            self.release.notified().await;
        }
        self.inner.store_folder(namespace, folder, condition).await
    }

    async fn delete_folder(&self, namespace: &str, guid: &Guid) -> Result<()> {
        self.inner.delete_folder(namespace, guid).await
    }

    async fn get_file(&self, namespace: &str, guid: &Guid) -> Result<Option<String>> {
        self.inner.get_file(namespace, guid).await
    }

    async fn store_file(&self, namespace: &str, guid: &Guid, data: &str) -> Result<()> {
        self.inner.store_file(namespace, guid, data).await
    }

    async fn delete_file(&self, namespace: &str, guid: &Guid) -> Result<()> {
        self.inner.delete_file(namespace, guid).await
    }
}

/// Store wrapper whose index writes always fail.
pub struct FailingIndexStore {
    pub inner: Arc<MemoryRemoteStore>,
    pub fail: AtomicBool,
}

#[async_trait]
impl RemoteStore for FailingIndexStore {
    async fn exists(&self, namespace: &str) -> Result<bool> {
        self.inner.exists(namespace).await
    }

    async fn create(&self, namespace: &str, owner_fingerprint: &str) -> Result<VaultRoot> {
        self.inner.create(namespace, owner_fingerprint).await
    }

    async fn lookup(&self, namespace: &str) -> Result<VaultRoot> {
        self.inner.lookup(namespace).await
    }

    async fn get_index(&self, namespace: &str) -> Result<Option<Versioned<String>>> {
        self.inner.get_index(namespace).await
    }

    async fn store_index(
        &self,
        namespace: &str,
        data: &str,
        condition: WriteCondition,
    ) -> Result<Revision> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(sealbox_core::Error::Storage("index write refused".into()));
        }
        self.inner.store_index(namespace, data, condition).await
    }

    async fn get_folder(
        &self,
        namespace: &str,
        guid: &Guid,
    ) -> Result<Option<Versioned<VaultFolder>>> {
        self.inner.get_folder(namespace, guid).await
    }

    async fn store_folder(
        &self,
        namespace: &str,
        folder: &VaultFolder,
        condition: WriteCondition,
    ) -> Result<Revision> {
        self.inner.store_folder(namespace, folder, condition).await
    }

    async fn delete_folder(&self, namespace: &str, guid: &Guid) -> Result<()> {
        self.inner.delete_folder(namespace, guid).await
    }

    async fn get_file(&self, namespace: &str, guid: &Guid) -> Result<Option<String>> {
        self.inner.get_file(namespace, guid).await
    }

    async fn store_file(&self, namespace: &str, guid: &Guid, data: &str) -> Result<()> {
        self.inner.store_file(namespace, guid, data).await
    }

    async fn delete_file(&self, namespace: &str, guid: &Guid) -> Result<()> {
        self.inner.delete_file(namespace, guid).await
    }
}
