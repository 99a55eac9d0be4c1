//! Vault session: `no-key → locked → open`.
//!
//! A [`VaultService`] holds one identity and, once opened, the decrypted
//! [`VaultIndex`] of that identity's namespace. Folder objects are read
//! from the remote store on demand; names only ever come from the index.
//!
//! Every mutation is a sequence of independent remote writes. Folder and
//! index writes are read-modify-write cycles guarded according to the
//! service's [`ConcurrencyMode`]. A mutation that fails after its first
//! remote write returns [`Error::PartialWrite`] and is logged at ERROR with
//! `divergence = true`; nothing is rolled back.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;
use tracing::{debug, error, info, trace, warn};

use sealbox_core::defaults;
use sealbox_core::{
    AuditReport, ConcurrencyMode, EntryKind, Error, FolderListing, Guid, IndexEntry, ListedEntry,
    RemoteStore, Result, Revision, VaultFolder, VaultIndex, VaultState, WriteCondition,
};
use sealbox_crypto::{
    CryptoError, CryptoProvider, EncryptionAlgorithm, HybridCipher, KeyManager, KeyPairRecord,
    PrivateKeyHandle, PublicKeyHandle,
};

#[derive(Clone)]
struct OpenVault {
    namespace: String,
    root: Guid,
    index: VaultIndex,
    index_revision: Option<Revision>,
}

#[derive(Default)]
struct Session {
    identity: Option<KeyPairRecord>,
    vault: Option<OpenVault>,
}

/// Snapshot of an open session taken at the start of an operation.
struct Context {
    namespace: String,
    root: Guid,
    public_key: PublicKeyHandle,
    private_key: PrivateKeyHandle,
    index: VaultIndex,
    index_revision: Option<Revision>,
}

/// Zero-knowledge file vault over a [`RemoteStore`].
pub struct VaultService {
    provider: Arc<dyn CryptoProvider>,
    keys: KeyManager,
    cipher: HybridCipher,
    store: Arc<dyn RemoteStore>,
    mode: ConcurrencyMode,
    max_write_retries: u32,
    session: RwLock<Session>,
}

impl VaultService {
    pub fn new(provider: Arc<dyn CryptoProvider>, store: Arc<dyn RemoteStore>) -> Self {
        Self {
            keys: KeyManager::new(provider.clone()),
            cipher: HybridCipher::new(provider.clone()),
            provider,
            store,
            mode: ConcurrencyMode::default(),
            max_write_retries: defaults::MAX_WRITE_RETRIES,
            session: RwLock::new(Session::default()),
        }
    }

    pub fn with_concurrency(mut self, mode: ConcurrencyMode) -> Self {
        self.mode = mode;
        self
    }

    /// Retries after a stale write, per folder or index write.
    pub fn with_max_write_retries(mut self, retries: u32) -> Self {
        self.max_write_retries = retries;
        self
    }

    pub fn concurrency(&self) -> ConcurrencyMode {
        self.mode
    }

    // =========================================================================
    // STATE MACHINE
    // =========================================================================

    pub async fn state(&self) -> VaultState {
        let session = self.session.read().await;
        match (&session.identity, &session.vault) {
            (None, _) => VaultState::NoKey,
            (Some(_), None) => VaultState::Locked,
            (Some(_), Some(_)) => VaultState::Open,
        }
    }

    /// Act as `identity`. Moves `no-key → locked`; switching to a different
    /// identity closes any open vault.
    pub async fn set_identity(&self, identity: KeyPairRecord) {
        let mut session = self.session.write().await;
        let same = session
            .identity
            .as_ref()
            .is_some_and(|current| current.fingerprint == identity.fingerprint);
        if !same {
            session.vault = None;
        }
        session.identity = Some(identity);
    }

    /// Namespace of the current identity.
    pub async fn namespace(&self) -> Result<String> {
        let identity = self.identity().await?;
        Ok(self.keys.vault_namespace(&identity.public_key)?)
    }

    /// Root folder of the open vault.
    pub async fn root_folder(&self) -> Result<Guid> {
        Ok(self.context().await?.root)
    }

    async fn identity(&self) -> Result<KeyPairRecord> {
        let session = self.session.read().await;
        let identity = session
            .identity
            .clone()
            .ok_or_else(|| Error::InvalidState("no identity key pair; generate one first".into()))?;
        if identity.algorithm != EncryptionAlgorithm::RsaOaep {
            return Err(CryptoError::UnsupportedAlgorithm(format!(
                "the vault requires an RSA-OAEP identity, found {}",
                identity.algorithm
            ))
            .into());
        }
        Ok(identity)
    }

    async fn context(&self) -> Result<Context> {
        let session = self.session.read().await;
        match (&session.identity, &session.vault) {
            (Some(identity), Some(vault)) => Ok(Context {
                namespace: vault.namespace.clone(),
                root: vault.root.clone(),
                public_key: identity.public_key.clone(),
                private_key: identity.private_key.clone(),
                index: vault.index.clone(),
                index_revision: vault.index_revision,
            }),
            (None, _) => Err(Error::InvalidState(
                "no identity key pair; generate one first".into(),
            )),
            (Some(_), None) => Err(Error::InvalidState("vault is locked; open it first".into())),
        }
    }

    /// Create the vault for the current identity (`locked → open`).
    ///
    /// The remote store allocates the root folder; an empty encrypted index
    /// is stored right after.
    pub async fn create(&self) -> Result<Guid> {
        let start = Instant::now();
        let identity = self.identity().await?;
        let namespace = self.keys.vault_namespace(&identity.public_key)?;

        if self.store.exists(&namespace).await? {
            return Err(Error::InvalidState(format!(
                "vault {} already exists",
                namespace
            )));
        }

        let root = self
            .store
            .create(&namespace, &identity.fingerprint)
            .await?
            .root_folder;

        let index = VaultIndex::new();
        let revision = match self.seal_index(&identity.public_key, &index) {
            Ok(blob) => self
                .store
                .store_index(&namespace, &blob, WriteCondition::IfAbsent)
                .await,
            Err(e) => Err(e),
        }
        .map_err(|e| diverged("create", &root, "create", e))?;

        self.install(namespace.clone(), root.clone(), index, Some(revision))
            .await;

        info!(
            subsystem = "vault",
            component = "service",
            op = "create",
            namespace = %namespace,
            guid = %root,
            fingerprint = %identity.fingerprint,
            duration_ms = start.elapsed().as_millis() as u64,
            "Vault created"
        );
        Ok(root)
    }

    /// Open the existing vault of the current identity (`locked → open`).
    pub async fn open(&self) -> Result<Guid> {
        let start = Instant::now();
        let identity = self.identity().await?;
        let namespace = self.keys.vault_namespace(&identity.public_key)?;

        if !self.store.exists(&namespace).await? {
            return Err(Error::NotFound(format!("vault {}", namespace)));
        }
        let root = self.store.lookup(&namespace).await?.root_folder;
        let (index, revision) = self.fetch_index(&namespace, &identity.private_key).await?;
        let entries = index.len();

        self.install(namespace.clone(), root.clone(), index, revision)
            .await;

        info!(
            subsystem = "vault",
            component = "service",
            op = "open",
            namespace = %namespace,
            guid = %root,
            result_count = entries,
            duration_ms = start.elapsed().as_millis() as u64,
            "Vault opened"
        );
        Ok(root)
    }

    /// Open the vault, creating it first if the namespace is empty.
    pub async fn open_or_create(&self) -> Result<Guid> {
        let namespace = self.namespace().await?;
        if self.store.exists(&namespace).await? {
            self.open().await
        } else {
            self.create().await
        }
    }

    /// Re-read the index from the remote store.
    pub async fn refresh(&self) -> Result<()> {
        let ctx = self.context().await?;
        let (index, revision) = self.fetch_index(&ctx.namespace, &ctx.private_key).await?;
        self.install(ctx.namespace, ctx.root, index, revision).await;
        Ok(())
    }

    async fn install(
        &self,
        namespace: String,
        root: Guid,
        index: VaultIndex,
        index_revision: Option<Revision>,
    ) {
        self.session.write().await.vault = Some(OpenVault {
            namespace,
            root,
            index,
            index_revision,
        });
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Children of a folder (the root when `folder` is `None`), resolved
    /// against the index. Children without an index entry are orphans.
    pub async fn list_folder(&self, folder: Option<&Guid>) -> Result<FolderListing> {
        let ctx = self.context().await?;
        let guid = folder.cloned().unwrap_or_else(|| ctx.root.clone());
        let remote = self
            .store
            .get_folder(&ctx.namespace, &guid)
            .await?
            .ok_or_else(|| Error::NotFound(format!("folder {}", guid)))?;

        let mut entries = Vec::with_capacity(remote.value.children.len());
        let mut orphans = Vec::new();
        for child in remote.value.children {
            match ctx.index.get(&child) {
                Some(entry) => {
                    trace!(
                        subsystem = "vault",
                        component = "service",
                        op = "list_folder",
                        guid = %child,
                        parent_guid = %guid,
                        kind = %entry.kind,
                        "Resolved child"
                    );
                    entries.push(ListedEntry {
                        guid: child,
                        entry: entry.clone(),
                    });
                }
                None => orphans.push(child),
            }
        }

        if !orphans.is_empty() {
            warn!(
                subsystem = "vault",
                component = "service",
                op = "list_folder",
                guid = %guid,
                result_count = orphans.len(),
                divergence = true,
                "Folder links children with no index entry"
            );
        }

        Ok(FolderListing {
            folder: guid,
            entries,
            orphans,
        })
    }

    /// Index metadata of a GUID.
    pub async fn stat(&self, guid: &Guid) -> Result<IndexEntry> {
        let ctx = self.context().await?;
        ctx.index
            .get(guid)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("entry {}", guid)))
    }

    /// Fetch and decrypt a file.
    pub async fn download_file(&self, guid: &Guid) -> Result<Vec<u8>> {
        let ctx = self.context().await?;
        if ctx.index.get(guid).map(|e| e.kind) == Some(EntryKind::Folder) {
            return Err(Error::InvalidInput(format!("{} is a folder", guid)));
        }
        let blob = self
            .store
            .get_file(&ctx.namespace, guid)
            .await?
            .ok_or_else(|| Error::NotFound(format!("file {}", guid)))?;
        Ok(self.cipher.open_blob(&ctx.private_key, &blob)?)
    }

    /// Compare the folder graph reachable from the root with the index.
    pub async fn audit(&self) -> Result<AuditReport> {
        let ctx = self.context().await?;
        let mut folders: HashMap<Guid, Option<VaultFolder>> = HashMap::new();
        let mut queue = VecDeque::from([ctx.root.clone()]);
        let mut report = AuditReport::default();

        while let Some(guid) = queue.pop_front() {
            if folders.contains_key(&guid) {
                continue;
            }
            let folder = self.store.get_folder(&ctx.namespace, &guid).await?;
            if let Some(folder) = &folder {
                report.folders_scanned += 1;
                for child in &folder.value.children {
                    match ctx.index.get(child) {
                        None => report.unindexed.push(child.clone()),
                        Some(entry) if entry.kind == EntryKind::Folder => {
                            queue.push_back(child.clone())
                        }
                        Some(_) => {}
                    }
                }
            }
            folders.insert(guid, folder.map(|v| v.value));
        }

        for (guid, entry) in ctx.index.iter() {
            if !folders.contains_key(&entry.parent_guid) {
                let parent = self
                    .store
                    .get_folder(&ctx.namespace, &entry.parent_guid)
                    .await?;
                folders.insert(entry.parent_guid.clone(), parent.map(|v| v.value));
            }
            let linked = folders
                .get(&entry.parent_guid)
                .and_then(|f| f.as_ref())
                .is_some_and(|f| f.contains(guid));
            if !linked {
                report.unlinked.push(guid.clone());
            }
        }

        if !report.is_consistent() {
            warn!(
                subsystem = "vault",
                component = "service",
                op = "audit",
                namespace = %ctx.namespace,
                unindexed = report.unindexed.len(),
                unlinked = report.unlinked.len(),
                divergence = true,
                "Folder graph and index disagree"
            );
        }
        Ok(report)
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// Encrypt and store a file, link it into `folder` (the root when
    /// `None`) and index it.
    pub async fn upload_file(
        &self,
        folder: Option<&Guid>,
        name: &str,
        contents: &[u8],
        mime: Option<&str>,
    ) -> Result<Guid> {
        let start = Instant::now();
        let ctx = self.context().await?;
        validate_name(name)?;
        let parent = resolve_parent(&ctx, folder)?;
        let guid = self.new_guid(&ctx)?;

        let blob = self.cipher.seal_blob(&ctx.public_key, contents)?;
        self.store.store_file(&ctx.namespace, &guid, &blob).await?;

        let linked = guid.clone();
        self.commit_folder(&ctx.namespace, &parent, move |f| {
            f.link(linked.clone());
            Ok(())
        })
        .await
        .map_err(|e| diverged("upload_file", &guid, "store_file", e))?;

        let entry = IndexEntry::file(
            name,
            contents.len() as u64,
            Some(mime.unwrap_or(defaults::DEFAULT_MIME).to_string()),
            parent.clone(),
        );
        let indexed = guid.clone();
        self.commit_index(move |index| {
            index.insert(indexed.clone(), entry.clone());
            Ok(())
        })
        .await
        .map_err(|e| diverged("upload_file", &guid, "link_folder", e))?;

        info!(
            subsystem = "vault",
            component = "service",
            op = "upload_file",
            guid = %guid,
            parent_guid = %parent,
            size_bytes = blob.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "File uploaded"
        );
        Ok(guid)
    }

    /// Create an empty folder inside `parent` (the root when `None`).
    pub async fn create_folder(&self, parent: Option<&Guid>, name: &str) -> Result<Guid> {
        let ctx = self.context().await?;
        validate_name(name)?;
        let parent = resolve_parent(&ctx, parent)?;
        let guid = self.new_guid(&ctx)?;

        self.store
            .store_folder(
                &ctx.namespace,
                &VaultFolder::new(guid.clone()),
                WriteCondition::IfAbsent,
            )
            .await?;

        let linked = guid.clone();
        self.commit_folder(&ctx.namespace, &parent, move |f| {
            f.link(linked.clone());
            Ok(())
        })
        .await
        .map_err(|e| diverged("create_folder", &guid, "store_folder", e))?;

        let entry = IndexEntry::folder(name, parent.clone());
        let indexed = guid.clone();
        self.commit_index(move |index| {
            index.insert(indexed.clone(), entry.clone());
            Ok(())
        })
        .await
        .map_err(|e| diverged("create_folder", &guid, "link_folder", e))?;

        info!(
            subsystem = "vault",
            component = "service",
            op = "create_folder",
            guid = %guid,
            parent_guid = %parent,
            "Folder created"
        );
        Ok(guid)
    }

    /// Unlink a file from its folder, drop its index entry and delete its
    /// blob. The blob delete is best effort.
    pub async fn delete_file(&self, guid: &Guid) -> Result<()> {
        let ctx = self.context().await?;
        let entry = ctx
            .index
            .get(guid)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("file {}", guid)))?;
        if entry.kind != EntryKind::File {
            return Err(Error::InvalidInput(format!("{} is a folder", guid)));
        }

        self.unlink_and_unindex("delete_file", &ctx, guid, &entry.parent_guid)
            .await?;

        if let Err(e) = self.store.delete_file(&ctx.namespace, guid).await {
            warn!(
                subsystem = "vault",
                component = "service",
                op = "delete_file",
                guid = %guid,
                error = %e,
                "File unlinked and unindexed but blob delete failed"
            );
        }

        info!(
            subsystem = "vault",
            component = "service",
            op = "delete_file",
            guid = %guid,
            parent_guid = %entry.parent_guid,
            "File deleted"
        );
        Ok(())
    }

    /// Delete an empty folder. The root cannot be deleted.
    pub async fn delete_folder(&self, guid: &Guid) -> Result<()> {
        let ctx = self.context().await?;
        if *guid == ctx.root {
            return Err(Error::InvalidInput("the root folder cannot be deleted".into()));
        }
        let entry = ctx
            .index
            .get(guid)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("folder {}", guid)))?;
        if entry.kind != EntryKind::Folder {
            return Err(Error::InvalidInput(format!("{} is a file", guid)));
        }

        let remote_children = self
            .store
            .get_folder(&ctx.namespace, guid)
            .await?
            .map(|f| f.value.children.len())
            .unwrap_or(0);
        if remote_children > 0 || ctx.index.children_of(guid).next().is_some() {
            return Err(Error::InvalidInput(format!("folder {} is not empty", guid)));
        }

        self.unlink_and_unindex("delete_folder", &ctx, guid, &entry.parent_guid)
            .await?;

        if let Err(e) = self.store.delete_folder(&ctx.namespace, guid).await {
            warn!(
                subsystem = "vault",
                component = "service",
                op = "delete_folder",
                guid = %guid,
                error = %e,
                "Folder unlinked and unindexed but object delete failed"
            );
        }

        info!(
            subsystem = "vault",
            component = "service",
            op = "delete_folder",
            guid = %guid,
            parent_guid = %entry.parent_guid,
            "Folder deleted"
        );
        Ok(())
    }

    /// Rename a file or folder. Only the index changes.
    pub async fn rename(&self, guid: &Guid, new_name: &str) -> Result<()> {
        let ctx = self.context().await?;
        validate_name(new_name)?;
        if !ctx.index.contains(guid) {
            return Err(Error::NotFound(format!("entry {}", guid)));
        }

        let target = guid.clone();
        let name = new_name.to_string();
        self.commit_index(move |index| {
            if index.rename(&target, &name) {
                Ok(())
            } else {
                Err(Error::NotFound(format!("entry {}", target)))
            }
        })
        .await?;

        debug!(
            subsystem = "vault",
            component = "service",
            op = "rename",
            guid = %guid,
            "Entry renamed"
        );
        Ok(())
    }

    async fn unlink_and_unindex(
        &self,
        op: &'static str,
        ctx: &Context,
        guid: &Guid,
        parent: &Guid,
    ) -> Result<()> {
        let unlinked = guid.clone();
        self.commit_folder(&ctx.namespace, parent, move |f| {
            f.unlink(&unlinked);
            Ok(())
        })
        .await?;

        let removed = guid.clone();
        self.commit_index(move |index| {
            index.remove(&removed);
            Ok(())
        })
        .await
        .map_err(|e| diverged(op, guid, "unlink_folder", e))?;
        Ok(())
    }

    // =========================================================================
    // COMMIT HELPERS
    // =========================================================================

    /// Read a folder, apply `mutate`, write it back.
    ///
    /// Under `Optimistic` the write is conditional on the revision read and
    /// a stale write re-reads and re-applies up to `max_write_retries`
    /// times. Under `LastWriterWins` the write is unconditional.
    async fn commit_folder<F>(&self, namespace: &str, guid: &Guid, mutate: F) -> Result<Revision>
    where
        F: Fn(&mut VaultFolder) -> Result<()> + Send + Sync,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let current = self
                .store
                .get_folder(namespace, guid)
                .await?
                .ok_or_else(|| Error::NotFound(format!("folder {}", guid)))?;

            let mut folder = current.value;
            mutate(&mut folder)?;

            let condition = match self.mode {
                ConcurrencyMode::Optimistic => WriteCondition::IfRevision(current.revision),
                ConcurrencyMode::LastWriterWins => WriteCondition::Unconditional,
            };

            match self.store.store_folder(namespace, &folder, condition).await {
                Ok(revision) => return Ok(revision),
                Err(e) if e.is_stale_write() && attempt <= self.max_write_retries => {
                    warn!(
                        subsystem = "vault",
                        component = "service",
                        op = "store_folder",
                        guid = %guid,
                        revision = current.revision.0,
                        attempt,
                        "Stale folder write, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Apply `mutate` to the index, encrypt it and write it back, then
    /// update the cached copy.
    async fn commit_index<F>(&self, mutate: F) -> Result<Revision>
    where
        F: Fn(&mut VaultIndex) -> Result<()> + Send + Sync,
    {
        let ctx = self.context().await?;
        let mut base = ctx.index;
        let mut base_revision = ctx.index_revision;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let mut index = base.clone();
            mutate(&mut index)?;
            let blob = self.seal_index(&ctx.public_key, &index)?;

            let condition = match self.mode {
                ConcurrencyMode::Optimistic => WriteCondition::from_read(base_revision),
                ConcurrencyMode::LastWriterWins => WriteCondition::Unconditional,
            };

            match self.store.store_index(&ctx.namespace, &blob, condition).await {
                Ok(revision) => {
                    self.cache_index(&ctx.namespace, index, revision).await;
                    debug!(
                        subsystem = "vault",
                        component = "service",
                        op = "store_index",
                        revision = revision.0,
                        size_bytes = blob.len(),
                        "Index committed"
                    );
                    return Ok(revision);
                }
                Err(e) if e.is_stale_write() && attempt <= self.max_write_retries => {
                    warn!(
                        subsystem = "vault",
                        component = "service",
                        op = "store_index",
                        revision = base_revision.map(|r| r.0),
                        attempt,
                        "Stale index write, re-reading and retrying"
                    );
                    let (remote, revision) =
                        self.fetch_index(&ctx.namespace, &ctx.private_key).await?;
                    base = remote;
                    base_revision = revision;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn cache_index(&self, namespace: &str, index: VaultIndex, revision: Revision) {
        let mut session = self.session.write().await;
        if let Some(vault) = session.vault.as_mut() {
            let newer = vault.index_revision.map_or(true, |r| revision > r);
            if vault.namespace == namespace && newer {
                vault.index = index;
                vault.index_revision = Some(revision);
            }
        }
    }

    fn seal_index(&self, public_key: &PublicKeyHandle, index: &VaultIndex) -> Result<String> {
        Ok(self.cipher.seal_blob(public_key, &index.to_json()?)?)
    }

    async fn fetch_index(
        &self,
        namespace: &str,
        private_key: &PrivateKeyHandle,
    ) -> Result<(VaultIndex, Option<Revision>)> {
        match self.store.get_index(namespace).await? {
            Some(versioned) => {
                let json = self.cipher.open_blob(private_key, &versioned.value)?;
                Ok((VaultIndex::from_json(&json)?, Some(versioned.revision)))
            }
            None => {
                warn!(
                    subsystem = "vault",
                    component = "service",
                    op = "fetch_index",
                    namespace,
                    "Vault has no index; starting from an empty one"
                );
                Ok((VaultIndex::new(), None))
            }
        }
    }

    /// Fresh GUID not already used by the index or the root.
    fn new_guid(&self, ctx: &Context) -> Result<Guid> {
        for _ in 0..defaults::GUID_MAX_ATTEMPTS {
            let guid = Guid::generate(self.provider.as_ref())?;
            if guid != ctx.root && !ctx.index.contains(&guid) {
                return Ok(guid);
            }
            debug!(
                subsystem = "vault",
                component = "service",
                op = "new_guid",
                guid = %guid,
                "GUID collision, drawing again"
            );
        }
        Err(Error::InvalidState(format!(
            "no unused GUID after {} attempts",
            defaults::GUID_MAX_ATTEMPTS
        )))
    }
}

impl std::fmt::Debug for VaultService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultService")
            .field("provider", &self.provider.name())
            .field("mode", &self.mode)
            .field("max_write_retries", &self.max_write_retries)
            .finish_non_exhaustive()
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("name must not be empty".into()));
    }
    if name.contains('/') || name.contains('\0') {
        return Err(Error::InvalidInput(
            "name must not contain '/' or NUL".into(),
        ));
    }
    Ok(())
}

fn resolve_parent(ctx: &Context, folder: Option<&Guid>) -> Result<Guid> {
    match folder {
        None => Ok(ctx.root.clone()),
        Some(guid) if *guid == ctx.root => Ok(guid.clone()),
        Some(guid) => match ctx.index.get(guid) {
            Some(entry) if entry.kind == EntryKind::Folder => Ok(guid.clone()),
            Some(_) => Err(Error::InvalidInput(format!("{} is a file", guid))),
            None => Err(Error::NotFound(format!("folder {}", guid))),
        },
    }
}

/// Wrap `source` as a partial write and report the divergence.
fn diverged(op: &'static str, guid: &Guid, completed: &'static str, source: Error) -> Error {
    error!(
        subsystem = "vault",
        component = "service",
        op,
        guid = %guid,
        step = completed,
        divergence = true,
        error = %source,
        error_kind = %source.kind(),
        "Vault mutation failed after a remote write; folder graph and index may disagree"
    );
    Error::PartialWrite {
        guid: guid.to_string(),
        completed,
        source: Box::new(source),
    }
}
