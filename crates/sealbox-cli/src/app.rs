//! Wiring between configuration, the key store and the vault.
//!
//! Every command returns JSON (or raw bytes for decrypted payloads) so
//! `main` only decides where output goes.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Value};
use tracing::debug;

use sealbox_core::SealboxConfig;
use sealbox_crypto::{
    ContactRecord, CryptoProvider, EncryptionAlgorithm, KeyManager, KeyPairRecord, MessageCodec,
    SignatureStatus, SignerSet, SoftwareProvider,
};
use sealbox_db::{Database, EntryKind, Guid, KeyRing};
use sealbox_vault::{FilesystemRemoteStore, VaultService};

/// Open handles for one CLI invocation.
pub struct App {
    config: SealboxConfig,
    provider: Arc<dyn CryptoProvider>,
    keyring: KeyRing,
}

impl App {
    /// Create the data directory if needed, connect the key store and
    /// load the sealing key.
    pub async fn open(config: SealboxConfig) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("creating data directory {}", config.data_dir.display())
        })?;

        let db = Database::connect(&config.database_url)
            .await
            .context("opening key store")?;
        let sealing_key = config.load_sealing_key().context("loading sealing key")?;

        let provider = SoftwareProvider::shared();
        let keys = KeyManager::new(provider.clone()).with_rsa_modulus_bits(config.rsa_modulus_bits);
        let keyring = KeyRing::new(keys, Arc::new(db), sealing_key);

        debug!(subsystem = "cli", component = "app", config = ?config, "Opened");
        Ok(Self {
            config,
            provider,
            keyring,
        })
    }

    // =========================================================================
    // KEYS
    // =========================================================================

    pub async fn keygen(&self, label: &str, algorithm: EncryptionAlgorithm) -> Result<Value> {
        let record = self.keyring.generate_identity(label, algorithm).await?;
        Ok(identity_json(&record))
    }

    pub async fn keys(&self) -> Result<Value> {
        let identities = self.keyring.identities().await?;
        Ok(Value::Array(identities.iter().map(identity_json).collect()))
    }

    /// Public key bundle of an identity, ready to hand to a contact.
    pub async fn export(&self, identity: Option<i64>, legacy: bool) -> Result<String> {
        let record = self.identity(identity).await?;
        let bundle = self.keyring.key_manager().export_bundle(&record);
        let json = if legacy {
            bundle.to_legacy_json()?
        } else {
            bundle.to_json()?
        };
        Ok(json)
    }

    pub async fn import(&self, bundle_json: &str, label: &str, source: &str) -> Result<Value> {
        let contact = self.keyring.import_contact(bundle_json, label, source).await?;
        Ok(contact_json(&contact))
    }

    pub async fn contacts(&self) -> Result<Value> {
        let contacts = self.keyring.contacts().await?;
        Ok(Value::Array(contacts.iter().map(contact_json).collect()))
    }

    pub async fn remove_identity(&self, id: i64) -> Result<Value> {
        if !self.keyring.delete_identity(id).await? {
            bail!("No identity with id {}", id);
        }
        Ok(json!({ "deleted": id }))
    }

    pub async fn remove_contact(&self, id: i64) -> Result<Value> {
        if !self.keyring.delete_contact(id).await? {
            bail!("No contact with id {}", id);
        }
        Ok(json!({ "deleted": id }))
    }

    // =========================================================================
    // MESSAGES
    // =========================================================================

    /// Encrypt `plaintext` for a contact, signed by `identity` unless
    /// `unsigned`.
    pub async fn encrypt(
        &self,
        identity: Option<i64>,
        contact_id: i64,
        plaintext: &[u8],
        unsigned: bool,
    ) -> Result<String> {
        let contact = self
            .keyring
            .contact(contact_id)
            .await?
            .ok_or_else(|| anyhow!("No contact with id {}", contact_id))?;

        let sender = if unsigned {
            None
        } else {
            Some(self.identity(identity).await?)
        };
        let signer = match &sender {
            Some(identity) => Some(identity.signing.as_ref().ok_or_else(|| {
                anyhow!(
                    "Identity {} has no signing key; pass --unsigned",
                    identity.fingerprint
                )
            })?),
            None => None,
        };

        let transport = self.codec().encode(&contact.public_key, plaintext, signer)?;
        Ok(transport)
    }

    /// Decrypt a transport string with an identity and check its signature
    /// against all contacts and the identity itself.
    pub async fn decrypt(&self, identity: Option<i64>, transport: &str) -> Result<(Vec<u8>, Value)> {
        let record = self.identity(identity).await?;
        let contacts = self.keyring.contacts().await?;
        let signers = SignerSet::new().with(&contacts).with(&record);

        let message = self
            .codec()
            .decode(transport.trim(), &record.private_key, &signers)?;
        let report = json!({
            "version": message.version,
            "bytes": message.plaintext.len(),
            "signature": signature_json(&message.signature),
        });
        Ok((message.plaintext, report))
    }

    // =========================================================================
    // VAULT
    // =========================================================================

    pub async fn vault_init(&self, identity: Option<i64>) -> Result<Value> {
        let vault = self.vault_session(identity).await?;
        let root = vault.create().await?;
        Ok(json!({
            "namespace": vault.namespace().await?,
            "root": root,
            "concurrency": vault.concurrency().as_str(),
        }))
    }

    pub async fn vault_ls(&self, identity: Option<i64>, folder: Option<&str>) -> Result<Value> {
        let vault = self.open_vault(identity).await?;
        let folder = folder.map(parse_guid).transpose()?;
        let listing = vault.list_folder(folder.as_ref()).await?;
        Ok(serde_json::to_value(listing)?)
    }

    pub async fn vault_put(
        &self,
        identity: Option<i64>,
        file: &Path,
        folder: Option<&str>,
        name: Option<&str>,
        mime: Option<&str>,
    ) -> Result<Value> {
        let vault = self.open_vault(identity).await?;
        let folder = folder.map(parse_guid).transpose()?;
        let name = match name {
            Some(name) => name.to_string(),
            None => file
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
                .ok_or_else(|| anyhow!("Cannot derive a name from {}; pass --name", file.display()))?,
        };
        let contents = tokio::fs::read(file)
            .await
            .with_context(|| format!("reading {}", file.display()))?;

        let guid = vault.upload_file(folder.as_ref(), &name, &contents, mime).await?;
        Ok(json!({ "guid": guid, "name": name, "size": contents.len() }))
    }

    pub async fn vault_get(&self, identity: Option<i64>, guid: &str) -> Result<Vec<u8>> {
        let vault = self.open_vault(identity).await?;
        Ok(vault.download_file(&parse_guid(guid)?).await?)
    }

    pub async fn vault_mkdir(
        &self,
        identity: Option<i64>,
        name: &str,
        parent: Option<&str>,
    ) -> Result<Value> {
        let vault = self.open_vault(identity).await?;
        let parent = parent.map(parse_guid).transpose()?;
        let guid = vault.create_folder(parent.as_ref(), name).await?;
        Ok(json!({ "guid": guid, "name": name }))
    }

    /// Delete a file or an empty folder.
    pub async fn vault_rm(&self, identity: Option<i64>, guid: &str) -> Result<Value> {
        let vault = self.open_vault(identity).await?;
        let guid = parse_guid(guid)?;
        let entry = vault.stat(&guid).await?;
        match entry.kind {
            EntryKind::File => vault.delete_file(&guid).await?,
            EntryKind::Folder => vault.delete_folder(&guid).await?,
        }
        Ok(json!({ "deleted": guid, "kind": entry.kind.to_string() }))
    }

    pub async fn vault_mv(&self, identity: Option<i64>, guid: &str, name: &str) -> Result<Value> {
        let vault = self.open_vault(identity).await?;
        let guid = parse_guid(guid)?;
        vault.rename(&guid, name).await?;
        Ok(json!({ "guid": guid, "name": name }))
    }

    pub async fn vault_audit(&self, identity: Option<i64>) -> Result<Value> {
        let vault = self.open_vault(identity).await?;
        let report = vault.audit().await?;
        let consistent = report.is_consistent();
        let mut value = serde_json::to_value(report)?;
        value["consistent"] = Value::Bool(consistent);
        Ok(value)
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    /// The identity with `id`, or the oldest one.
    async fn identity(&self, id: Option<i64>) -> Result<KeyPairRecord> {
        match id {
            Some(id) => self
                .keyring
                .identity(id)
                .await?
                .ok_or_else(|| anyhow!("No identity with id {}", id)),
            None => self
                .keyring
                .primary_identity()
                .await?
                .ok_or_else(|| anyhow!("No identity; run `sealbox keygen` first")),
        }
    }

    fn codec(&self) -> MessageCodec {
        MessageCodec::new(self.provider.clone())
    }

    /// A vault service acting as `identity`, still locked.
    async fn vault_session(&self, identity: Option<i64>) -> Result<VaultService> {
        let record = self.identity(identity).await?;
        let store = FilesystemRemoteStore::with_provider(&self.config.remote_dir, self.provider.clone());
        let vault = VaultService::new(self.provider.clone(), Arc::new(store))
            .with_concurrency(self.config.concurrency)
            .with_max_write_retries(self.config.max_write_retries);
        vault.set_identity(record).await;
        Ok(vault)
    }

    async fn open_vault(&self, identity: Option<i64>) -> Result<VaultService> {
        let vault = self.vault_session(identity).await?;
        vault
            .open()
            .await
            .context("opening vault (run `sealbox vault init` first)")?;
        Ok(vault)
    }
}

fn parse_guid(s: &str) -> Result<Guid> {
    s.parse::<Guid>().with_context(|| format!("invalid GUID {:?}", s))
}

fn identity_json(record: &KeyPairRecord) -> Value {
    json!({
        "id": record.id,
        "label": record.label,
        "algorithm": record.algorithm.as_str(),
        "key_size": record.key_size,
        "fingerprint": record.fingerprint,
        "signing_fingerprint": record.signing_fingerprint(),
        "created_at": record.created_at,
    })
}

fn contact_json(contact: &ContactRecord) -> Value {
    json!({
        "id": contact.id,
        "label": contact.label,
        "algorithm": contact.algorithm.as_str(),
        "key_size": contact.key_size,
        "fingerprint": contact.fingerprint,
        "signing_fingerprint": contact.signing_fingerprint(),
        "source": contact.source,
        "imported_at": contact.imported_at,
    })
}

fn signature_json(status: &SignatureStatus) -> Value {
    match status {
        SignatureStatus::Verified {
            fingerprint,
            signer,
        } => json!({ "status": "verified", "fingerprint": fingerprint, "signer": signer }),
        SignatureStatus::Invalid {
            fingerprint,
            signer,
        } => json!({ "status": "invalid", "fingerprint": fingerprint, "signer": signer }),
        SignatureStatus::UnknownSigner { fingerprint } => {
            json!({ "status": "unknown-signer", "fingerprint": fingerprint })
        }
        SignatureStatus::Unsigned => json!({ "status": "unsigned" }),
    }
}
