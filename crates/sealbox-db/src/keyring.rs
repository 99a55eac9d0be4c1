//! Identity and contact management over a [`KeyStore`].
//!
//! [`KeyRing`] is the only path by which identities reach storage: it
//! seals private keys with the configured [`SealingKey`] on the way in and
//! opens them on the way out.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use sealbox_core::{Error, KeyStore, Result};
use sealbox_crypto::{
    ContactRecord, CryptoError, EncryptionAlgorithm, KeyManager, KeyPairRecord, SealingKey,
};

/// Local identities and contacts, sealed at rest.
pub struct KeyRing {
    keys: KeyManager,
    store: Arc<dyn KeyStore>,
    sealing_key: SealingKey,
}

impl KeyRing {
    pub fn new(keys: KeyManager, store: Arc<dyn KeyStore>, sealing_key: SealingKey) -> Self {
        Self {
            keys,
            store,
            sealing_key,
        }
    }

    pub fn key_manager(&self) -> &KeyManager {
        &self.keys
    }

    /// Generate a new identity and persist it sealed.
    ///
    /// Generation runs on the blocking pool; RSA-4096 takes seconds.
    pub async fn generate_identity(
        &self,
        label: &str,
        algorithm: EncryptionAlgorithm,
    ) -> Result<KeyPairRecord> {
        let start = Instant::now();
        let keys = self.keys.clone();
        let owned_label = label.to_string();
        let mut record = tokio::task::spawn_blocking(move || keys.generate(&owned_label, algorithm))
            .await
            .map_err(|e| CryptoError::KeyGeneration(format!("generation task failed: {}", e)))??;

        let stored = self.keys.seal(&record, &self.sealing_key)?;
        let id = self.store.insert_key(&stored).await?;
        record.id = Some(id);

        info!(
            subsystem = "keys",
            component = "keyring",
            op = "generate_identity",
            id,
            algorithm = %algorithm,
            fingerprint = %record.fingerprint,
            duration_ms = start.elapsed().as_millis() as u64,
            "Identity generated"
        );
        Ok(record)
    }

    /// All identities, oldest first, with private keys opened.
    pub async fn identities(&self) -> Result<Vec<KeyPairRecord>> {
        let stored = self.store.list_keys().await?;
        stored
            .iter()
            .map(|s| self.keys.open(s, &self.sealing_key).map_err(Error::from))
            .collect()
    }

    pub async fn identity(&self, id: i64) -> Result<Option<KeyPairRecord>> {
        match self.store.get_key(id).await? {
            Some(stored) => Ok(Some(self.keys.open(&stored, &self.sealing_key)?)),
            None => Ok(None),
        }
    }

    /// The identity the vault and messaging act as: the oldest one.
    pub async fn primary_identity(&self) -> Result<Option<KeyPairRecord>> {
        match self.store.list_keys().await?.first() {
            Some(stored) => Ok(Some(self.keys.open(stored, &self.sealing_key)?)),
            None => Ok(None),
        }
    }

    /// Irreversibly delete an identity.
    ///
    /// Anything encrypted to it, including a vault in its namespace,
    /// becomes unrecoverable.
    pub async fn delete_identity(&self, id: i64) -> Result<bool> {
        let removed = self.store.delete_key(id).await?;
        if removed {
            info!(
                subsystem = "keys",
                component = "keyring",
                op = "delete_identity",
                id,
                "Identity deleted"
            );
        }
        Ok(removed)
    }

    /// Import a contact from a public key bundle.
    ///
    /// A bundle whose encryption key is already a contact is rejected with
    /// `InvalidInput`.
    pub async fn import_contact(
        &self,
        bundle_json: &str,
        label: &str,
        source: &str,
    ) -> Result<ContactRecord> {
        let mut contact = self.keys.import_bundle(bundle_json, label, source)?;

        let existing = self.store.list_contacts().await?;
        if let Some(dup) = existing.iter().find(|c| c.fingerprint == contact.fingerprint) {
            return Err(Error::InvalidInput(format!(
                "Contact with fingerprint {} already exists (id {})",
                contact.fingerprint,
                dup.id.unwrap_or_default()
            )));
        }

        let id = self.store.insert_contact(&self.keys.store_contact(&contact)).await?;
        contact.id = Some(id);

        info!(
            subsystem = "keys",
            component = "keyring",
            op = "import_contact",
            id,
            algorithm = %contact.algorithm,
            fingerprint = %contact.fingerprint,
            signed = contact.signing.is_some(),
            "Contact imported"
        );
        Ok(contact)
    }

    /// All contacts, oldest first.
    pub async fn contacts(&self) -> Result<Vec<ContactRecord>> {
        let stored = self.store.list_contacts().await?;
        stored
            .iter()
            .map(|s| self.keys.load_contact(s).map_err(Error::from))
            .collect()
    }

    pub async fn contact(&self, id: i64) -> Result<Option<ContactRecord>> {
        match self.store.get_contact(id).await? {
            Some(stored) => Ok(Some(self.keys.load_contact(&stored)?)),
            None => Ok(None),
        }
    }

    pub async fn delete_contact(&self, id: i64) -> Result<bool> {
        let removed = self.store.delete_contact(id).await?;
        debug!(
            subsystem = "keys",
            component = "keyring",
            op = "delete_contact",
            id,
            removed,
            "Contact delete"
        );
        Ok(removed)
    }

    /// Contact owning the signing key with `fingerprint`.
    pub async fn contact_by_signing_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<ContactRecord>> {
        match self.store.find_contact_by_signing_fingerprint(fingerprint).await? {
            Some(stored) => Ok(Some(self.keys.load_contact(&stored)?)),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRing")
            .field("keys", &self.keys)
            .field("sealing_key", &"[REDACTED]")
            .finish()
    }
}
