//! Core traits for sealbox abstractions.
//!
//! These traits define the interfaces that concrete storage backends
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;

use sealbox_crypto::{StoredContact, StoredKeyPair};

use crate::error::Result;
use crate::models::{Guid, Revision, VaultFolder, VaultRoot, Versioned, WriteCondition};

// =============================================================================
// REMOTE STORE
// =============================================================================

/// Untrusted, honest-but-curious blob store addressed by namespace + GUID.
///
/// Implementations only ever see ciphertext strings and GUID-only folder
/// objects. Conditional writes that do not match the stored revision fail
/// with [`Error::StaleWrite`](crate::Error::StaleWrite) and leave the
/// object untouched.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Whether a vault exists under `namespace`.
    async fn exists(&self, namespace: &str) -> Result<bool>;

    /// Create a vault: allocate a root folder GUID tied to the namespace
    /// and owner, and store an empty root folder under it.
    async fn create(&self, namespace: &str, owner_fingerprint: &str) -> Result<VaultRoot>;

    /// Find the root folder of an existing vault.
    async fn lookup(&self, namespace: &str) -> Result<VaultRoot>;

    /// Fetch the encrypted index blob.
    async fn get_index(&self, namespace: &str) -> Result<Option<Versioned<String>>>;

    /// Replace the encrypted index blob.
    async fn store_index(
        &self,
        namespace: &str,
        data: &str,
        condition: WriteCondition,
    ) -> Result<Revision>;

    /// Fetch a folder object.
    async fn get_folder(&self, namespace: &str, guid: &Guid)
        -> Result<Option<Versioned<VaultFolder>>>;

    /// Replace a folder object (keyed by `folder.id`).
    async fn store_folder(
        &self,
        namespace: &str,
        folder: &VaultFolder,
        condition: WriteCondition,
    ) -> Result<Revision>;

    /// Remove a folder object. Missing folders are not an error.
    async fn delete_folder(&self, namespace: &str, guid: &Guid) -> Result<()>;

    /// Fetch an encrypted file blob.
    async fn get_file(&self, namespace: &str, guid: &Guid) -> Result<Option<String>>;

    /// Store an encrypted file blob.
    async fn store_file(&self, namespace: &str, guid: &Guid, data: &str) -> Result<()>;

    /// Remove a file blob. Missing blobs are not an error.
    async fn delete_file(&self, namespace: &str, guid: &Guid) -> Result<()>;
}

// =============================================================================
// KEY STORE
// =============================================================================

/// Local repository of identity key pairs and contacts.
///
/// Private keys are only ever handed to a `KeyStore` sealed.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Persist an identity, returning its id.
    async fn insert_key(&self, key: &StoredKeyPair) -> Result<i64>;

    /// All identities, oldest first.
    async fn list_keys(&self) -> Result<Vec<StoredKeyPair>>;

    async fn get_key(&self, id: i64) -> Result<Option<StoredKeyPair>>;

    /// Irreversibly delete an identity. Returns whether it existed.
    async fn delete_key(&self, id: i64) -> Result<bool>;

    /// Persist a contact, returning its id.
    async fn insert_contact(&self, contact: &StoredContact) -> Result<i64>;

    /// All contacts, oldest first.
    async fn list_contacts(&self) -> Result<Vec<StoredContact>>;

    async fn get_contact(&self, id: i64) -> Result<Option<StoredContact>>;

    /// Delete a contact. Returns whether it existed.
    async fn delete_contact(&self, id: i64) -> Result<bool>;

    /// Contact whose signing key has the given fingerprint.
    async fn find_contact_by_signing_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<StoredContact>>;
}
