//! Identity and contact records.
//!
//! [`KeyPairRecord`] and [`ContactRecord`] hold live key handles and are
//! what the rest of the system works with. [`StoredKeyPair`] and
//! [`StoredContact`] are their persistable forms: public material as PEM,
//! private material only as sealed blobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::keys::handles::{
    EncryptionAlgorithm, PrivateKeyHandle, PublicKeyHandle, SigningKeyHandle, VerifyingKeyHandle,
};

/// Companion ECDSA P-256 signing pair of an identity.
#[derive(Debug, Clone)]
pub struct SigningKeyPair {
    pub public_key: VerifyingKeyHandle,
    pub private_key: SigningKeyHandle,
    pub fingerprint: String,
    pub public_pem: String,
}

/// An identity-owned key pair.
#[derive(Debug, Clone)]
pub struct KeyPairRecord {
    /// Store-assigned id, `None` until persisted.
    pub id: Option<i64>,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub algorithm: EncryptionAlgorithm,
    /// Key size in bits.
    pub key_size: u32,
    pub public_key: PublicKeyHandle,
    pub private_key: PrivateKeyHandle,
    /// `sha256:<16 hex>` of the SPKI encoding.
    pub fingerprint: String,
    pub public_pem: String,
    /// Present for RSA-OAEP identities; ECDH identities carry none.
    pub signing: Option<SigningKeyPair>,
}

impl KeyPairRecord {
    /// Fingerprint of the signing key, if any.
    pub fn signing_fingerprint(&self) -> Option<&str> {
        self.signing.as_ref().map(|s| s.fingerprint.as_str())
    }
}

/// Public half of a contact's signing key.
#[derive(Debug, Clone)]
pub struct ContactSigningKey {
    pub public_key: VerifyingKeyHandle,
    pub fingerprint: String,
    pub public_pem: String,
}

/// An imported contact: public material only.
#[derive(Debug, Clone)]
pub struct ContactRecord {
    pub id: Option<i64>,
    pub label: String,
    pub algorithm: EncryptionAlgorithm,
    pub key_size: u32,
    pub public_key: PublicKeyHandle,
    pub fingerprint: String,
    pub public_pem: String,
    pub signing: Option<ContactSigningKey>,
    pub imported_at: DateTime<Utc>,
    /// Where the bundle came from (e.g. "file", "paste", "qr").
    pub source: String,
}

impl ContactRecord {
    /// Fingerprint of the contact's signing key, if any.
    pub fn signing_fingerprint(&self) -> Option<&str> {
        self.signing.as_ref().map(|s| s.fingerprint.as_str())
    }
}

/// Persistable form of a [`KeyPairRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredKeyPair {
    pub id: Option<i64>,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub algorithm: EncryptionAlgorithm,
    pub key_size: u32,
    pub fingerprint: String,
    pub public_pem: String,
    pub sealed_private_key: Vec<u8>,
    pub signing_fingerprint: Option<String>,
    pub signing_public_pem: Option<String>,
    pub sealed_signing_key: Option<Vec<u8>>,
}

/// Persistable form of a [`ContactRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredContact {
    pub id: Option<i64>,
    pub label: String,
    pub algorithm: EncryptionAlgorithm,
    pub key_size: u32,
    pub fingerprint: String,
    pub public_pem: String,
    pub signing_fingerprint: Option<String>,
    pub signing_public_pem: Option<String>,
    pub imported_at: DateTime<Utc>,
    pub source: String,
}
