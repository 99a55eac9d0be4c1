//! Opaque key handles.
//!
//! Handles are capabilities: they can be passed to a [`CryptoProvider`]
//! but expose no method that yields raw private key bytes. Private
//! material is zeroized when the last handle is dropped.
//!
//! [`CryptoProvider`]: crate::provider::CryptoProvider

use std::fmt;
use std::str::FromStr;

use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// Key size reported for P-256 keys.
pub const P256_KEY_SIZE: u32 = 256;

/// Asymmetric encryption mode of an identity key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncryptionAlgorithm {
    /// RSA-OAEP with SHA-256; usages encrypt/decrypt.
    #[serde(rename = "RSA-OAEP")]
    RsaOaep,
    /// ECDH on P-256; usages deriveKey/deriveBits.
    #[serde(rename = "ECDH")]
    Ecdh,
}

impl EncryptionAlgorithm {
    /// Wire name of the algorithm.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RsaOaep => "RSA-OAEP",
            Self::Ecdh => "ECDH",
        }
    }
}

impl fmt::Display for EncryptionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncryptionAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RSA-OAEP" | "RSA_OAEP" | "RSAOAEP" => Ok(Self::RsaOaep),
            "ECDH" => Ok(Self::Ecdh),
            _ => Err(CryptoError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub(crate) enum PublicKeyInner {
    RsaOaep(RsaPublicKey),
    Ecdh(p256::PublicKey),
}

/// Public half of an encryption key pair.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKeyHandle(pub(crate) PublicKeyInner);

impl PublicKeyHandle {
    /// Algorithm this key belongs to.
    pub fn algorithm(&self) -> EncryptionAlgorithm {
        match &self.0 {
            PublicKeyInner::RsaOaep(_) => EncryptionAlgorithm::RsaOaep,
            PublicKeyInner::Ecdh(_) => EncryptionAlgorithm::Ecdh,
        }
    }

    /// Key size in bits (RSA modulus length, or 256 for P-256).
    pub fn key_size(&self) -> u32 {
        match &self.0 {
            PublicKeyInner::RsaOaep(key) => (key.size() * 8) as u32,
            PublicKeyInner::Ecdh(_) => P256_KEY_SIZE,
        }
    }
}

impl fmt::Debug for PublicKeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKeyHandle({} {})", self.algorithm(), self.key_size())
    }
}

#[derive(Clone)]
pub(crate) enum PrivateKeyInner {
    RsaOaep(RsaPrivateKey),
    Ecdh(p256::SecretKey),
}

/// Private half of an encryption key pair. Non-extractable.
#[derive(Clone)]
pub struct PrivateKeyHandle(pub(crate) PrivateKeyInner);

impl PrivateKeyHandle {
    /// Algorithm this key belongs to.
    pub fn algorithm(&self) -> EncryptionAlgorithm {
        match &self.0 {
            PrivateKeyInner::RsaOaep(_) => EncryptionAlgorithm::RsaOaep,
            PrivateKeyInner::Ecdh(_) => EncryptionAlgorithm::Ecdh,
        }
    }

    /// Derive the matching public key handle.
    pub fn public_key(&self) -> PublicKeyHandle {
        match &self.0 {
            PrivateKeyInner::RsaOaep(key) => {
                PublicKeyHandle(PublicKeyInner::RsaOaep(RsaPublicKey::from(key)))
            }
            PrivateKeyInner::Ecdh(key) => PublicKeyHandle(PublicKeyInner::Ecdh(key.public_key())),
        }
    }
}

impl fmt::Debug for PrivateKeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKeyHandle")
            .field("algorithm", &self.algorithm())
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// ECDSA P-256 verifying key.
#[derive(Clone, PartialEq, Eq)]
pub struct VerifyingKeyHandle(pub(crate) p256::PublicKey);

impl fmt::Debug for VerifyingKeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VerifyingKeyHandle(ECDSA P-256)")
    }
}

/// ECDSA P-256 signing key. Non-extractable.
#[derive(Clone)]
pub struct SigningKeyHandle(pub(crate) p256::SecretKey);

impl SigningKeyHandle {
    /// Derive the matching verifying key.
    pub fn verifying_key(&self) -> VerifyingKeyHandle {
        VerifyingKeyHandle(self.0.public_key())
    }
}

impl fmt::Debug for SigningKeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyHandle")
            .field("key", &"[REDACTED]")
            .finish()
    }
}
