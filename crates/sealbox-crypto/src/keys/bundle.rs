//! Public key bundle: the only artifact exported to another identity.
//!
//! ```json
//! {"v":2,"alg":"RSA-OAEP","encrypt":"-----BEGIN PUBLIC KEY-----...","sign":"..."}
//! ```
//!
//! Version 1 bundles carry no `alg` tag; importers fall back to trying
//! RSA-OAEP and then ECDH on the encryption key.

use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, CryptoResult};
use crate::keys::handles::EncryptionAlgorithm;

/// Untagged bundle version.
pub const BUNDLE_VERSION_LEGACY: u8 = 1;

/// Tagged bundle version.
pub const BUNDLE_VERSION: u8 = 2;

/// Exported public key material of an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyBundle {
    pub v: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<EncryptionAlgorithm>,
    /// Encryption public key, PEM.
    pub encrypt: String,
    /// Signing public key, PEM.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign: Option<String>,
}

impl PublicKeyBundle {
    /// Build a tagged bundle.
    pub fn new(algorithm: EncryptionAlgorithm, encrypt: String, sign: Option<String>) -> Self {
        Self {
            v: BUNDLE_VERSION,
            alg: Some(algorithm),
            encrypt,
            sign,
        }
    }

    /// Serialize as a tagged (v2) bundle.
    pub fn to_json(&self) -> CryptoResult<String> {
        let tagged = Self {
            v: BUNDLE_VERSION,
            ..self.clone()
        };
        Ok(serde_json::to_string(&tagged)?)
    }

    /// Serialize in the untagged v1 form for peers that predate `alg`.
    pub fn to_legacy_json(&self) -> CryptoResult<String> {
        let legacy = Self {
            v: BUNDLE_VERSION_LEGACY,
            alg: None,
            encrypt: self.encrypt.clone(),
            sign: self.sign.clone(),
        };
        Ok(serde_json::to_string(&legacy)?)
    }

    /// Parse a bundle of either version.
    pub fn from_json(json: &str) -> CryptoResult<Self> {
        let bundle: Self = serde_json::from_str(json.trim())
            .map_err(|e| CryptoError::MalformedKey(format!("Invalid key bundle: {}", e)))?;

        match bundle.v {
            BUNDLE_VERSION_LEGACY => Ok(bundle),
            BUNDLE_VERSION if bundle.alg.is_some() => Ok(bundle),
            BUNDLE_VERSION => Err(CryptoError::MalformedKey(
                "Version 2 bundle without alg tag".into(),
            )),
            other => Err(CryptoError::MalformedKey(format!(
                "Unsupported bundle version {}",
                other
            ))),
        }
    }

    /// Whether the encryption algorithm must be guessed on import.
    pub fn is_legacy(&self) -> bool {
        self.alg.is_none()
    }
}
