//! Hybrid encryption: AES-256-GCM payload, RSA-OAEP wrapped key.
//!
//! A fresh symmetric key and IV are drawn per payload. The symmetric key
//! exists in memory only long enough to encrypt and to be wrapped for the
//! recipient, and is zeroized on drop.
//!
//! # Vault blob packing
//!
//! ```text
//! +--------------------------+
//! | Wrapped Key Length       | 4 bytes (big-endian)
//! +--------------------------+
//! | Wrapped Key              | 512 bytes for RSA-4096
//! +--------------------------+
//! | IV                       | 12 bytes
//! +--------------------------+
//! | Ciphertext               | plaintext + 16-byte tag
//! +--------------------------+
//! ```
//!
//! The packed bytes are base64-encoded once for storage.

use std::sync::Arc;

use tracing::trace;

use crate::cipher::{IV_LEN, TAG_LEN};
use crate::error::{CryptoError, CryptoResult};
use crate::format::{base64_decode, base64_encode};
use crate::keys::handles::{EncryptionAlgorithm, PrivateKeyHandle, PublicKeyHandle};
use crate::provider::CryptoProvider;

/// Output of [`HybridCipher::encrypt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HybridCiphertext {
    /// Symmetric key wrapped for the recipient.
    pub wrapped_key: Vec<u8>,
    pub iv: [u8; IV_LEN],
    /// AES-GCM ciphertext with appended tag.
    pub ciphertext: Vec<u8>,
}

impl HybridCiphertext {
    /// Pack into the binary vault blob layout.
    pub fn pack(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(4 + self.wrapped_key.len() + IV_LEN + self.ciphertext.len());
        out.extend_from_slice(&(self.wrapped_key.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.wrapped_key);
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse the binary vault blob layout.
    pub fn unpack(packed: &[u8]) -> CryptoResult<Self> {
        if packed.len() < 4 {
            return Err(CryptoError::MalformedEnvelope("Blob too short".into()));
        }
        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&packed[..4]);
        let wrapped_len = u32::from_be_bytes(len_bytes) as usize;

        let iv_start = 4usize
            .checked_add(wrapped_len)
            .ok_or_else(|| CryptoError::MalformedEnvelope("Wrapped key length overflow".into()))?;
        let ct_start = iv_start + IV_LEN;
        if wrapped_len == 0 || packed.len() < ct_start + TAG_LEN {
            return Err(CryptoError::MalformedEnvelope(format!(
                "Blob of {} bytes cannot hold a {} byte wrapped key",
                packed.len(),
                wrapped_len
            )));
        }

        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(&packed[iv_start..ct_start]);

        Ok(Self {
            wrapped_key: packed[4..iv_start].to_vec(),
            iv,
            ciphertext: packed[ct_start..].to_vec(),
        })
    }

    /// Pack and base64-encode for the remote store.
    pub fn to_blob(&self) -> String {
        base64_encode(&self.pack())
    }

    /// Decode a base64 vault blob.
    pub fn from_blob(blob: &str) -> CryptoResult<Self> {
        Self::unpack(&base64_decode(blob.trim())?)
    }
}

/// The hybrid encryption primitive shared by messaging and the vault.
#[derive(Clone)]
pub struct HybridCipher {
    provider: Arc<dyn CryptoProvider>,
}

impl HybridCipher {
    pub fn new(provider: Arc<dyn CryptoProvider>) -> Self {
        Self { provider }
    }

    /// Encrypt `plaintext` for the holder of `recipient`.
    ///
    /// Only RSA-OAEP keys can be wrapped to; ECDH keys fail with
    /// [`CryptoError::UnsupportedAlgorithm`].
    pub fn encrypt(
        &self,
        recipient: &PublicKeyHandle,
        plaintext: &[u8],
    ) -> CryptoResult<HybridCiphertext> {
        ensure_wrappable(recipient.algorithm())?;

        let key = self.provider.generate_symmetric_key()?;
        let iv = self.provider.generate_iv()?;
        let ciphertext = self.provider.aead_encrypt(&key, &iv, plaintext)?;
        let wrapped_key = self.provider.wrap_key(recipient, &key)?;

        trace!(
            wrapped_len = wrapped_key.len(),
            ciphertext_len = ciphertext.len(),
            "Hybrid encrypt"
        );

        Ok(HybridCiphertext {
            wrapped_key,
            iv,
            ciphertext,
        })
    }

    /// Decrypt a hybrid ciphertext.
    ///
    /// Wrong key and tampered data both fail with
    /// [`CryptoError::Decryption`]; the two are indistinguishable.
    pub fn decrypt(
        &self,
        private_key: &PrivateKeyHandle,
        ciphertext: &HybridCiphertext,
    ) -> CryptoResult<Vec<u8>> {
        ensure_wrappable(private_key.algorithm())?;

        let key = self
            .provider
            .unwrap_key(private_key, &ciphertext.wrapped_key)?;
        self.provider
            .aead_decrypt(&key, &ciphertext.iv, &ciphertext.ciphertext)
    }

    /// Encrypt and produce a base64 vault blob.
    pub fn seal_blob(&self, recipient: &PublicKeyHandle, plaintext: &[u8]) -> CryptoResult<String> {
        Ok(self.encrypt(recipient, plaintext)?.to_blob())
    }

    /// Decode and decrypt a base64 vault blob.
    pub fn open_blob(&self, private_key: &PrivateKeyHandle, blob: &str) -> CryptoResult<Vec<u8>> {
        self.decrypt(private_key, &HybridCiphertext::from_blob(blob)?)
    }
}

impl std::fmt::Debug for HybridCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridCipher")
            .field("provider", &self.provider.name())
            .finish()
    }
}

fn ensure_wrappable(algorithm: EncryptionAlgorithm) -> CryptoResult<()> {
    match algorithm {
        EncryptionAlgorithm::RsaOaep => Ok(()),
        EncryptionAlgorithm::Ecdh => Err(CryptoError::UnsupportedAlgorithm(
            "Hybrid encryption requires an RSA-OAEP key pair".into(),
        )),
    }
}
