//! Cryptographic provider abstraction.
//!
//! Everything above this module talks to a [`CryptoProvider`] and never to
//! a specific backend. [`SoftwareProvider`] implements it with the RustCrypto
//! crates and the operating system's entropy source.

use std::sync::Arc;

use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePublicKey as _, EncodePublicKey as _};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use tracing::debug;
use zeroize::Zeroizing;

use crate::cipher::{aes_gcm_decrypt, aes_gcm_encrypt, SymmetricKey, IV_LEN, KEY_LEN};
use crate::error::{CryptoError, CryptoResult};
use crate::keys::handles::{
    EncryptionAlgorithm, PrivateKeyHandle, PrivateKeyInner, PublicKeyHandle, PublicKeyInner,
    SigningKeyHandle, VerifyingKeyHandle,
};

/// Length of a raw `r || s` ECDSA P-256 signature.
pub const SIGNATURE_LEN: usize = 64;

/// Smallest RSA modulus the provider will generate.
pub const MIN_RSA_MODULUS_BITS: usize = 2048;

/// Backend for every primitive sealbox composes.
///
/// Implementations must never hand out raw private key bytes: private
/// keys enter and leave only as opaque handles.
pub trait CryptoProvider: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Fill `buf` from a cryptographically secure source.
    fn fill_random(&self, buf: &mut [u8]) -> CryptoResult<()>;

    /// Generate an encryption key pair.
    ///
    /// `rsa_modulus_bits` is ignored for ECDH.
    fn generate_key_pair(
        &self,
        algorithm: EncryptionAlgorithm,
        rsa_modulus_bits: usize,
    ) -> CryptoResult<(PublicKeyHandle, PrivateKeyHandle)>;

    /// Generate an ECDSA P-256 signing pair.
    fn generate_signing_pair(&self) -> CryptoResult<(VerifyingKeyHandle, SigningKeyHandle)>;

    /// Draw a fresh AES-256-GCM key.
    fn generate_symmetric_key(&self) -> CryptoResult<SymmetricKey> {
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        self.fill_random(bytes.as_mut())?;
        Ok(SymmetricKey::from_bytes(*bytes))
    }

    /// Draw a fresh 96-bit IV.
    fn generate_iv(&self) -> CryptoResult<[u8; IV_LEN]> {
        let mut iv = [0u8; IV_LEN];
        self.fill_random(&mut iv)?;
        Ok(iv)
    }

    /// AES-256-GCM encrypt, no associated data.
    fn aead_encrypt(
        &self,
        key: &SymmetricKey,
        iv: &[u8; IV_LEN],
        plaintext: &[u8],
    ) -> CryptoResult<Vec<u8>>;

    /// AES-256-GCM decrypt. Any tag mismatch is [`CryptoError::Decryption`].
    fn aead_decrypt(
        &self,
        key: &SymmetricKey,
        iv: &[u8; IV_LEN],
        ciphertext: &[u8],
    ) -> CryptoResult<Vec<u8>>;

    /// Wrap a symmetric key for `recipient` (RSA-OAEP/SHA-256).
    fn wrap_key(&self, recipient: &PublicKeyHandle, key: &SymmetricKey) -> CryptoResult<Vec<u8>>;

    /// Unwrap a symmetric key previously wrapped for `key`.
    fn unwrap_key(&self, key: &PrivateKeyHandle, wrapped: &[u8]) -> CryptoResult<SymmetricKey>;

    /// ECDSA P-256/SHA-256 signature over `data`, as 64-byte `r || s`.
    fn sign(&self, key: &SigningKeyHandle, data: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Verify an `r || s` signature. Malformed signatures verify as false.
    fn verify(&self, key: &VerifyingKeyHandle, data: &[u8], signature: &[u8]) -> bool;

    /// SHA-256 digest.
    fn digest(&self, data: &[u8]) -> [u8; 32];

    /// SPKI DER encoding of an encryption public key.
    fn export_public_spki(&self, key: &PublicKeyHandle) -> CryptoResult<Vec<u8>>;

    /// Parse SPKI DER as a public key of the given algorithm.
    fn import_public_spki(
        &self,
        algorithm: EncryptionAlgorithm,
        der: &[u8],
    ) -> CryptoResult<PublicKeyHandle>;

    /// SPKI DER encoding of a verifying key.
    fn export_verifying_spki(&self, key: &VerifyingKeyHandle) -> CryptoResult<Vec<u8>>;

    /// Parse SPKI DER as an ECDSA P-256 verifying key.
    fn import_verifying_spki(&self, der: &[u8]) -> CryptoResult<VerifyingKeyHandle>;
}

/// Software backend built on `rsa`, `p256` and `aes-gcm`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareProvider;

impl SoftwareProvider {
    pub fn new() -> Self {
        Self
    }

    /// Shared provider instance for constructing services.
    pub fn shared() -> Arc<dyn CryptoProvider> {
        Arc::new(Self)
    }
}

impl CryptoProvider for SoftwareProvider {
    fn name(&self) -> &'static str {
        "software"
    }

    fn fill_random(&self, buf: &mut [u8]) -> CryptoResult<()> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| CryptoError::Unavailable(format!("OS entropy source failed: {}", e)))
    }

    fn generate_key_pair(
        &self,
        algorithm: EncryptionAlgorithm,
        rsa_modulus_bits: usize,
    ) -> CryptoResult<(PublicKeyHandle, PrivateKeyHandle)> {
        let private = match algorithm {
            EncryptionAlgorithm::RsaOaep => {
                if rsa_modulus_bits < MIN_RSA_MODULUS_BITS {
                    return Err(CryptoError::KeyGeneration(format!(
                        "RSA modulus of {} bits is below the {} bit minimum",
                        rsa_modulus_bits, MIN_RSA_MODULUS_BITS
                    )));
                }
                debug!(bits = rsa_modulus_bits, "Generating RSA-OAEP key pair");
                let key = RsaPrivateKey::new(&mut OsRng, rsa_modulus_bits)
                    .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
                PrivateKeyHandle(PrivateKeyInner::RsaOaep(key))
            }
            EncryptionAlgorithm::Ecdh => {
                PrivateKeyHandle(PrivateKeyInner::Ecdh(p256::SecretKey::random(&mut OsRng)))
            }
        };
        Ok((private.public_key(), private))
    }

    fn generate_signing_pair(&self) -> CryptoResult<(VerifyingKeyHandle, SigningKeyHandle)> {
        let signing = SigningKeyHandle(p256::SecretKey::random(&mut OsRng));
        Ok((signing.verifying_key(), signing))
    }

    fn aead_encrypt(
        &self,
        key: &SymmetricKey,
        iv: &[u8; IV_LEN],
        plaintext: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        aes_gcm_encrypt(key.as_bytes(), iv, plaintext)
    }

    fn aead_decrypt(
        &self,
        key: &SymmetricKey,
        iv: &[u8; IV_LEN],
        ciphertext: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        aes_gcm_decrypt(key.as_bytes(), iv, ciphertext)
    }

    fn wrap_key(&self, recipient: &PublicKeyHandle, key: &SymmetricKey) -> CryptoResult<Vec<u8>> {
        match &recipient.0 {
            PublicKeyInner::RsaOaep(public) => public
                .encrypt(&mut OsRng, Oaep::new::<Sha256>(), key.as_bytes())
                .map_err(|e| CryptoError::Encryption(format!("Key wrap failed: {}", e))),
            PublicKeyInner::Ecdh(_) => Err(CryptoError::UnsupportedAlgorithm(
                "ECDH keys have no key-wrap path".into(),
            )),
        }
    }

    fn unwrap_key(&self, key: &PrivateKeyHandle, wrapped: &[u8]) -> CryptoResult<SymmetricKey> {
        match &key.0 {
            PrivateKeyInner::RsaOaep(private) => {
                let raw = Zeroizing::new(
                    private
                        .decrypt(Oaep::new::<Sha256>(), wrapped)
                        .map_err(|_| CryptoError::Decryption)?,
                );
                SymmetricKey::from_slice(&raw)
            }
            PrivateKeyInner::Ecdh(_) => Err(CryptoError::UnsupportedAlgorithm(
                "ECDH keys have no key-wrap path".into(),
            )),
        }
    }

    fn sign(&self, key: &SigningKeyHandle, data: &[u8]) -> CryptoResult<Vec<u8>> {
        let signing_key = SigningKey::from(&key.0);
        let signature: Signature = signing_key
            .try_sign(data)
            .map_err(|e| CryptoError::Signing(e.to_string()))?;
        Ok(signature.to_bytes().to_vec())
    }

    fn verify(&self, key: &VerifyingKeyHandle, data: &[u8], signature: &[u8]) -> bool {
        if signature.len() != SIGNATURE_LEN {
            return false;
        }
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        VerifyingKey::from(&key.0).verify(data, &signature).is_ok()
    }

    fn digest(&self, data: &[u8]) -> [u8; 32] {
        Sha256::digest(data).into()
    }

    fn export_public_spki(&self, key: &PublicKeyHandle) -> CryptoResult<Vec<u8>> {
        let doc = match &key.0 {
            PublicKeyInner::RsaOaep(public) => public.to_public_key_der(),
            PublicKeyInner::Ecdh(public) => public.to_public_key_der(),
        }
        .map_err(|e| CryptoError::MalformedKey(format!("SPKI encoding failed: {}", e)))?;
        Ok(doc.as_bytes().to_vec())
    }

    fn import_public_spki(
        &self,
        algorithm: EncryptionAlgorithm,
        der: &[u8],
    ) -> CryptoResult<PublicKeyHandle> {
        let inner = match algorithm {
            EncryptionAlgorithm::RsaOaep => PublicKeyInner::RsaOaep(
                RsaPublicKey::from_public_key_der(der)
                    .map_err(|e| CryptoError::MalformedKey(format!("Not an RSA key: {}", e)))?,
            ),
            EncryptionAlgorithm::Ecdh => PublicKeyInner::Ecdh(
                p256::PublicKey::from_public_key_der(der)
                    .map_err(|e| CryptoError::MalformedKey(format!("Not a P-256 key: {}", e)))?,
            ),
        };
        Ok(PublicKeyHandle(inner))
    }

    fn export_verifying_spki(&self, key: &VerifyingKeyHandle) -> CryptoResult<Vec<u8>> {
        let doc = key
            .0
            .to_public_key_der()
            .map_err(|e| CryptoError::MalformedKey(format!("SPKI encoding failed: {}", e)))?;
        Ok(doc.as_bytes().to_vec())
    }

    fn import_verifying_spki(&self, der: &[u8]) -> CryptoResult<VerifyingKeyHandle> {
        p256::PublicKey::from_public_key_der(der)
            .map(VerifyingKeyHandle)
            .map_err(|e| CryptoError::MalformedKey(format!("Not a P-256 key: {}", e)))
    }
}
