//! Sealed private keys.
//!
//! Private key handles are only ever persisted in sealed form: the PKCS#8
//! DER encoding encrypted with AES-256-GCM under a [`SealingKey`].
//!
//! # Format: SBXSEAL1
//!
//! ```text
//! +------------------+
//! | Magic: SBXSEAL1  | 8 bytes
//! +------------------+
//! | Header Length    | 4 bytes (little-endian)
//! +------------------+
//! | Header (JSON)    | Variable
//! +------------------+
//! | Encrypted Key    | PKCS#8 DER + 16-byte auth tag
//! +------------------+
//! ```

use chrono::{DateTime, Utc};
use p256::pkcs8::{DecodePrivateKey as _, EncodePrivateKey as _};
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::cipher::{aes_gcm_decrypt, aes_gcm_encrypt, generate_iv, IV_LEN, TAG_LEN};
use crate::error::{CryptoError, CryptoResult};
use crate::format::{base64_decode, base64_encode};
use crate::kdf::SealingKey;
use crate::keys::handles::{PrivateKeyHandle, PrivateKeyInner, SigningKeyHandle};

/// Magic bytes of a sealed key blob.
pub const MAGIC_SEALED_KEY: &[u8; 8] = b"SBXSEAL1";

/// Current sealed key format version.
pub const SEALED_KEY_VERSION: u8 = 1;

/// Kind of private key inside a sealed blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SealedKeyType {
    #[serde(rename = "RSA-OAEP")]
    RsaOaep,
    #[serde(rename = "ECDH")]
    Ecdh,
    #[serde(rename = "ECDSA")]
    Ecdsa,
}

/// Header of a sealed key blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedKeyHeader {
    pub version: u8,
    pub algorithm: SealedKeyType,
    /// AES-GCM nonce (base64).
    pub nonce: String,
    pub created_at: DateTime<Utc>,
}

/// Seal an encryption private key.
pub fn seal_private_key(key: &PrivateKeyHandle, sealing_key: &SealingKey) -> CryptoResult<Vec<u8>> {
    let (algorithm, der) = match &key.0 {
        PrivateKeyInner::RsaOaep(k) => (SealedKeyType::RsaOaep, pkcs8_rsa(k)?),
        PrivateKeyInner::Ecdh(k) => (SealedKeyType::Ecdh, pkcs8_p256(k)?),
    };
    seal_bytes(algorithm, &der, sealing_key)
}

/// Seal a signing private key.
pub fn seal_signing_key(key: &SigningKeyHandle, sealing_key: &SealingKey) -> CryptoResult<Vec<u8>> {
    let der = pkcs8_p256(&key.0)?;
    seal_bytes(SealedKeyType::Ecdsa, &der, sealing_key)
}

/// Open a sealed encryption private key.
pub fn open_private_key(sealed: &[u8], sealing_key: &SealingKey) -> CryptoResult<PrivateKeyHandle> {
    let (header, der) = open_bytes(sealed, sealing_key)?;
    let inner = match header.algorithm {
        SealedKeyType::RsaOaep => PrivateKeyInner::RsaOaep(
            RsaPrivateKey::from_pkcs8_der(&der)
                .map_err(|e| CryptoError::InvalidSealedKey(format!("Bad RSA key: {}", e)))?,
        ),
        SealedKeyType::Ecdh => PrivateKeyInner::Ecdh(
            p256::SecretKey::from_pkcs8_der(&der)
                .map_err(|e| CryptoError::InvalidSealedKey(format!("Bad P-256 key: {}", e)))?,
        ),
        SealedKeyType::Ecdsa => {
            return Err(CryptoError::InvalidSealedKey(
                "Expected an encryption key, found a signing key".into(),
            ))
        }
    };
    Ok(PrivateKeyHandle(inner))
}

/// Open a sealed signing private key.
pub fn open_signing_key(sealed: &[u8], sealing_key: &SealingKey) -> CryptoResult<SigningKeyHandle> {
    let (header, der) = open_bytes(sealed, sealing_key)?;
    if header.algorithm != SealedKeyType::Ecdsa {
        return Err(CryptoError::InvalidSealedKey(
            "Expected a signing key, found an encryption key".into(),
        ));
    }
    let secret = p256::SecretKey::from_pkcs8_der(&der)
        .map_err(|e| CryptoError::InvalidSealedKey(format!("Bad P-256 key: {}", e)))?;
    Ok(SigningKeyHandle(secret))
}

/// Check if data starts with the sealed key magic.
pub fn is_sealed_key(data: &[u8]) -> bool {
    data.len() >= 8 && &data[0..8] == MAGIC_SEALED_KEY
}

fn pkcs8_rsa(key: &RsaPrivateKey) -> CryptoResult<Zeroizing<Vec<u8>>> {
    let doc = key
        .to_pkcs8_der()
        .map_err(|e| CryptoError::Encryption(format!("PKCS#8 encoding failed: {}", e)))?;
    Ok(Zeroizing::new(doc.as_bytes().to_vec()))
}

fn pkcs8_p256(key: &p256::SecretKey) -> CryptoResult<Zeroizing<Vec<u8>>> {
    let doc = key
        .to_pkcs8_der()
        .map_err(|e| CryptoError::Encryption(format!("PKCS#8 encoding failed: {}", e)))?;
    Ok(Zeroizing::new(doc.as_bytes().to_vec()))
}

fn seal_bytes(
    algorithm: SealedKeyType,
    plaintext: &[u8],
    sealing_key: &SealingKey,
) -> CryptoResult<Vec<u8>> {
    let nonce = generate_iv();
    let ciphertext = aes_gcm_encrypt(sealing_key.as_bytes(), &nonce, plaintext)?;

    let header = SealedKeyHeader {
        version: SEALED_KEY_VERSION,
        algorithm,
        nonce: base64_encode(&nonce),
        created_at: Utc::now(),
    };
    let header_json = serde_json::to_vec(&header)?;
    let header_len = (header_json.len() as u32).to_le_bytes();

    let mut output = Vec::with_capacity(8 + 4 + header_json.len() + ciphertext.len());
    output.extend_from_slice(MAGIC_SEALED_KEY);
    output.extend_from_slice(&header_len);
    output.extend_from_slice(&header_json);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

fn open_bytes(
    sealed: &[u8],
    sealing_key: &SealingKey,
) -> CryptoResult<(SealedKeyHeader, Zeroizing<Vec<u8>>)> {
    if !is_sealed_key(sealed) {
        return Err(CryptoError::InvalidSealedKey("Missing SBXSEAL1 magic".into()));
    }
    if sealed.len() < 12 {
        return Err(CryptoError::InvalidSealedKey("Blob too short".into()));
    }

    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&sealed[8..12]);
    let header_len = u32::from_le_bytes(len_bytes) as usize;

    let body_start = 12usize
        .checked_add(header_len)
        .ok_or_else(|| CryptoError::InvalidSealedKey("Header length overflow".into()))?;
    if sealed.len() < body_start + TAG_LEN {
        return Err(CryptoError::InvalidSealedKey("Blob truncated".into()));
    }

    let header: SealedKeyHeader = serde_json::from_slice(&sealed[12..body_start])
        .map_err(|e| CryptoError::InvalidSealedKey(format!("Invalid header: {}", e)))?;
    if header.version != SEALED_KEY_VERSION {
        return Err(CryptoError::InvalidSealedKey(format!(
            "Unsupported version {}",
            header.version
        )));
    }

    let nonce_vec = base64_decode(&header.nonce)
        .map_err(|_| CryptoError::InvalidSealedKey("Invalid nonce encoding".into()))?;
    let nonce: [u8; IV_LEN] = nonce_vec
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidSealedKey("Invalid nonce length".into()))?;

    let plaintext = aes_gcm_decrypt(sealing_key.as_bytes(), &nonce, &sealed[body_start..])?;
    Ok((header, Zeroizing::new(plaintext)))
}
