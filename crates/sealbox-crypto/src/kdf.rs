//! Sealing-key derivation.
//!
//! Private keys are persisted only in sealed form (see [`crate::keys::seal`]).
//! The 32-byte sealing key either lives in a local key file or is derived
//! from a passphrase with Argon2id.

use std::path::Path;

use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::cipher::generate_random;
use crate::error::{CryptoError, CryptoResult};

/// Minimum passphrase length.
pub const MIN_PASSPHRASE_LENGTH: usize = 12;

/// Salt length for passphrase derivation.
pub const SALT_LEN: usize = 32;

/// Argon2id parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory in KiB (default: 65536 = 64 MiB).
    pub memory_kib: u32,
    /// Time iterations (default: 3).
    pub iterations: u32,
    /// Parallelism degree (default: 4).
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 65536, // 64 MiB
            iterations: 3,
            parallelism: 4,
        }
    }
}

/// 256-bit key that seals private key material at rest.
///
/// Zeroized on drop; never serialized.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SealingKey {
    key: [u8; 32],
}

impl SealingKey {
    /// Draw a fresh random sealing key.
    pub fn generate() -> Self {
        Self {
            key: generate_random(),
        }
    }

    /// Derive a sealing key from a passphrase using Argon2id.
    pub fn from_passphrase(
        passphrase: &str,
        salt: &[u8; SALT_LEN],
        params: &KdfParams,
    ) -> CryptoResult<Self> {
        validate_passphrase(passphrase)?;

        let argon2_params = Params::new(
            params.memory_kib,
            params.iterations,
            params.parallelism,
            Some(32),
        )
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

        let mut key = [0u8; 32];
        argon2
            .hash_password_into(passphrase.as_bytes(), salt, &mut key)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

        Ok(Self { key })
    }

    /// Load a sealing key from a keyfile (raw 32 bytes or base64-encoded).
    pub fn from_keyfile(path: &Path) -> CryptoResult<Self> {
        let mut contents = std::fs::read(path)?;

        let key = if contents.len() == 32 {
            let mut key = [0u8; 32];
            key.copy_from_slice(&contents);
            key
        } else {
            let cleaned: String = String::from_utf8_lossy(&contents)
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();

            let mut decoded = base64::engine::general_purpose::STANDARD
                .decode(&cleaned)
                .map_err(|e| CryptoError::InvalidKeyfile(e.to_string()))?;

            if decoded.len() != 32 {
                let len = decoded.len();
                decoded.zeroize();
                return Err(CryptoError::InvalidKeyfile(format!(
                    "Expected 32 bytes, got {}",
                    len
                )));
            }

            let mut key = [0u8; 32];
            key.copy_from_slice(&decoded);
            decoded.zeroize();
            key
        };
        contents.zeroize();

        Ok(Self { key })
    }

    /// Write this key to `path` as base64 (mode 0600 on unix).
    pub fn write_keyfile(&self, path: &Path) -> CryptoResult<()> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(self.key);
        std::fs::write(path, encoded)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// Load the keyfile at `path`, creating it with a fresh key if absent.
    pub fn load_or_create_keyfile(path: &Path) -> CryptoResult<Self> {
        if path.exists() {
            return Self::from_keyfile(path);
        }
        let key = Self::generate();
        key.write_keyfile(path)?;
        Ok(key)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

impl std::fmt::Debug for SealingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealingKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Generate a random salt for passphrase derivation.
pub fn generate_kdf_salt() -> [u8; SALT_LEN] {
    generate_random()
}

/// Validate passphrase strength.
pub fn validate_passphrase(passphrase: &str) -> CryptoResult<()> {
    if passphrase.len() < MIN_PASSPHRASE_LENGTH {
        return Err(CryptoError::PassphraseTooShort(MIN_PASSPHRASE_LENGTH));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fast_params() -> KdfParams {
        KdfParams {
            memory_kib: 8192,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_kdf_params_default() {
        let params = KdfParams::default();
        assert_eq!(params.memory_kib, 65536);
        assert_eq!(params.iterations, 3);
        assert_eq!(params.parallelism, 4);
    }

    #[test]
    fn test_from_passphrase_deterministic() {
        let salt = [42u8; 32];

        let key1 = SealingKey::from_passphrase("my-secure-passphrase-123", &salt, &fast_params())
            .unwrap();
        let key2 = SealingKey::from_passphrase("my-secure-passphrase-123", &salt, &fast_params())
            .unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_from_passphrase_different_salts() {
        let key1 = SealingKey::from_passphrase("my-secure-passphrase-123", &[1u8; 32], &fast_params())
            .unwrap();
        let key2 = SealingKey::from_passphrase("my-secure-passphrase-123", &[2u8; 32], &fast_params())
            .unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_from_passphrase_too_short() {
        let result = SealingKey::from_passphrase("short", &[0u8; 32], &fast_params());
        assert!(matches!(result, Err(CryptoError::PassphraseTooShort(_))));
    }

    #[test]
    fn test_sealing_key_debug_redacted() {
        let key = SealingKey::generate();
        let debug_str = format!("{:?}", key);
        assert!(debug_str.contains("REDACTED"));
    }

    #[test]
    fn test_write_and_load_keyfile() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("master.key");

        let key = SealingKey::generate();
        key.write_keyfile(&path).unwrap();

        let loaded = SealingKey::from_keyfile(&path).unwrap();
        assert_eq!(key.as_bytes(), loaded.as_bytes());
    }

    #[test]
    fn test_load_or_create_keyfile_is_stable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("master.key");

        let first = SealingKey::load_or_create_keyfile(&path).unwrap();
        let second = SealingKey::load_or_create_keyfile(&path).unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn test_load_keyfile_raw() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raw.key");

        let raw_key = [42u8; 32];
        std::fs::write(&path, raw_key).unwrap();

        let key = SealingKey::from_keyfile(&path).unwrap();
        assert_eq!(key.as_bytes(), &raw_key);
    }

    #[test]
    fn test_load_keyfile_invalid_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("invalid.key");

        std::fs::write(&path, [0u8; 16]).unwrap();

        let result = SealingKey::from_keyfile(&path);
        assert!(matches!(result, Err(CryptoError::InvalidKeyfile(_))));
    }

    #[test]
    fn test_validate_passphrase() {
        assert!(validate_passphrase("my-long-passphrase").is_ok());
        assert!(matches!(
            validate_passphrase("short"),
            Err(CryptoError::PassphraseTooShort(_))
        ));
    }

    #[test]
    fn test_kdf_params_serialization() {
        let params = KdfParams::default();
        let json = serde_json::to_string(&params).unwrap();
        let parsed: KdfParams = serde_json::from_str(&json).unwrap();
        assert_eq!(params, parsed);
    }
}
