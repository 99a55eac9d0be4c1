//! Environment-driven configuration.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `SEALBOX_DATA_DIR` | `$HOME/.sealbox`, else `./.sealbox` |
//! | `SEALBOX_DATABASE_URL` | `sqlite://<data_dir>/keys.db` |
//! | `SEALBOX_REMOTE_DIR` | `<data_dir>/remote` |
//! | `SEALBOX_MASTER_KEY` | `<data_dir>/master.key` |
//! | `SEALBOX_PASSPHRASE` | unset (use the key file) |
//! | `SEALBOX_RSA_BITS` | `4096` |
//! | `SEALBOX_CONCURRENCY` | `optimistic` |
//! | `SEALBOX_MAX_WRITE_RETRIES` | `3` |

use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use sealbox_crypto::{generate_kdf_salt, KdfParams, SealingKey, SALT_LEN};

use crate::defaults;
use crate::error::{Error, Result};
use crate::models::ConcurrencyMode;

pub const ENV_DATA_DIR: &str = "SEALBOX_DATA_DIR";
pub const ENV_DATABASE_URL: &str = "SEALBOX_DATABASE_URL";
pub const ENV_REMOTE_DIR: &str = "SEALBOX_REMOTE_DIR";
pub const ENV_MASTER_KEY: &str = "SEALBOX_MASTER_KEY";
pub const ENV_PASSPHRASE: &str = "SEALBOX_PASSPHRASE";
pub const ENV_RSA_BITS: &str = "SEALBOX_RSA_BITS";
pub const ENV_CONCURRENCY: &str = "SEALBOX_CONCURRENCY";
pub const ENV_MAX_WRITE_RETRIES: &str = "SEALBOX_MAX_WRITE_RETRIES";

/// Runtime configuration.
#[derive(Clone)]
pub struct SealboxConfig {
    pub data_dir: PathBuf,
    pub database_url: String,
    pub remote_dir: PathBuf,
    pub master_key_path: PathBuf,
    /// When set, the sealing key is derived from this instead of read from
    /// `master_key_path`.
    pub passphrase: Option<String>,
    pub rsa_modulus_bits: usize,
    pub concurrency: ConcurrencyMode,
    pub max_write_retries: u32,
}

impl Default for SealboxConfig {
    fn default() -> Self {
        Self::for_data_dir(default_data_dir(env::var("HOME").ok()))
    }
}

impl std::fmt::Debug for SealboxConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealboxConfig")
            .field("data_dir", &self.data_dir)
            .field("database_url", &self.database_url)
            .field("remote_dir", &self.remote_dir)
            .field("master_key_path", &self.master_key_path)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .field("rsa_modulus_bits", &self.rsa_modulus_bits)
            .field("concurrency", &self.concurrency)
            .field("max_write_retries", &self.max_write_retries)
            .finish()
    }
}

fn default_data_dir(home: Option<String>) -> PathBuf {
    match home {
        Some(home) if !home.is_empty() => PathBuf::from(home).join(defaults::DATA_DIR_NAME),
        _ => PathBuf::from(".").join(defaults::DATA_DIR_NAME),
    }
}

impl SealboxConfig {
    /// Defaults rooted at `data_dir`.
    pub fn for_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            database_url: sqlite_url(&data_dir.join(defaults::DATABASE_FILE)),
            remote_dir: data_dir.join(defaults::REMOTE_DIR_NAME),
            master_key_path: data_dir.join(defaults::MASTER_KEY_FILE),
            passphrase: None,
            rsa_modulus_bits: defaults::RSA_MODULUS_BITS,
            concurrency: ConcurrencyMode::default(),
            max_write_retries: defaults::MAX_WRITE_RETRIES,
            data_dir,
        }
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_dir = get(ENV_DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| default_data_dir(lookup("HOME")));
        let mut config = Self::for_data_dir(data_dir);

        if let Some(url) = get(ENV_DATABASE_URL) {
            config.database_url = url;
        }
        if let Some(dir) = get(ENV_REMOTE_DIR) {
            config.remote_dir = PathBuf::from(dir);
        }
        if let Some(path) = get(ENV_MASTER_KEY) {
            config.master_key_path = PathBuf::from(path);
        }
        config.passphrase = lookup(ENV_PASSPHRASE).filter(|v| !v.is_empty());

        if let Some(bits) = get(ENV_RSA_BITS) {
            config.rsa_modulus_bits = bits
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{} must be an integer, got {:?}", ENV_RSA_BITS, bits)))?;
        }
        if let Some(mode) = get(ENV_CONCURRENCY) {
            config.concurrency = mode.trim().parse()?;
        }
        if let Some(retries) = get(ENV_MAX_WRITE_RETRIES) {
            config.max_write_retries = retries.trim().parse().map_err(|_| {
                Error::Config(format!(
                    "{} must be a non-negative integer, got {:?}",
                    ENV_MAX_WRITE_RETRIES, retries
                ))
            })?;
        }

        config.validate()?;
        debug!(
            data_dir = %config.data_dir.display(),
            concurrency = %config.concurrency,
            rsa_modulus_bits = config.rsa_modulus_bits,
            passphrase = config.passphrase.is_some(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.rsa_modulus_bits < defaults::RSA_MODULUS_BITS_MIN {
            return Err(Error::Config(format!(
                "RSA modulus must be at least {} bits, got {}",
                defaults::RSA_MODULUS_BITS_MIN,
                self.rsa_modulus_bits
            )));
        }
        if self.rsa_modulus_bits % 8 != 0 {
            return Err(Error::Config(format!(
                "RSA modulus must be a multiple of 8 bits, got {}",
                self.rsa_modulus_bits
            )));
        }
        if self.max_write_retries > defaults::MAX_WRITE_RETRIES_LIMIT {
            return Err(Error::Config(format!(
                "max_write_retries must be at most {}, got {}",
                defaults::MAX_WRITE_RETRIES_LIMIT,
                self.max_write_retries
            )));
        }
        if self.database_url.is_empty() {
            return Err(Error::Config("database_url cannot be empty".to_string()));
        }
        if !self.database_url.starts_with("sqlite:") {
            return Err(Error::Config(format!(
                "database_url must be a sqlite: URL, got: {}",
                self.database_url
            )));
        }
        if let Some(passphrase) = &self.passphrase {
            sealbox_crypto::validate_passphrase(passphrase)?;
        }
        Ok(())
    }

    /// Path of the Argon2id salt used with a passphrase.
    pub fn kdf_salt_path(&self) -> PathBuf {
        self.data_dir.join(defaults::KDF_SALT_FILE)
    }

    /// Resolve the key that seals private keys at rest.
    ///
    /// Uses the passphrase when configured (creating the salt file on first
    /// use), otherwise the master key file (creating it on first use).
    pub fn load_sealing_key(&self) -> Result<SealingKey> {
        std::fs::create_dir_all(&self.data_dir)?;
        match &self.passphrase {
            Some(passphrase) => {
                let salt = load_or_create_salt(&self.kdf_salt_path())?;
                Ok(SealingKey::from_passphrase(
                    passphrase,
                    &salt,
                    &KdfParams::default(),
                )?)
            }
            None => Ok(SealingKey::load_or_create_keyfile(&self.master_key_path)?),
        }
    }
}

fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}", path.display())
}

fn load_or_create_salt(path: &Path) -> Result<[u8; SALT_LEN]> {
    if path.exists() {
        let bytes = std::fs::read(path)?;
        return bytes.as_slice().try_into().map_err(|_| {
            Error::Config(format!(
                "KDF salt file {} must be {} bytes, found {}",
                path.display(),
                SALT_LEN,
                bytes.len()
            ))
        });
    }
    let salt = generate_kdf_salt();
    std::fs::write(path, salt)?;
    Ok(salt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_from_home() {
        let config = SealboxConfig::from_lookup(lookup(&[("HOME", "/home/test")])).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/home/test/.sealbox"));
        assert_eq!(config.database_url, "sqlite:///home/test/.sealbox/keys.db");
        assert_eq!(config.remote_dir, PathBuf::from("/home/test/.sealbox/remote"));
        assert_eq!(config.master_key_path, PathBuf::from("/home/test/.sealbox/master.key"));
        assert_eq!(config.rsa_modulus_bits, 4096);
        assert_eq!(config.concurrency, ConcurrencyMode::Optimistic);
        assert_eq!(config.max_write_retries, 3);
        assert!(config.passphrase.is_none());
    }

    #[test]
    fn test_defaults_without_home() {
        let config = SealboxConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("./.sealbox"));
    }

    #[test]
    fn test_overrides() {
        let config = SealboxConfig::from_lookup(lookup(&[
            (ENV_DATA_DIR, "/srv/sb"),
            (ENV_REMOTE_DIR, "/mnt/remote"),
            (ENV_RSA_BITS, "2048"),
            (ENV_CONCURRENCY, "last-writer-wins"),
            (ENV_MAX_WRITE_RETRIES, "7"),
        ]))
        .unwrap();
        assert_eq!(config.database_url, "sqlite:///srv/sb/keys.db");
        assert_eq!(config.remote_dir, PathBuf::from("/mnt/remote"));
        assert_eq!(config.rsa_modulus_bits, 2048);
        assert_eq!(config.concurrency, ConcurrencyMode::LastWriterWins);
        assert_eq!(config.max_write_retries, 7);
    }

    #[test]
    fn test_rejects_small_rsa() {
        let err = SealboxConfig::from_lookup(lookup(&[(ENV_RSA_BITS, "1024")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_bad_numbers_and_modes() {
        assert!(SealboxConfig::from_lookup(lookup(&[(ENV_RSA_BITS, "big")])).is_err());
        assert!(SealboxConfig::from_lookup(lookup(&[(ENV_MAX_WRITE_RETRIES, "-1")])).is_err());
        assert!(SealboxConfig::from_lookup(lookup(&[(ENV_CONCURRENCY, "locks")])).is_err());
    }

    #[test]
    fn test_rejects_short_passphrase() {
        let err = SealboxConfig::from_lookup(lookup(&[(ENV_PASSPHRASE, "short")])).unwrap_err();
        assert_eq!(err.kind(), sealbox_crypto::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_debug_redacts_passphrase() {
        let mut config = SealboxConfig::for_data_dir("/tmp/x");
        config.passphrase = Some("very secret passphrase".into());
        let debug = format!("{:?}", config);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("very secret"));
    }

    #[test]
    fn test_keyfile_sealing_key_is_stable() {
        let dir = tempdir().unwrap();
        let config = SealboxConfig::for_data_dir(dir.path());
        config.load_sealing_key().unwrap();
        assert!(config.master_key_path.exists());
        config.load_sealing_key().unwrap();
    }

    #[test]
    fn test_salt_file_created_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kdf.salt");
        let first = load_or_create_salt(&path).unwrap();
        let second = load_or_create_salt(&path).unwrap();
        assert_eq!(first, second);

        std::fs::write(&path, [0u8; 5]).unwrap();
        assert!(load_or_create_salt(&path).is_err());
    }
}
