//! Centralized default constants for sealbox.
//!
//! Configuration loading and every crate read their defaults from here.

// =============================================================================
// PATHS
// =============================================================================

/// Data directory name under `$HOME`.
pub const DATA_DIR_NAME: &str = ".sealbox";

/// SQLite key store file name inside the data directory.
pub const DATABASE_FILE: &str = "keys.db";

/// Sealing key file name inside the data directory.
pub const MASTER_KEY_FILE: &str = "master.key";

/// Argon2id salt file name inside the data directory.
pub const KDF_SALT_FILE: &str = "kdf.salt";

/// Filesystem remote store directory name inside the data directory.
pub const REMOTE_DIR_NAME: &str = "remote";

// =============================================================================
// KEYS
// =============================================================================

/// RSA modulus size for generated identities.
pub const RSA_MODULUS_BITS: usize = 4096;

/// Smallest RSA modulus accepted from configuration.
pub const RSA_MODULUS_BITS_MIN: usize = 2048;

/// Default label for a generated identity.
pub const IDENTITY_LABEL: &str = "default";

// =============================================================================
// VAULT
// =============================================================================

/// Bytes of randomness in a GUID (rendered as 8 hex chars).
pub const GUID_BYTES: usize = 4;

/// Attempts at drawing a GUID not already present in the index.
pub const GUID_MAX_ATTEMPTS: usize = 16;

/// Retries of a stale conditional write before giving up.
pub const MAX_WRITE_RETRIES: u32 = 3;

/// Upper bound accepted for `SEALBOX_MAX_WRITE_RETRIES`.
pub const MAX_WRITE_RETRIES_LIMIT: u32 = 100;

/// MIME type recorded when none is given.
pub const DEFAULT_MIME: &str = "application/octet-stream";

// =============================================================================
// DATABASE POOL
// =============================================================================

/// Maximum pooled SQLite connections.
pub const DB_MAX_CONNECTIONS: u32 = 5;

/// Connection acquire timeout in seconds.
pub const DB_ACQUIRE_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// LOGGING
// =============================================================================

/// Default `RUST_LOG` directive for the CLI.
pub const LOG_FILTER: &str = "sealbox=info,sealbox_vault=info,sealbox_db=info";

/// Rolling log file prefix.
pub const LOG_FILE_PREFIX: &str = "sealbox.log";
