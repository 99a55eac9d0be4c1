//! Structured logging schema and field name constants for sealbox.
//!
//! All crates use these names for structured logging fields so that log
//! queries work the same across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Vault divergence after a partial multi-step write |
//! | WARN  | Stale-write retries, orphaned index entries, best-effort cleanup failures |
//! | INFO  | Lifecycle events (key generated, vault created/opened, contact imported) |
//! | DEBUG | Individual remote-store and database calls |
//! | TRACE | Per-child folder listing |
//!
//! Key material, plaintext and file names never appear in log fields.
//! Fingerprints, namespaces and GUIDs may.

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "crypto", "database", "vault", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "service", "memory_store", "fs_store", "pool", "keyring"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "upload_file", "store_index", "insert_key"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Vault namespace (derived, one-way).
pub const NAMESPACE: &str = "namespace";

/// GUID of the folder or file being operated on.
pub const GUID: &str = "guid";

/// GUID of the parent folder.
pub const PARENT_GUID: &str = "parent_guid";

/// Public key fingerprint.
pub const FINGERPRINT: &str = "fingerprint";

/// Object revision read or written.
pub const REVISION: &str = "revision";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of entries returned by a listing.
pub const RESULT_COUNT: &str = "result_count";

/// Retry attempt number (1-based).
pub const ATTEMPT: &str = "attempt";

/// Payload size in bytes (ciphertext, never plaintext content).
pub const SIZE_BYTES: &str = "size_bytes";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Database table affected.
pub const DB_TABLE: &str = "db_table";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Error kind (kebab-case).
pub const ERROR_KIND: &str = "error_kind";

/// Set on events reporting index/folder divergence.
pub const DIVERGENCE: &str = "divergence";

/// Last completed step of a multi-step mutation.
pub const STEP: &str = "step";
