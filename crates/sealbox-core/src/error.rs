//! Error types for sealbox.

use thiserror::Error;

use sealbox_crypto::CryptoError;
pub use sealbox_crypto::ErrorKind;

/// Result type alias using sealbox's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for sealbox operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Cryptographic operation failed (wraps CryptoError)
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Local database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Remote store operation failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Conditional write lost against a concurrent writer
    #[error("Stale write to {0}: object changed since it was read")]
    StaleWrite(String),

    /// Multi-step vault mutation failed after some remote writes succeeded.
    ///
    /// Nothing was rolled back; the folder graph and index may disagree.
    #[error("Partial write for {guid}: stopped after {completed}: {source}")]
    PartialWrite {
        guid: String,
        completed: &'static str,
        #[source]
        source: Box<Error>,
    },

    /// Operation not allowed in the current vault state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Crypto(e) => e.kind(),
            Self::Database(_) | Self::Storage(_) | Self::Io(_) | Self::Serialization(_) => {
                ErrorKind::StorageFailure
            }
            Self::StaleWrite(_) => ErrorKind::StaleWrite,
            Self::PartialWrite { .. } => ErrorKind::PartialWrite,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidInput(_) | Self::Config(_) => ErrorKind::InvalidInput,
        }
    }

    /// Whether this is an optimistic-concurrency rejection.
    pub fn is_stale_write(&self) -> bool {
        matches!(self, Self::StaleWrite(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
