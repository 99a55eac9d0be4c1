//! Error types for cryptographic operations.

use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Stable, caller-facing classification of a failure.
///
/// Every error surfaced by sealbox maps onto exactly one kind. The
/// `Display` form is the kebab-case name used in logs and CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    CryptoUnavailable,
    KeyGenerationFailed,
    MalformedKey,
    MalformedEnvelope,
    DecryptionFailure,
    EncryptionFailed,
    SigningFailed,
    SignatureInvalid,
    SignerUnknown,
    UnsupportedAlgorithm,
    StorageFailure,
    StaleWrite,
    PartialWrite,
    InvalidState,
    NotFound,
    InvalidInput,
}

impl ErrorKind {
    /// The kebab-case name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CryptoUnavailable => "crypto-unavailable",
            Self::KeyGenerationFailed => "key-generation-failed",
            Self::MalformedKey => "malformed-key",
            Self::MalformedEnvelope => "malformed-envelope",
            Self::DecryptionFailure => "decryption-failure",
            Self::EncryptionFailed => "encryption-failed",
            Self::SigningFailed => "signing-failed",
            Self::SignatureInvalid => "signature-invalid",
            Self::SignerUnknown => "signer-unknown",
            Self::UnsupportedAlgorithm => "unsupported-algorithm",
            Self::StorageFailure => "storage-failure",
            Self::StaleWrite => "stale-write",
            Self::PartialWrite => "partial-write",
            Self::InvalidState => "invalid-state",
            Self::NotFound => "not-found",
            Self::InvalidInput => "invalid-input",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Cryptographic operation errors.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// No usable cryptographic provider or entropy source.
    #[error("Cryptographic provider unavailable: {0}")]
    Unavailable(String),

    /// Key pair generation failed.
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// Public key could not be parsed (bad PEM, base64 or DER).
    #[error("Malformed key: {0}")]
    MalformedKey(String),

    /// Message envelope or vault blob could not be parsed.
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Envelope version is neither 1 nor 2.
    #[error("Unsupported envelope version: {0}")]
    UnsupportedVersion(u64),

    /// Encryption failed.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Producing a signature failed.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Decryption failed - wrong key or tampered data.
    ///
    /// The two causes cannot be told apart.
    #[error("Decryption failed - wrong key or tampered data")]
    Decryption,

    /// A signature from a known signer did not verify.
    #[error("Signature invalid for signer {0}")]
    SignatureInvalid(String),

    /// A signature fingerprint matched no known contact.
    #[error("Unknown signer: {0}")]
    SignerUnknown(String),

    /// The key's algorithm has no path for the requested operation.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Key derivation failed.
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// Passphrase too short.
    #[error("Passphrase too short (minimum {0} characters required)")]
    PassphraseTooShort(usize),

    /// Invalid keyfile format or size.
    #[error("Invalid keyfile: {0}")]
    InvalidKeyfile(String),

    /// Sealed private key blob is unreadable.
    #[error("Invalid sealed key: {0}")]
    InvalidSealedKey(String),

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CryptoError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unavailable(_) => ErrorKind::CryptoUnavailable,
            Self::KeyGeneration(_) => ErrorKind::KeyGenerationFailed,
            Self::MalformedKey(_) | Self::InvalidKeyfile(_) => ErrorKind::MalformedKey,
            Self::MalformedEnvelope(_) | Self::UnsupportedVersion(_) => {
                ErrorKind::MalformedEnvelope
            }
            Self::Decryption | Self::InvalidSealedKey(_) => ErrorKind::DecryptionFailure,
            Self::SignatureInvalid(_) => ErrorKind::SignatureInvalid,
            Self::SignerUnknown(_) => ErrorKind::SignerUnknown,
            Self::UnsupportedAlgorithm(_) => ErrorKind::UnsupportedAlgorithm,
            Self::Encryption(_) => ErrorKind::EncryptionFailed,
            Self::Signing(_) => ErrorKind::SigningFailed,
            Self::KeyDerivation(_) | Self::PassphraseTooShort(_) | Self::InvalidInput(_) => {
                ErrorKind::InvalidInput
            }
            Self::Io(_) => ErrorKind::StorageFailure,
            Self::Json(_) => ErrorKind::InvalidInput,
        }
    }
}

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
