//! Fingerprints and vault namespaces derived from public keys.
//!
//! Both are pure functions of the SPKI DER encoding:
//!
//! ```text
//! fingerprint = "sha256:" || hex(SHA256(spki))[0..16]
//! hex1        = hex(SHA256(spki))[0..32]
//! namespace   = hex(SHA256(utf8(hex1 || "/filesystem")))[0..32]
//! ```

use sha2::{Digest, Sha256};

/// Fingerprint prefix.
pub const FINGERPRINT_PREFIX: &str = "sha256:";

/// Number of digest bytes rendered in a fingerprint (16 hex chars).
const FINGERPRINT_BYTES: usize = 8;

/// Number of digest bytes rendered in a namespace (32 hex chars).
const NAMESPACE_BYTES: usize = 16;

/// Suffix mixed into the namespace derivation.
const NAMESPACE_SUFFIX: &str = "/filesystem";

/// Compute the human-facing fingerprint of an SPKI-encoded public key.
pub fn fingerprint_spki(spki_der: &[u8]) -> String {
    let digest = Sha256::digest(spki_der);
    format!(
        "{}{}",
        FINGERPRINT_PREFIX,
        hex::encode(&digest[..FINGERPRINT_BYTES])
    )
}

/// Derive the vault storage namespace of an SPKI-encoded public key.
///
/// One-way: the namespace does not reveal the key.
pub fn vault_namespace_spki(spki_der: &[u8]) -> String {
    let digest = Sha256::digest(spki_der);
    let hex1 = hex::encode(&digest[..NAMESPACE_BYTES]);

    let mut hasher = Sha256::new();
    hasher.update(hex1.as_bytes());
    hasher.update(NAMESPACE_SUFFIX.as_bytes());
    hex::encode(&hasher.finalize()[..NAMESPACE_BYTES])
}

/// Check that `s` looks like a fingerprint produced by [`fingerprint_spki`].
pub fn is_fingerprint(s: &str) -> bool {
    s.strip_prefix(FINGERPRINT_PREFIX)
        .map(|hex| {
            hex.len() == FINGERPRINT_BYTES * 2
                && hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        })
        .unwrap_or(false)
}
