//! # sealbox-crypto
//!
//! Cryptographic core of sealbox: identity keys, hybrid encryption,
//! signed message envelopes and the vault blob format.
//!
//! ## Cryptographic Primitives
//!
//! - **Encryption keys**: RSA-OAEP 4096 / SHA-256 (ECDH P-256 supported for
//!   key management only)
//! - **Signing keys**: ECDSA P-256 / SHA-256, raw `r || s` signatures
//! - **Symmetric cipher**: AES-256-GCM (AEAD), fresh key and IV per payload
//! - **Key sealing at rest**: AES-256-GCM under a key file or an Argon2id
//!   passphrase-derived key
//! - **Identity**: `sha256:` fingerprints of the SPKI encoding
//!
//! ## Message Envelope
//!
//! ```text
//! base64( {"v":2,"w":b64(wrappedKey),"i":b64(iv),"c":b64(ciphertext),"s":b64(sig)?,"f":fingerprint?} )
//! ```
//!
//! ## Vault Blob
//!
//! ```text
//! base64( [u32 BE wrappedKeyLen][wrappedKey][12-byte iv][ciphertext] )
//! ```
//!
//! ## Examples
//!
//! ### Send a Signed Message
//!
//! ```rust,no_run
//! use sealbox_crypto::{EncryptionAlgorithm, KeyManager, MessageCodec, SoftwareProvider};
//!
//! let provider = SoftwareProvider::shared();
//! let keys = KeyManager::new(provider.clone());
//! let codec = MessageCodec::new(provider);
//!
//! let alice = keys.generate("alice", EncryptionAlgorithm::RsaOaep).unwrap();
//! let bob = keys.generate("bob", EncryptionAlgorithm::RsaOaep).unwrap();
//!
//! // Bob imports Alice's bundle as a contact.
//! let bundle = keys.export_bundle(&alice).to_json().unwrap();
//! let alice_contact = keys.import_bundle(&bundle, "alice", "file").unwrap();
//!
//! let wire = codec
//!     .encode(&bob.public_key, b"hello bob", alice.signing.as_ref())
//!     .unwrap();
//! let message = codec
//!     .decode(&wire, &bob.private_key, &vec![alice_contact])
//!     .unwrap();
//!
//! assert_eq!(message.plaintext, b"hello bob");
//! assert!(message.signature.is_verified());
//! ```
//!
//! ### Fingerprints and Namespaces
//!
//! ```rust
//! use sealbox_crypto::{EncryptionAlgorithm, KeyManager, SoftwareProvider};
//!
//! let keys = KeyManager::new(SoftwareProvider::shared());
//! let record = keys.generate("scratch", EncryptionAlgorithm::Ecdh).unwrap();
//!
//! assert!(record.fingerprint.starts_with("sha256:"));
//! let namespace = keys.vault_namespace(&record.public_key).unwrap();
//! assert_eq!(namespace.len(), 32);
//! ```

pub mod cipher;
pub mod envelope;
pub mod error;
pub mod format;
pub mod hybrid;
pub mod kdf;
pub mod keys;
pub mod provider;

// Re-export commonly used types
pub use cipher::{SymmetricKey, IV_LEN, KEY_LEN, TAG_LEN};
pub use envelope::{
    DecodedMessage, KnownSigner, MessageCodec, MessageEnvelope, SignatureStatus, SignerDirectory,
    SignerSet,
};
pub use error::{CryptoError, CryptoResult, ErrorKind};
pub use format::{base64_decode, base64_encode};
pub use hybrid::{HybridCipher, HybridCiphertext};
pub use kdf::{generate_kdf_salt, validate_passphrase, KdfParams, SealingKey, SALT_LEN};
pub use keys::{
    ContactRecord, ContactSigningKey, EncryptionAlgorithm, KeyManager, KeyPairRecord,
    PrivateKeyHandle, PublicKeyBundle, PublicKeyHandle, SigningKeyHandle, SigningKeyPair,
    StoredContact, StoredKeyPair, VerifyingKeyHandle, DEFAULT_RSA_MODULUS_BITS,
};
pub use provider::{CryptoProvider, SoftwareProvider};

#[cfg(test)]
mod integration_tests {
    use super::*;

    /// Sealed ECDH identity survives a trip through its stored form.
    #[test]
    fn test_ecdh_identity_persistence() {
        let keys = KeyManager::new(SoftwareProvider::shared());
        let sealing = SealingKey::generate();

        let record = keys.generate("device", EncryptionAlgorithm::Ecdh).unwrap();
        let stored = keys.seal(&record, &sealing).unwrap();
        let json = serde_json::to_string(&stored).unwrap();

        let restored: StoredKeyPair = serde_json::from_str(&json).unwrap();
        let opened = keys.open(&restored, &sealing).unwrap();

        assert_eq!(opened.fingerprint, record.fingerprint);
        assert_eq!(
            keys.vault_namespace(&opened.public_key).unwrap(),
            keys.vault_namespace(&record.public_key).unwrap()
        );
    }

    /// Stored forms contain public PEM but no private key material.
    #[test]
    fn test_stored_form_has_no_plain_private_key() {
        let keys = KeyManager::new(SoftwareProvider::shared());
        let record = keys.generate("device", EncryptionAlgorithm::Ecdh).unwrap();
        let stored = keys.seal(&record, &SealingKey::generate()).unwrap();

        let json = serde_json::to_string(&stored).unwrap();
        assert!(!json.contains("PRIVATE KEY"));
        assert!(keys::seal::is_sealed_key(&stored.sealed_private_key));
    }
}
