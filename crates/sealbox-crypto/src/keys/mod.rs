//! Identity key material.
//!
//! - [`handles`]: opaque key handles, no raw private bytes
//! - [`manager`]: generation, PEM import/export, bundles, sealing
//! - [`fingerprint`]: fingerprints and vault namespaces
//! - [`seal`]: SBXSEAL1 sealed private keys
//! - [`bundle`]: the exported public key bundle
//! - [`record`]: identity and contact records

pub mod bundle;
pub mod fingerprint;
pub mod handles;
pub mod manager;
pub mod record;
pub mod seal;

pub use bundle::PublicKeyBundle;
pub use fingerprint::{fingerprint_spki, is_fingerprint, vault_namespace_spki};
pub use handles::{
    EncryptionAlgorithm, PrivateKeyHandle, PublicKeyHandle, SigningKeyHandle, VerifyingKeyHandle,
};
pub use manager::{KeyManager, DEFAULT_RSA_MODULUS_BITS};
pub use record::{
    ContactRecord, ContactSigningKey, KeyPairRecord, SigningKeyPair, StoredContact, StoredKeyPair,
};
pub use seal::SealedKeyType;
