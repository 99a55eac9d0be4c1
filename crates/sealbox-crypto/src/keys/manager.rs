//! Key lifecycle: generation, import/export, fingerprints, sealing.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::error::{CryptoError, CryptoResult};
use crate::format::{decode_public_key_pem, encode_public_key_pem};
use crate::kdf::SealingKey;
use crate::keys::bundle::PublicKeyBundle;
use crate::keys::fingerprint::{fingerprint_spki, vault_namespace_spki};
use crate::keys::handles::{EncryptionAlgorithm, PublicKeyHandle, VerifyingKeyHandle};
use crate::keys::record::{
    ContactRecord, ContactSigningKey, KeyPairRecord, SigningKeyPair, StoredContact, StoredKeyPair,
};
use crate::keys::seal::{open_private_key, open_signing_key, seal_private_key, seal_signing_key};
use crate::provider::CryptoProvider;

/// Default RSA modulus size.
pub const DEFAULT_RSA_MODULUS_BITS: usize = 4096;

/// Generates, imports, exports and fingerprints key material.
///
/// Private keys only ever leave a `KeyManager` sealed under a
/// [`SealingKey`].
#[derive(Clone)]
pub struct KeyManager {
    provider: Arc<dyn CryptoProvider>,
    rsa_modulus_bits: usize,
}

impl KeyManager {
    pub fn new(provider: Arc<dyn CryptoProvider>) -> Self {
        Self {
            provider,
            rsa_modulus_bits: DEFAULT_RSA_MODULUS_BITS,
        }
    }

    /// Override the RSA modulus size for generated keys.
    pub fn with_rsa_modulus_bits(mut self, bits: usize) -> Self {
        self.rsa_modulus_bits = bits;
        self
    }

    pub fn provider(&self) -> &Arc<dyn CryptoProvider> {
        &self.provider
    }

    pub fn rsa_modulus_bits(&self) -> usize {
        self.rsa_modulus_bits
    }

    /// Generate a new identity key pair.
    ///
    /// RSA-OAEP identities also get a companion ECDSA P-256 signing pair;
    /// ECDH identities do not.
    pub fn generate(&self, label: &str, algorithm: EncryptionAlgorithm) -> CryptoResult<KeyPairRecord> {
        let started = std::time::Instant::now();
        let (public_key, private_key) = self
            .provider
            .generate_key_pair(algorithm, self.rsa_modulus_bits)?;

        let spki = self.provider.export_public_spki(&public_key)?;
        let fingerprint = fingerprint_spki(&spki);
        let public_pem = encode_public_key_pem(&spki);

        let signing = match algorithm {
            EncryptionAlgorithm::RsaOaep => {
                let (verifying, signing) = self.provider.generate_signing_pair()?;
                let signing_spki = self.provider.export_verifying_spki(&verifying)?;
                Some(SigningKeyPair {
                    public_key: verifying,
                    private_key: signing,
                    fingerprint: fingerprint_spki(&signing_spki),
                    public_pem: encode_public_key_pem(&signing_spki),
                })
            }
            EncryptionAlgorithm::Ecdh => None,
        };

        info!(
            algorithm = %algorithm,
            fingerprint = %fingerprint,
            signing = signing.is_some(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Key pair generated"
        );

        Ok(KeyPairRecord {
            id: None,
            label: label.to_string(),
            created_at: Utc::now(),
            algorithm,
            key_size: public_key.key_size(),
            public_key,
            private_key,
            fingerprint,
            public_pem,
            signing,
        })
    }

    /// `sha256:<16 hex>` fingerprint of an encryption public key.
    pub fn fingerprint(&self, key: &PublicKeyHandle) -> CryptoResult<String> {
        Ok(fingerprint_spki(&self.provider.export_public_spki(key)?))
    }

    /// Fingerprint of a signing public key.
    pub fn signing_fingerprint(&self, key: &VerifyingKeyHandle) -> CryptoResult<String> {
        Ok(fingerprint_spki(&self.provider.export_verifying_spki(key)?))
    }

    /// Vault storage namespace of an identity public key.
    pub fn vault_namespace(&self, key: &PublicKeyHandle) -> CryptoResult<String> {
        Ok(vault_namespace_spki(&self.provider.export_public_spki(key)?))
    }

    /// Export an encryption public key as PEM.
    pub fn export_public_key_pem(&self, key: &PublicKeyHandle) -> CryptoResult<String> {
        Ok(encode_public_key_pem(&self.provider.export_public_spki(key)?))
    }

    /// Import an encryption public key of unknown algorithm.
    ///
    /// Tries RSA-OAEP first and falls back to ECDH. The PEM carries no
    /// algorithm tag, so this is a guess; prefer
    /// [`import_public_key_pem_as`](Self::import_public_key_pem_as) when
    /// the algorithm is known.
    pub fn import_public_key_pem(&self, pem: &str) -> CryptoResult<PublicKeyHandle> {
        let der = decode_public_key_pem(pem)?;
        match self
            .provider
            .import_public_spki(EncryptionAlgorithm::RsaOaep, &der)
        {
            Ok(key) => Ok(key),
            Err(_) => {
                debug!("PEM is not RSA, falling back to ECDH");
                self.provider
                    .import_public_spki(EncryptionAlgorithm::Ecdh, &der)
                    .map_err(|_| {
                        CryptoError::MalformedKey("Neither an RSA-OAEP nor an ECDH key".into())
                    })
            }
        }
    }

    /// Import an encryption public key of a known algorithm.
    pub fn import_public_key_pem_as(
        &self,
        pem: &str,
        algorithm: EncryptionAlgorithm,
    ) -> CryptoResult<PublicKeyHandle> {
        let der = decode_public_key_pem(pem)?;
        self.provider.import_public_spki(algorithm, &der)
    }

    /// Export a signing public key as PEM.
    pub fn export_signing_key_pem(&self, key: &VerifyingKeyHandle) -> CryptoResult<String> {
        Ok(encode_public_key_pem(&self.provider.export_verifying_spki(key)?))
    }

    /// Import an ECDSA P-256 signing public key.
    pub fn import_signing_key_pem(&self, pem: &str) -> CryptoResult<VerifyingKeyHandle> {
        let der = decode_public_key_pem(pem)?;
        self.provider.import_verifying_spki(&der)
    }

    /// Build the exportable public bundle of an identity.
    pub fn export_bundle(&self, record: &KeyPairRecord) -> PublicKeyBundle {
        PublicKeyBundle::new(
            record.algorithm,
            record.public_pem.clone(),
            record.signing.as_ref().map(|s| s.public_pem.clone()),
        )
    }

    /// Parse a bundle into a contact record.
    pub fn import_bundle(&self, json: &str, label: &str, source: &str) -> CryptoResult<ContactRecord> {
        let bundle = PublicKeyBundle::from_json(json)?;

        let public_key = match bundle.alg {
            Some(algorithm) => self.import_public_key_pem_as(&bundle.encrypt, algorithm)?,
            None => self.import_public_key_pem(&bundle.encrypt)?,
        };
        let spki = self.provider.export_public_spki(&public_key)?;

        let signing = match &bundle.sign {
            Some(pem) => {
                let verifying = self.import_signing_key_pem(pem)?;
                let signing_spki = self.provider.export_verifying_spki(&verifying)?;
                Some(ContactSigningKey {
                    public_key: verifying,
                    fingerprint: fingerprint_spki(&signing_spki),
                    public_pem: encode_public_key_pem(&signing_spki),
                })
            }
            None => None,
        };

        Ok(ContactRecord {
            id: None,
            label: label.to_string(),
            algorithm: public_key.algorithm(),
            key_size: public_key.key_size(),
            fingerprint: fingerprint_spki(&spki),
            public_pem: encode_public_key_pem(&spki),
            public_key,
            signing,
            imported_at: Utc::now(),
            source: source.to_string(),
        })
    }

    /// Seal an identity for persistence.
    pub fn seal(&self, record: &KeyPairRecord, sealing_key: &SealingKey) -> CryptoResult<StoredKeyPair> {
        let sealed_private_key = seal_private_key(&record.private_key, sealing_key)?;
        let sealed_signing_key = record
            .signing
            .as_ref()
            .map(|s| seal_signing_key(&s.private_key, sealing_key))
            .transpose()?;

        Ok(StoredKeyPair {
            id: record.id,
            label: record.label.clone(),
            created_at: record.created_at,
            algorithm: record.algorithm,
            key_size: record.key_size,
            fingerprint: record.fingerprint.clone(),
            public_pem: record.public_pem.clone(),
            sealed_private_key,
            signing_fingerprint: record.signing.as_ref().map(|s| s.fingerprint.clone()),
            signing_public_pem: record.signing.as_ref().map(|s| s.public_pem.clone()),
            sealed_signing_key,
        })
    }

    /// Open a sealed identity.
    ///
    /// The unsealed keys must match the stored fingerprints.
    pub fn open(&self, stored: &StoredKeyPair, sealing_key: &SealingKey) -> CryptoResult<KeyPairRecord> {
        let private_key = open_private_key(&stored.sealed_private_key, sealing_key)?;
        let public_key = private_key.public_key();
        let fingerprint = self.fingerprint(&public_key)?;
        if fingerprint != stored.fingerprint {
            return Err(CryptoError::InvalidSealedKey(format!(
                "Sealed key fingerprint {} does not match record {}",
                fingerprint, stored.fingerprint
            )));
        }

        let signing = match &stored.sealed_signing_key {
            Some(sealed) => {
                let private_key = open_signing_key(sealed, sealing_key)?;
                let public_key = private_key.verifying_key();
                let spki = self.provider.export_verifying_spki(&public_key)?;
                let signing_fingerprint = fingerprint_spki(&spki);
                if stored.signing_fingerprint.as_deref() != Some(signing_fingerprint.as_str()) {
                    return Err(CryptoError::InvalidSealedKey(
                        "Sealed signing key does not match record".into(),
                    ));
                }
                Some(SigningKeyPair {
                    public_key,
                    private_key,
                    fingerprint: signing_fingerprint,
                    public_pem: encode_public_key_pem(&spki),
                })
            }
            None => None,
        };

        Ok(KeyPairRecord {
            id: stored.id,
            label: stored.label.clone(),
            created_at: stored.created_at,
            algorithm: public_key.algorithm(),
            key_size: public_key.key_size(),
            public_pem: self.export_public_key_pem(&public_key)?,
            public_key,
            private_key,
            fingerprint,
            signing,
        })
    }

    /// Persistable form of a contact.
    pub fn store_contact(&self, contact: &ContactRecord) -> StoredContact {
        StoredContact {
            id: contact.id,
            label: contact.label.clone(),
            algorithm: contact.algorithm,
            key_size: contact.key_size,
            fingerprint: contact.fingerprint.clone(),
            public_pem: contact.public_pem.clone(),
            signing_fingerprint: contact.signing.as_ref().map(|s| s.fingerprint.clone()),
            signing_public_pem: contact.signing.as_ref().map(|s| s.public_pem.clone()),
            imported_at: contact.imported_at,
            source: contact.source.clone(),
        }
    }

    /// Rebuild a contact from its persisted form.
    pub fn load_contact(&self, stored: &StoredContact) -> CryptoResult<ContactRecord> {
        let public_key = self.import_public_key_pem_as(&stored.public_pem, stored.algorithm)?;
        let signing = match &stored.signing_public_pem {
            Some(pem) => {
                let verifying = self.import_signing_key_pem(pem)?;
                Some(ContactSigningKey {
                    fingerprint: self.signing_fingerprint(&verifying)?,
                    public_key: verifying,
                    public_pem: pem.clone(),
                })
            }
            None => None,
        };

        Ok(ContactRecord {
            id: stored.id,
            label: stored.label.clone(),
            algorithm: stored.algorithm,
            key_size: public_key.key_size(),
            fingerprint: self.fingerprint(&public_key)?,
            public_pem: stored.public_pem.clone(),
            public_key,
            signing,
            imported_at: stored.imported_at,
            source: stored.source.clone(),
        })
    }
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("provider", &self.provider.name())
            .field("rsa_modulus_bits", &self.rsa_modulus_bits)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::SoftwareProvider;

    fn manager() -> KeyManager {
        KeyManager::new(SoftwareProvider::shared())
    }

    #[test]
    fn test_generate_ecdh_has_no_signing_pair() {
        let record = manager().generate("ecdh", EncryptionAlgorithm::Ecdh).unwrap();
        assert_eq!(record.algorithm, EncryptionAlgorithm::Ecdh);
        assert_eq!(record.key_size, 256);
        assert!(record.signing.is_none());
        assert!(record.fingerprint.starts_with("sha256:"));
        assert!(record.public_pem.starts_with("-----BEGIN PUBLIC KEY-----"));
    }

    #[test]
    fn test_fingerprint_stable_across_pem_roundtrip() {
        let km = manager();
        let record = km.generate("ecdh", EncryptionAlgorithm::Ecdh).unwrap();

        let imported = km.import_public_key_pem(&record.public_pem).unwrap();
        assert_eq!(imported.algorithm(), EncryptionAlgorithm::Ecdh);
        assert_eq!(km.fingerprint(&imported).unwrap(), record.fingerprint);
        assert_eq!(km.export_public_key_pem(&imported).unwrap(), record.public_pem);
    }

    #[test]
    fn test_import_malformed_pem() {
        let km = manager();
        let garbage = "-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----";
        assert!(matches!(
            km.import_public_key_pem(garbage),
            Err(CryptoError::MalformedKey(_))
        ));
        assert!(matches!(
            km.import_public_key_pem("not a pem"),
            Err(CryptoError::MalformedKey(_))
        ));
    }

    #[test]
    fn test_seal_open_ecdh_identity() {
        let km = manager();
        let record = km.generate("ecdh", EncryptionAlgorithm::Ecdh).unwrap();
        let sealing = SealingKey::generate();

        let stored = km.seal(&record, &sealing).unwrap();
        assert!(stored.sealed_signing_key.is_none());

        let opened = km.open(&stored, &sealing).unwrap();
        assert_eq!(opened.fingerprint, record.fingerprint);
        assert_eq!(opened.public_key, record.public_key);
    }

    #[test]
    fn test_open_detects_swapped_blob() {
        let km = manager();
        let a = km.generate("a", EncryptionAlgorithm::Ecdh).unwrap();
        let b = km.generate("b", EncryptionAlgorithm::Ecdh).unwrap();
        let sealing = SealingKey::generate();

        let mut stored = km.seal(&a, &sealing).unwrap();
        stored.sealed_private_key = km.seal(&b, &sealing).unwrap().sealed_private_key;

        assert!(matches!(
            km.open(&stored, &sealing),
            Err(CryptoError::InvalidSealedKey(_))
        ));
    }

    #[test]
    fn test_ecdh_bundle_roundtrip() {
        let km = manager();
        let record = km.generate("ecdh", EncryptionAlgorithm::Ecdh).unwrap();
        let json = km.export_bundle(&record).to_json().unwrap();

        let contact = km.import_bundle(&json, "peer", "file").unwrap();
        assert_eq!(contact.algorithm, EncryptionAlgorithm::Ecdh);
        assert_eq!(contact.fingerprint, record.fingerprint);
        assert!(contact.signing.is_none());
        assert_eq!(contact.source, "file");
    }

    #[test]
    fn test_store_load_contact() {
        let km = manager();
        let record = km.generate("ecdh", EncryptionAlgorithm::Ecdh).unwrap();
        let json = km.export_bundle(&record).to_legacy_json().unwrap();
        let contact = km.import_bundle(&json, "peer", "paste").unwrap();

        let stored = km.store_contact(&contact);
        let loaded = km.load_contact(&stored).unwrap();
        assert_eq!(loaded.fingerprint, contact.fingerprint);
        assert_eq!(loaded.public_key, contact.public_key);
    }
}
