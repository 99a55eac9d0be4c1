//! Shared identities for integration tests.
//!
//! RSA-4096 generation takes seconds, so each identity is generated once
//! per test binary.

#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use sealbox_crypto::{
    CryptoProvider, EncryptionAlgorithm, KeyManager, KeyPairRecord, SoftwareProvider,
};

pub fn provider() -> Arc<dyn CryptoProvider> {
    SoftwareProvider::shared()
}

pub fn key_manager() -> KeyManager {
    KeyManager::new(provider())
}

fn identity(cell: &'static OnceLock<KeyPairRecord>, label: &str) -> &'static KeyPairRecord {
    cell.get_or_init(|| {
        key_manager()
            .generate(label, EncryptionAlgorithm::RsaOaep)
            .expect("RSA key generation")
    })
}

pub fn alice() -> &'static KeyPairRecord {
    static CELL: OnceLock<KeyPairRecord> = OnceLock::new();
    identity(&CELL, "alice")
}

pub fn bob() -> &'static KeyPairRecord {
    static CELL: OnceLock<KeyPairRecord> = OnceLock::new();
    identity(&CELL, "bob")
}

pub fn carol() -> &'static KeyPairRecord {
    static CELL: OnceLock<KeyPairRecord> = OnceLock::new();
    identity(&CELL, "carol")
}
