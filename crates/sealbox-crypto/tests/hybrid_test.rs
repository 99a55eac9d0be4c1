//! Integration tests for hybrid encryption and the vault blob format.
//!
//! Covers:
//! - Round trips for assorted plaintexts
//! - Tamper detection on every field
//! - Wrong-key rejection
//! - Vault blob packing with real RSA-4096 wrapped keys

mod common;

use common::{alice, bob, provider};
use sealbox_crypto::{CryptoError, HybridCipher, HybridCiphertext, IV_LEN, TAG_LEN};

// ============================================================================
// Test Category 1: Round Trip
// ============================================================================

#[test]
fn test_roundtrip_various_plaintexts() {
    let cipher = HybridCipher::new(provider());
    let alice = alice();

    let large = vec![0x5Au8; 256 * 1024];
    let inputs: [&[u8]; 4] = [b"", b"x", b"hello world", &large];
    for plaintext in inputs {
        let sealed = cipher.encrypt(&alice.public_key, plaintext).unwrap();
        let opened = cipher.decrypt(&alice.private_key, &sealed).unwrap();
        assert_eq!(opened, plaintext);
    }
}

#[test]
fn test_fresh_key_and_iv_per_payload() {
    let cipher = HybridCipher::new(provider());
    let alice = alice();

    let a = cipher.encrypt(&alice.public_key, b"same").unwrap();
    let b = cipher.encrypt(&alice.public_key, b"same").unwrap();
    assert_ne!(a.iv, b.iv);
    assert_ne!(a.wrapped_key, b.wrapped_key);
    assert_ne!(a.ciphertext, b.ciphertext);
}

#[test]
fn test_wrapped_key_is_modulus_sized() {
    let cipher = HybridCipher::new(provider());
    let sealed = cipher.encrypt(&alice().public_key, b"data").unwrap();

    assert_eq!(sealed.wrapped_key.len(), 512);
    assert_eq!(sealed.ciphertext.len(), 4 + TAG_LEN);
}

// ============================================================================
// Test Category 2: Tamper Detection
// ============================================================================

#[test]
fn test_flipping_any_ciphertext_byte_fails() {
    let cipher = HybridCipher::new(provider());
    let alice = alice();
    let sealed = cipher.encrypt(&alice.public_key, b"eleven byte").unwrap();

    for idx in 0..sealed.ciphertext.len() {
        let mut tampered = sealed.clone();
        tampered.ciphertext[idx] ^= 0x01;
        assert!(
            matches!(
                cipher.decrypt(&alice.private_key, &tampered),
                Err(CryptoError::Decryption)
            ),
            "ciphertext byte {} flip was not detected",
            idx
        );
    }
}

#[test]
fn test_flipping_wrapped_key_bytes_fails() {
    let cipher = HybridCipher::new(provider());
    let alice = alice();
    let sealed = cipher.encrypt(&alice.public_key, b"eleven byte").unwrap();

    for idx in [0, 1, 100, 255, 256, 510, 511] {
        let mut tampered = sealed.clone();
        tampered.wrapped_key[idx] ^= 0x80;
        assert!(
            matches!(
                cipher.decrypt(&alice.private_key, &tampered),
                Err(CryptoError::Decryption)
            ),
            "wrapped key byte {} flip was not detected",
            idx
        );
    }
}

#[test]
fn test_flipping_iv_fails() {
    let cipher = HybridCipher::new(provider());
    let alice = alice();
    let sealed = cipher.encrypt(&alice.public_key, b"payload").unwrap();

    for idx in 0..IV_LEN {
        let mut tampered = sealed.clone();
        tampered.iv[idx] ^= 0x01;
        assert!(matches!(
            cipher.decrypt(&alice.private_key, &tampered),
            Err(CryptoError::Decryption)
        ));
    }
}

#[test]
fn test_wrong_private_key_fails() {
    let cipher = HybridCipher::new(provider());
    let sealed = cipher.encrypt(&alice().public_key, b"for alice").unwrap();

    assert!(matches!(
        cipher.decrypt(&bob().private_key, &sealed),
        Err(CryptoError::Decryption)
    ));
}

// ============================================================================
// Test Category 3: Vault Blob Format
// ============================================================================

#[test]
fn test_blob_layout_with_real_key() {
    let cipher = HybridCipher::new(provider());
    let alice = alice();

    let blob = cipher.seal_blob(&alice.public_key, b"notes.txt!!").unwrap();
    let packed = sealbox_crypto::base64_decode(&blob).unwrap();

    assert_eq!(&packed[..4], &512u32.to_be_bytes());
    assert_eq!(packed.len(), 4 + 512 + IV_LEN + 11 + TAG_LEN);
    assert_eq!(cipher.open_blob(&alice.private_key, &blob).unwrap(), b"notes.txt!!");
}

#[test]
fn test_tampered_blob_fails_decryption() {
    let cipher = HybridCipher::new(provider());
    let alice = alice();

    let sealed = cipher.encrypt(&alice.public_key, b"blob body").unwrap();
    let mut packed = sealed.pack();
    let last = packed.len() - 1;
    packed[last] ^= 0x01;

    let reparsed = HybridCiphertext::unpack(&packed).unwrap();
    assert!(matches!(
        cipher.decrypt(&alice.private_key, &reparsed),
        Err(CryptoError::Decryption)
    ));
}
