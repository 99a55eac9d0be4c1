//! Point-to-point message envelope.
//!
//! ```json
//! {"v":2,"w":"<b64 wrapped key>","i":"<b64 iv>","c":"<b64 ciphertext>","s":"<b64 sig>","f":"sha256:..."}
//! ```
//!
//! The JSON is base64-encoded once more for transport. `s` is an ECDSA
//! P-256/SHA-256 signature in raw `r || s` form over the ciphertext bytes
//! (`c` after base64 decoding), and `f` is the signer's signing-key
//! fingerprint. Version 1 envelopes predate signing and never carry
//! `s`/`f`; version 2 envelopes carry both or neither.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cipher::IV_LEN;
use crate::error::{CryptoError, CryptoResult};
use crate::format::{base64_decode, base64_encode};
use crate::hybrid::{HybridCipher, HybridCiphertext};
use crate::keys::handles::{PrivateKeyHandle, PublicKeyHandle, VerifyingKeyHandle};
use crate::keys::record::{ContactRecord, KeyPairRecord, SigningKeyPair};
use crate::provider::CryptoProvider;

/// Legacy, unsigned envelope version.
pub const ENVELOPE_V1: u64 = 1;

/// Current envelope version.
pub const ENVELOPE_V2: u64 = 2;

/// Wire form of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub v: u64,
    /// Wrapped symmetric key (base64).
    pub w: String,
    /// IV (base64).
    pub i: String,
    /// Ciphertext (base64).
    pub c: String,
    /// Signature over the ciphertext bytes (base64).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<String>,
    /// Signer fingerprint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub f: Option<String>,
}

#[derive(Deserialize)]
struct VersionHeader {
    v: u64,
}

impl MessageEnvelope {
    /// Serialize to the opaque transport string.
    pub fn to_transport(&self) -> CryptoResult<String> {
        Ok(base64_encode(&serde_json::to_vec(self)?))
    }

    /// Parse a transport string.
    ///
    /// Bad base64, bad JSON and a half-present signature are
    /// [`CryptoError::MalformedEnvelope`]; a version other than 1 or 2 is
    /// [`CryptoError::UnsupportedVersion`].
    pub fn from_transport(transport: &str) -> CryptoResult<Self> {
        let json = base64_decode(transport.trim())?;

        let header: VersionHeader = serde_json::from_slice(&json)
            .map_err(|e| CryptoError::MalformedEnvelope(format!("Invalid envelope JSON: {}", e)))?;
        if header.v != ENVELOPE_V1 && header.v != ENVELOPE_V2 {
            return Err(CryptoError::UnsupportedVersion(header.v));
        }

        let envelope: Self = serde_json::from_slice(&json)
            .map_err(|e| CryptoError::MalformedEnvelope(format!("Invalid envelope JSON: {}", e)))?;
        if envelope.s.is_some() != envelope.f.is_some() {
            return Err(CryptoError::MalformedEnvelope(
                "Signature and signer fingerprint must appear together".into(),
            ));
        }
        Ok(envelope)
    }

    /// Whether the envelope carries a signature.
    pub fn is_signed(&self) -> bool {
        self.s.is_some() && self.f.is_some()
    }

    fn ciphertext(&self) -> CryptoResult<HybridCiphertext> {
        let iv_bytes = base64_decode(&self.i)?;
        let iv: [u8; IV_LEN] = iv_bytes.as_slice().try_into().map_err(|_| {
            CryptoError::MalformedEnvelope(format!("IV must be {} bytes", IV_LEN))
        })?;
        Ok(HybridCiphertext {
            wrapped_key: base64_decode(&self.w)?,
            iv,
            ciphertext: base64_decode(&self.c)?,
        })
    }
}

/// A signer known to the decoding side.
#[derive(Debug, Clone, Copy)]
pub struct KnownSigner<'a> {
    pub label: &'a str,
    pub key: &'a VerifyingKeyHandle,
}

/// Lookup of signing keys by fingerprint.
pub trait SignerDirectory {
    fn find_signer(&self, fingerprint: &str) -> Option<KnownSigner<'_>>;
}

impl SignerDirectory for [ContactRecord] {
    fn find_signer(&self, fingerprint: &str) -> Option<KnownSigner<'_>> {
        self.iter().find_map(|contact| {
            contact
                .signing
                .as_ref()
                .filter(|s| s.fingerprint == fingerprint)
                .map(|s| KnownSigner {
                    label: &contact.label,
                    key: &s.public_key,
                })
        })
    }
}

impl SignerDirectory for Vec<ContactRecord> {
    fn find_signer(&self, fingerprint: &str) -> Option<KnownSigner<'_>> {
        self.as_slice().find_signer(fingerprint)
    }
}

impl SignerDirectory for KeyPairRecord {
    fn find_signer(&self, fingerprint: &str) -> Option<KnownSigner<'_>> {
        self.signing
            .as_ref()
            .filter(|s| s.fingerprint == fingerprint)
            .map(|s| KnownSigner {
                label: &self.label,
                key: &s.public_key,
            })
    }
}

/// Several directories searched in order.
#[derive(Default)]
pub struct SignerSet<'a> {
    sources: Vec<&'a dyn SignerDirectory>,
}

impl<'a> SignerSet<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: &'a dyn SignerDirectory) -> Self {
        self.sources.push(source);
        self
    }
}

impl SignerDirectory for SignerSet<'_> {
    fn find_signer(&self, fingerprint: &str) -> Option<KnownSigner<'_>> {
        self.sources.iter().find_map(|s| s.find_signer(fingerprint))
    }
}

/// Outcome of signature checking on a decrypted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureStatus {
    /// Known signer, valid signature.
    Verified { fingerprint: String, signer: String },
    /// Known signer, signature does not verify. Possible tampering or
    /// forgery; the plaintext decrypted anyway.
    Invalid { fingerprint: String, signer: String },
    /// Signer fingerprint is not in the directory.
    UnknownSigner { fingerprint: String },
    /// No signature present.
    Unsigned,
}

impl SignatureStatus {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified { .. })
    }

    /// Turn anything but [`SignatureStatus::Verified`] into an error.
    pub fn require_verified(&self) -> CryptoResult<()> {
        match self {
            Self::Verified { .. } => Ok(()),
            Self::Invalid { fingerprint, .. } => {
                Err(CryptoError::SignatureInvalid(fingerprint.clone()))
            }
            Self::UnknownSigner { fingerprint } => {
                Err(CryptoError::SignerUnknown(fingerprint.clone()))
            }
            Self::Unsigned => Err(CryptoError::SignatureInvalid("message is unsigned".into())),
        }
    }
}

/// A decrypted message and its signature status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    pub version: u64,
    pub plaintext: Vec<u8>,
    pub signature: SignatureStatus,
}

/// Builds and reads [`MessageEnvelope`]s.
#[derive(Clone)]
pub struct MessageCodec {
    provider: Arc<dyn CryptoProvider>,
    cipher: HybridCipher,
}

impl MessageCodec {
    pub fn new(provider: Arc<dyn CryptoProvider>) -> Self {
        Self {
            cipher: HybridCipher::new(provider.clone()),
            provider,
        }
    }

    /// Encrypt `plaintext` for `recipient`, signing the ciphertext when a
    /// signer is given. Always produces a version 2 envelope.
    pub fn seal(
        &self,
        recipient: &PublicKeyHandle,
        plaintext: &[u8],
        signer: Option<&SigningKeyPair>,
    ) -> CryptoResult<MessageEnvelope> {
        let sealed = self.cipher.encrypt(recipient, plaintext)?;

        let (s, f) = match signer {
            Some(pair) => {
                let signature = self.provider.sign(&pair.private_key, &sealed.ciphertext)?;
                (
                    Some(base64_encode(&signature)),
                    Some(pair.fingerprint.clone()),
                )
            }
            None => (None, None),
        };

        Ok(MessageEnvelope {
            v: ENVELOPE_V2,
            w: base64_encode(&sealed.wrapped_key),
            i: base64_encode(&sealed.iv),
            c: base64_encode(&sealed.ciphertext),
            s,
            f,
        })
    }

    /// [`seal`](Self::seal) straight to a transport string.
    pub fn encode(
        &self,
        recipient: &PublicKeyHandle,
        plaintext: &[u8],
        signer: Option<&SigningKeyPair>,
    ) -> CryptoResult<String> {
        self.seal(recipient, plaintext, signer)?.to_transport()
    }

    /// Decrypt an envelope and check its signature against `signers`.
    ///
    /// Signature problems are reported in [`DecodedMessage::signature`],
    /// not as errors.
    pub fn open(
        &self,
        envelope: &MessageEnvelope,
        private_key: &PrivateKeyHandle,
        signers: &dyn SignerDirectory,
    ) -> CryptoResult<DecodedMessage> {
        let sealed = envelope.ciphertext()?;
        let plaintext = self.cipher.decrypt(private_key, &sealed)?;

        let signature = match (&envelope.s, &envelope.f) {
            (Some(sig), Some(fingerprint)) => {
                self.check_signature(&sealed.ciphertext, sig, fingerprint, signers)?
            }
            _ => SignatureStatus::Unsigned,
        };

        Ok(DecodedMessage {
            version: envelope.v,
            plaintext,
            signature,
        })
    }

    /// Parse a transport string and [`open`](Self::open) it.
    pub fn decode(
        &self,
        transport: &str,
        private_key: &PrivateKeyHandle,
        signers: &dyn SignerDirectory,
    ) -> CryptoResult<DecodedMessage> {
        let envelope = MessageEnvelope::from_transport(transport)?;
        self.open(&envelope, private_key, signers)
    }

    fn check_signature(
        &self,
        ciphertext: &[u8],
        signature_b64: &str,
        fingerprint: &str,
        signers: &dyn SignerDirectory,
    ) -> CryptoResult<SignatureStatus> {
        let signature = base64_decode(signature_b64)?;

        let Some(signer) = signers.find_signer(fingerprint) else {
            debug!(fingerprint = %fingerprint, "Message signed by unknown signer");
            return Ok(SignatureStatus::UnknownSigner {
                fingerprint: fingerprint.to_string(),
            });
        };

        if self.provider.verify(signer.key, ciphertext, &signature) {
            Ok(SignatureStatus::Verified {
                fingerprint: fingerprint.to_string(),
                signer: signer.label.to_string(),
            })
        } else {
            warn!(fingerprint = %fingerprint, "Message signature failed verification");
            Ok(SignatureStatus::Invalid {
                fingerprint: fingerprint.to_string(),
                signer: signer.label.to_string(),
            })
        }
    }
}

impl std::fmt::Debug for MessageCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageCodec")
            .field("provider", &self.provider.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_json(json: &str) -> String {
        base64_encode(json.as_bytes())
    }

    #[test]
    fn test_transport_roundtrip_field_order() {
        let envelope = MessageEnvelope {
            v: 2,
            w: "dw==".into(),
            i: "aQ==".into(),
            c: "Yw==".into(),
            s: None,
            f: None,
        };
        let transport = envelope.to_transport().unwrap();
        let json = String::from_utf8(base64_decode(&transport).unwrap()).unwrap();
        assert_eq!(json, r#"{"v":2,"w":"dw==","i":"aQ==","c":"Yw=="}"#);
        assert_eq!(MessageEnvelope::from_transport(&transport).unwrap(), envelope);
    }

    #[test]
    fn test_unknown_version_rejected() {
        let transport = encode_json(r#"{"v":3,"w":"","i":"","c":""}"#);
        assert!(matches!(
            MessageEnvelope::from_transport(&transport),
            Err(CryptoError::UnsupportedVersion(3))
        ));
    }

    #[test]
    fn test_unknown_version_rejected_even_with_other_shape() {
        let transport = encode_json(r#"{"v":9,"payload":"x"}"#);
        assert!(matches!(
            MessageEnvelope::from_transport(&transport),
            Err(CryptoError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn test_bad_base64_is_malformed() {
        assert!(matches!(
            MessageEnvelope::from_transport("***"),
            Err(CryptoError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_bad_json_is_malformed() {
        assert!(matches!(
            MessageEnvelope::from_transport(&encode_json("{nope")),
            Err(CryptoError::MalformedEnvelope(_))
        ));
        assert!(matches!(
            MessageEnvelope::from_transport(&encode_json(r#"{"v":2}"#)),
            Err(CryptoError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_half_signature_is_malformed() {
        let transport = encode_json(r#"{"v":2,"w":"","i":"","c":"","s":"AA=="}"#);
        assert!(matches!(
            MessageEnvelope::from_transport(&transport),
            Err(CryptoError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_bad_iv_length_is_malformed() {
        let envelope = MessageEnvelope {
            v: 1,
            w: "AAAA".into(),
            i: "AAAA".into(),
            c: "AAAA".into(),
            s: None,
            f: None,
        };
        assert!(matches!(
            envelope.ciphertext(),
            Err(CryptoError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_require_verified() {
        let verified = SignatureStatus::Verified {
            fingerprint: "sha256:00".into(),
            signer: "bob".into(),
        };
        assert!(verified.require_verified().is_ok());
        assert!(matches!(
            SignatureStatus::UnknownSigner {
                fingerprint: "sha256:00".into()
            }
            .require_verified(),
            Err(CryptoError::SignerUnknown(_))
        ));
        assert!(SignatureStatus::Unsigned.require_verified().is_err());
    }

    #[test]
    fn test_empty_signer_set_finds_nothing() {
        let set = SignerSet::new();
        assert!(set.find_signer("sha256:0000000000000000").is_none());
        let contacts: Vec<ContactRecord> = Vec::new();
        assert!(contacts.find_signer("sha256:0000000000000000").is_none());
    }
}
