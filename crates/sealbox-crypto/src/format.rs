//! Shared encoding utilities: base64 and PEM framing.

use base64::Engine;

use crate::error::{CryptoError, CryptoResult};

/// PEM header for SPKI public keys.
pub const PEM_PUBLIC_KEY_HEADER: &str = "-----BEGIN PUBLIC KEY-----";

/// PEM footer for SPKI public keys.
pub const PEM_PUBLIC_KEY_FOOTER: &str = "-----END PUBLIC KEY-----";

/// Column width of the base64 body in PEM output.
pub const PEM_LINE_WIDTH: usize = 64;

/// Encode bytes as standard base64 (with padding).
pub fn base64_encode(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

/// Decode a standard base64 string.
///
/// Failures are reported as a malformed envelope, the context every
/// caller outside PEM parsing decodes in.
pub fn base64_decode(data: &str) -> CryptoResult<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| CryptoError::MalformedEnvelope(format!("Invalid base64: {}", e)))
}

/// Frame SPKI DER bytes as a `PUBLIC KEY` PEM block.
///
/// The body is wrapped at 64 columns and lines are joined with `\n`;
/// there is no trailing newline after the footer.
pub fn encode_public_key_pem(spki_der: &[u8]) -> String {
    let body = base64_encode(spki_der);
    let mut pem = String::with_capacity(body.len() + body.len() / PEM_LINE_WIDTH + 64);
    pem.push_str(PEM_PUBLIC_KEY_HEADER);
    for line in body.as_bytes().chunks(PEM_LINE_WIDTH) {
        pem.push('\n');
        pem.extend(line.iter().map(|&b| b as char));
    }
    pem.push('\n');
    pem.push_str(PEM_PUBLIC_KEY_FOOTER);
    pem
}

/// Extract SPKI DER bytes from a `PUBLIC KEY` PEM block.
///
/// Surrounding whitespace and CRLF line endings are tolerated.
pub fn decode_public_key_pem(pem: &str) -> CryptoResult<Vec<u8>> {
    let trimmed = pem.trim();
    let body = trimmed
        .strip_prefix(PEM_PUBLIC_KEY_HEADER)
        .and_then(|rest| rest.strip_suffix(PEM_PUBLIC_KEY_FOOTER))
        .ok_or_else(|| CryptoError::MalformedKey("Missing PUBLIC KEY PEM framing".into()))?;

    let cleaned: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return Err(CryptoError::MalformedKey("Empty PEM body".into()));
    }

    base64::engine::general_purpose::STANDARD
        .decode(&cleaned)
        .map_err(|e| CryptoError::MalformedKey(format!("Invalid base64 in PEM: {}", e)))
}
