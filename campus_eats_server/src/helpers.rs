use ce_common::Secret;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 of the raw request body, hex-encoded, as Chapa computes it for the
/// `Chapa-Signature` header.
pub fn calculate_hmac(key: &Secret<String>, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(key.reveal().as_bytes()).expect("HMAC accepts keys of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time-ish comparison of the supplied signature against the expected one. Signatures
/// are hex, so compare case-insensitively.
pub fn signature_matches(key: &Secret<String>, body: &[u8], supplied: &str) -> bool {
    let expected = calculate_hmac(key, body);
    if expected.len() != supplied.len() {
        return false;
    }
    expected
        .bytes()
        .zip(supplied.to_ascii_lowercase().bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
