//! # Request Signatures
//!
//! HMAC-SHA256 over `"{timestamp}:{nonce}:{cipher_token}"`, hex encoded.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Build the signed message for an envelope.
fn signing_input(timestamp: u64, nonce: &str, cipher_token: &str) -> String {
    format!("{timestamp}:{nonce}:{cipher_token}")
}

/// Sign an envelope, returning lowercase hex.
pub fn sign(timestamp: u64, nonce: &str, cipher_token: &str, hmac_key: &[u8]) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(hmac_key) {
        Ok(m) => m,
        Err(_) => return String::new(),
    };
    mac.update(signing_input(timestamp, nonce, cipher_token).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Check a hex signature in constant time.
///
/// Malformed hex and wrong-length signatures fail like any other mismatch.
pub fn verify_signature(
    timestamp: u64,
    nonce: &str,
    cipher_token: &str,
    signature_hex: &str,
    hmac_key: &[u8],
) -> bool {
    let Ok(signature) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(hmac_key) else {
        return false;
    };
    mac.update(signing_input(timestamp, nonce, cipher_token).as_bytes());
    mac.verify_slice(&signature).is_ok()
}
