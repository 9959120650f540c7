//! # Authentication Envelope
//!
//! Every request carries four headers:
//!
//! | Header      | Content                                                 |
//! |-------------|---------------------------------------------------------|
//! | `Auth`      | shared secret sealed with AES-GCM, base64               |
//! | `Timestamp` | unix seconds, decimal                                   |
//! | `Nonce`     | opaque string (UUIDv4 from [`EnvelopeSigner`])          |
//! | `Signature` | hex HMAC-SHA256 over `timestamp:nonce:Auth`             |
//!
//! ## Verification Order
//!
//! 1. Replay window: reject future timestamps and anything older than `max_age`
//! 2. Signature: recompute and compare in constant time
//! 3. Token: only now decrypt `Auth` and compare with the shared secret
//!
//! Nonces are not tracked beyond the time window.

use crate::errors::{AuthError, CryptoError};
use crate::signature::{sign, verify_signature};
use crate::symmetric::{decrypt_token, encrypt_token, AesKey};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;
use uuid::Uuid;
use zeroize::Zeroizing;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Header carrying the sealed shared secret.
pub const HEADER_AUTH: &str = "Auth";
/// Header carrying the unix timestamp.
pub const HEADER_TIMESTAMP: &str = "Timestamp";
/// Header carrying the request nonce.
pub const HEADER_NONCE: &str = "Nonce";
/// Header carrying the hex signature.
pub const HEADER_SIGNATURE: &str = "Signature";

/// Default replay window (seconds).
pub const DEFAULT_MAX_AGE: u64 = 300;

/// Current unix time in seconds.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// =============================================================================
// ENVELOPE
// =============================================================================

/// The four-header proof attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEnvelope {
    /// Shared secret sealed under the static AES key
    pub cipher_token: String,
    /// Unix seconds at sealing time
    pub timestamp: u64,
    /// Opaque per-request value
    pub nonce: String,
    /// Hex HMAC over `timestamp:nonce:cipher_token`
    pub signature: String,
}

impl AuthEnvelope {
    /// Header name/value pairs in wire order.
    pub fn headers(&self) -> [(&'static str, String); 4] {
        [
            (HEADER_AUTH, self.cipher_token.clone()),
            (HEADER_TIMESTAMP, self.timestamp.to_string()),
            (HEADER_NONCE, self.nonce.clone()),
            (HEADER_SIGNATURE, self.signature.clone()),
        ]
    }

    /// Read an envelope through a header lookup.
    ///
    /// The lookup is a closure so this crate stays independent of any HTTP
    /// type; the server passes `|name| headers.get(name)?.to_str().ok()`.
    pub fn from_headers<'a, F>(lookup: F) -> Result<Self, AuthError>
    where
        F: Fn(&'static str) -> Option<&'a str>,
    {
        let cipher_token = lookup(HEADER_AUTH).ok_or(AuthError::MissingHeader(HEADER_AUTH))?;
        let timestamp = lookup(HEADER_TIMESTAMP).ok_or(AuthError::MissingHeader(HEADER_TIMESTAMP))?;
        let nonce = lookup(HEADER_NONCE).ok_or(AuthError::MissingHeader(HEADER_NONCE))?;
        let signature = lookup(HEADER_SIGNATURE).ok_or(AuthError::MissingHeader(HEADER_SIGNATURE))?;

        let timestamp = timestamp
            .trim()
            .parse::<u64>()
            .map_err(|_| AuthError::MalformedTimestamp(timestamp.to_string()))?;

        Ok(Self {
            cipher_token: cipher_token.to_string(),
            timestamp,
            nonce: nonce.to_string(),
            signature: signature.to_string(),
        })
    }
}

/// Check the replay window.
pub fn check_window(timestamp: u64, now: u64, max_age: u64) -> Result<(), AuthError> {
    if timestamp > now {
        return Err(AuthError::FutureTimestamp { timestamp, now });
    }
    let age = now - timestamp;
    if age > max_age {
        return Err(AuthError::Expired {
            timestamp,
            age,
            max_age,
        });
    }
    Ok(())
}

/// Window and signature check (steps 1 and 2).
///
/// Does not touch the cipher token's contents.
pub fn verify(
    timestamp: u64,
    nonce: &str,
    signature: &str,
    cipher_token: &str,
    hmac_key: &[u8],
    max_age: u64,
    now: u64,
) -> bool {
    check_window(timestamp, now, max_age).is_ok()
        && verify_signature(timestamp, nonce, cipher_token, signature, hmac_key)
}

/// Seal `secret` into a cipher token.
pub fn encrypt(secret: &[u8], aes_key: &AesKey) -> Result<String, CryptoError> {
    encrypt_token(aes_key, secret)
}

/// Open a cipher token.
pub fn decrypt(cipher_token: &str, aes_key: &AesKey) -> Result<Vec<u8>, CryptoError> {
    decrypt_token(aes_key, cipher_token)
}

// =============================================================================
// KEY MATERIAL
// =============================================================================

/// Explicit key material for one envelope configuration.
///
/// Several configurations can coexist in one process; nothing here is global.
#[derive(Clone)]
pub struct EnvelopeKeys {
    aes_key: AesKey,
    hmac_key: Zeroizing<Vec<u8>>,
    shared_secret: Zeroizing<Vec<u8>>,
    max_age: u64,
}

impl EnvelopeKeys {
    /// Build key material, validating lengths.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidKeyLength` if `aes_key` is not 16 or 32 bytes
    /// - `CryptoError::EmptyKey` if the HMAC key or shared secret is empty
    pub fn new(aes_key: &[u8], hmac_key: &[u8], shared_secret: &[u8]) -> Result<Self, CryptoError> {
        let aes_key = AesKey::from_slice(aes_key)?;
        if hmac_key.is_empty() {
            return Err(CryptoError::EmptyKey("hmac_key"));
        }
        if shared_secret.is_empty() {
            return Err(CryptoError::EmptyKey("shared_secret"));
        }
        Ok(Self {
            aes_key,
            hmac_key: Zeroizing::new(hmac_key.to_vec()),
            shared_secret: Zeroizing::new(shared_secret.to_vec()),
            max_age: DEFAULT_MAX_AGE,
        })
    }

    /// Override the replay window.
    pub fn with_max_age(mut self, max_age: u64) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn max_age(&self) -> u64 {
        self.max_age
    }
}

impl std::fmt::Debug for EnvelopeKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeKeys")
            .field("aes_key", &self.aes_key)
            .field("hmac_key", &"<redacted>")
            .field("shared_secret", &"<redacted>")
            .field("max_age", &self.max_age)
            .finish()
    }
}

// =============================================================================
// SIGNER / VERIFIER
// =============================================================================

/// Client side: seals a fresh envelope per request.
#[derive(Debug, Clone)]
pub struct EnvelopeSigner {
    keys: Arc<EnvelopeKeys>,
}

impl EnvelopeSigner {
    pub fn new(keys: EnvelopeKeys) -> Self {
        Self {
            keys: Arc::new(keys),
        }
    }

    /// Seal with the current time and a random UUIDv4 nonce.
    pub fn seal(&self) -> Result<AuthEnvelope, CryptoError> {
        self.seal_at(current_timestamp(), &Uuid::new_v4().to_string())
    }

    /// Seal with an explicit timestamp and nonce.
    pub fn seal_at(&self, timestamp: u64, nonce: &str) -> Result<AuthEnvelope, CryptoError> {
        let cipher_token = encrypt(&self.keys.shared_secret, &self.keys.aes_key)?;
        let signature = sign(timestamp, nonce, &cipher_token, &self.keys.hmac_key);
        Ok(AuthEnvelope {
            cipher_token,
            timestamp,
            nonce: nonce.to_string(),
            signature,
        })
    }
}

/// Server side: runs the ordered checks.
#[derive(Debug, Clone)]
pub struct EnvelopeVerifier {
    keys: Arc<EnvelopeKeys>,
}

impl EnvelopeVerifier {
    pub fn new(keys: EnvelopeKeys) -> Self {
        Self {
            keys: Arc::new(keys),
        }
    }

    /// Verify an envelope against `now`.
    pub fn verify(&self, envelope: &AuthEnvelope, now: u64) -> Result<(), AuthError> {
        check_window(envelope.timestamp, now, self.keys.max_age)?;

        if !verify_signature(
            envelope.timestamp,
            &envelope.nonce,
            &envelope.cipher_token,
            &envelope.signature,
            &self.keys.hmac_key,
        ) {
            return Err(AuthError::SignatureMismatch);
        }

        let plaintext = Zeroizing::new(
            decrypt(&envelope.cipher_token, &self.keys.aes_key).map_err(|_| AuthError::Decryption)?,
        );
        if bool::from(plaintext.as_slice().ct_eq(self.keys.shared_secret.as_slice())) {
            Ok(())
        } else {
            Err(AuthError::SecretMismatch)
        }
    }

    /// Parse and verify straight from request headers.
    pub fn verify_headers<'a, F>(&self, lookup: F) -> Result<(), AuthError>
    where
        F: Fn(&'static str) -> Option<&'a str>,
    {
        let envelope = AuthEnvelope::from_headers(lookup)?;
        self.verify(&envelope, current_timestamp())
    }
}
