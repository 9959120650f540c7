//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed (wrong key, tampered token, truncated input)
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Invalid key length
    #[error("Invalid key length: expected 16 or 32, got {actual}")]
    InvalidKeyLength {
        /// Actual key length in bytes
        actual: usize,
    },

    /// Empty HMAC key or shared secret
    #[error("Empty key material: {0}")]
    EmptyKey(&'static str),

    /// Input was not valid base64 or hex
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),
}

/// Reasons an authentication envelope is refused.
///
/// These are logged by the gate at debug level and never reported to the
/// caller; every variant looks the same from the outside.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// One of the four envelope headers is absent
    #[error("missing header: {0}")]
    MissingHeader(&'static str),

    /// Timestamp header is not a decimal unix time
    #[error("malformed timestamp: {0}")]
    MalformedTimestamp(String),

    /// Timestamp is older than the replay window
    #[error("timestamp expired: {timestamp} is {age}s old (max {max_age}s)")]
    Expired {
        /// Presented timestamp
        timestamp: u64,
        /// Age in seconds at verification time
        age: u64,
        /// Configured replay window
        max_age: u64,
    },

    /// Timestamp is ahead of the verifier's clock
    #[error("timestamp {timestamp} is in the future (now {now})")]
    FutureTimestamp {
        /// Presented timestamp
        timestamp: u64,
        /// Verifier's clock
        now: u64,
    },

    /// HMAC over `timestamp:nonce:token` did not match
    #[error("signature mismatch")]
    SignatureMismatch,

    /// Token could not be decrypted with the configured key
    #[error("token decryption failed")]
    Decryption,

    /// Token decrypted to something other than the shared secret
    #[error("shared secret mismatch")]
    SecretMismatch,
}
