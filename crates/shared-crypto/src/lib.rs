//! # Shared Crypto - Request Authentication Envelope
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `symmetric` | AES-128/256-GCM | Sealing the shared secret into the `Auth` header |
//! | `signature` | HMAC-SHA256 | Binding timestamp, nonce and token together |
//! | `envelope` | — | Four-header envelope, signer and ordered verifier |
//!
//! ## Security Properties
//!
//! - **Fresh nonce per seal**: the same secret never produces the same token
//! - **Constant-time comparisons**: HMAC via `verify_slice`, secrets via `subtle`
//! - **Decrypt last**: the AEAD is only run on requests with a valid signature
//!   inside the replay window

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod envelope;
pub mod errors;
pub mod signature;
pub mod symmetric;

// Re-exports
pub use envelope::{
    check_window, current_timestamp, decrypt, encrypt, verify, AuthEnvelope, EnvelopeKeys,
    EnvelopeSigner, EnvelopeVerifier, DEFAULT_MAX_AGE, HEADER_AUTH, HEADER_NONCE,
    HEADER_SIGNATURE, HEADER_TIMESTAMP,
};
pub use errors::{AuthError, CryptoError};
pub use signature::{sign, verify_signature};
pub use symmetric::{decrypt_token, encrypt_token, AesKey};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
