//! # Symmetric Token Encryption
//!
//! AES-GCM under a static key. Every call draws a fresh 96-bit nonce which
//! is prepended to the ciphertext; the pair travels as standard base64.
//!
//! ```text
//! base64( nonce[12] || ciphertext || tag[16] )
//! ```

use crate::CryptoError;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes128Gcm, Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES-GCM nonce size (96 bits).
pub const NONCE_LEN: usize = 12;

/// AES key (128- or 256-bit), wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AesKey(Vec<u8>);

impl AesKey {
    /// Create from raw bytes. Accepts 16 (AES-128) or 32 (AES-256) bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        match bytes.len() {
            16 | 32 => Ok(Self(bytes.to_vec())),
            actual => Err(CryptoError::InvalidKeyLength { actual }),
        }
    }

    /// Generate a random 256-bit key.
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Get inner bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for AesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AesKey(<{} bytes>)", self.0.len())
    }
}

/// Encrypt `plaintext` into a header-safe cipher token.
///
/// # Errors
///
/// Returns `CryptoError::EncryptionFailed` if the AEAD rejects the input.
pub fn encrypt_token(key: &AesKey, plaintext: &[u8]) -> Result<String, CryptoError> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = match key.as_bytes().len() {
        16 => Aes128Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?
            .encrypt(nonce, plaintext),
        _ => Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?
            .encrypt(nonce, plaintext),
    }
    .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(sealed))
}

/// Decrypt a cipher token produced by [`encrypt_token`].
///
/// # Errors
///
/// - `CryptoError::InvalidEncoding` if the token is not base64
/// - `CryptoError::DecryptionFailed` if it is too short, tampered with, or
///   sealed under another key
pub fn decrypt_token(key: &AesKey, token: &str) -> Result<Vec<u8>, CryptoError> {
    let sealed = BASE64
        .decode(token.trim())
        .map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;

    if sealed.len() < NONCE_LEN {
        return Err(CryptoError::DecryptionFailed(format!(
            "token too short: {} bytes",
            sealed.len()
        )));
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    match key.as_bytes().len() {
        16 => Aes128Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?
            .decrypt(nonce, ciphertext),
        _ => Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?
            .decrypt(nonce, ciphertext),
    }
    .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = AesKey::generate();
        let token = encrypt_token(&key, b"meiyoumima").unwrap();
        assert_eq!(decrypt_token(&key, &token).unwrap(), b"meiyoumima");
    }

    #[test]
    fn test_aes128_roundtrip() {
        let key = AesKey::from_slice(&[7u8; 16]).unwrap();
        let token = encrypt_token(&key, b"secret").unwrap();
        assert_eq!(decrypt_token(&key, &token).unwrap(), b"secret");
    }

    #[test]
    fn test_invalid_key_length() {
        assert_eq!(
            AesKey::from_slice(&[0u8; 20]).unwrap_err(),
            CryptoError::InvalidKeyLength { actual: 20 }
        );
    }

    #[test]
    fn test_wrong_key_fails() {
        let token = encrypt_token(&AesKey::generate(), b"secret").unwrap();
        assert!(matches!(
            decrypt_token(&AesKey::generate(), &token),
            Err(CryptoError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_tampered_token_fails() {
        let key = AesKey::generate();
        let token = encrypt_token(&key, b"secret").unwrap();
        let mut raw = BASE64.decode(&token).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        assert!(decrypt_token(&key, &BASE64.encode(raw)).is_err());
    }

    #[test]
    fn test_garbage_tokens_rejected() {
        let key = AesKey::generate();
        assert!(matches!(
            decrypt_token(&key, "not base64 !!"),
            Err(CryptoError::InvalidEncoding(_))
        ));
        assert!(matches!(
            decrypt_token(&key, &BASE64.encode([1u8; 5])),
            Err(CryptoError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let key = AesKey::generate();
        let a = encrypt_token(&key, b"same").unwrap();
        let b = encrypt_token(&key, b"same").unwrap();
        assert_ne!(a, b);
    }
}
