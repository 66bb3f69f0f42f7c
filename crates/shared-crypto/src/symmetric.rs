//! # Symmetric Encryption
//!
//! AES-256-GCM sealing for telemetry payloads.
//!
//! ## Security Properties
//!
//! - A fresh random 96-bit IV is drawn for every seal
//! - The 128-bit tag is appended to the ciphertext
//! - Associated data is authenticated but not encrypted

use crate::CryptoError;
use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use std::fmt;
use zeroize::Zeroize;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

/// GCM IV length in bytes.
pub const IV_LEN: usize = 12;

/// GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// AEAD key (256-bit).
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct AeadKey([u8; KEY_LEN]);

impl AeadKey {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, checking its length.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKeyLength` unless the slice is 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength {
                expected: KEY_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self(arr))
    }

    /// Parse a hex-encoded key (64 hex characters).
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKeyEncoding` for non-hex input and
    /// `CryptoError::InvalidKeyLength` for the wrong size.
    pub fn from_hex(hex_key: &str) -> Result<Self, CryptoError> {
        let mut raw = hex::decode(hex_key.trim())
            .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))?;
        let key = Self::from_slice(&raw);
        raw.zeroize();
        key
    }

    /// Generate random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// Get inner bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for AeadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AeadKey(<redacted>)")
    }
}

/// Initialization vector for AES-GCM.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Iv([u8; IV_LEN]);

impl Iv {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; IV_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, checking its length.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidNonceLength` unless the slice is 12 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; IV_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidNonceLength {
                expected: IV_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self(arr))
    }

    /// Generate a random IV.
    pub fn generate() -> Self {
        let mut bytes = [0u8; IV_LEN];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// Get inner bytes.
    pub fn as_bytes(&self) -> &[u8; IV_LEN] {
        &self.0
    }
}

/// Encrypt `plaintext` under `key` with a fresh random IV.
///
/// Returns (ciphertext || tag, iv).
///
/// # Errors
///
/// Returns `CryptoError::EncryptionFailed` if encryption fails.
pub fn seal(key: &AeadKey, plaintext: &[u8], aad: &[u8]) -> Result<(Vec<u8>, Iv), CryptoError> {
    let iv = Iv::generate();
    let ciphertext = seal_with_iv(key, &iv, plaintext, aad)?;
    Ok((ciphertext, iv))
}

/// Encrypt with a caller-supplied IV. The IV must never repeat under one key.
///
/// # Errors
///
/// Returns `CryptoError::EncryptionFailed` if encryption fails.
pub fn seal_with_iv(
    key: &AeadKey,
    iv: &Iv,
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    cipher
        .encrypt(
            Nonce::from_slice(iv.as_bytes()),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
}

/// Decrypt and authenticate `ciphertext` (with appended tag).
///
/// # Errors
///
/// Returns `CryptoError::DecryptionFailed` on a short input, wrong key,
/// wrong associated data or any tampering.
pub fn open(key: &AeadKey, iv: &Iv, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < TAG_LEN {
        return Err(CryptoError::DecryptionFailed(format!(
            "ciphertext shorter than tag ({} < {TAG_LEN})",
            ciphertext.len()
        )));
    }

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    cipher
        .decrypt(
            Nonce::from_slice(iv.as_bytes()),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}
