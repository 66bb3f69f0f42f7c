//! # Confidentiality Unit
//!
//! Opens AES-256-GCM payloads with the source's AEAD key. The associated
//! data binds the ciphertext to its source and nonce, so a payload lifted
//! from one message cannot be replanted into another.
//!
//! Plaintext is a JSON object `{"value": <number>, "unit": <string|null>}`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use shared_crypto::{open, seal, AeadKey, CryptoError, Iv};
use shared_types::{EncryptedPayload, SealedReading, SourceKeys};
use uuid::Uuid;

use super::errors::ValidationError;

/// Associated data for a payload: `source_id || 0x00 || nonce`.
pub fn associated_data(source_id: &str, nonce: &Uuid) -> Vec<u8> {
    let nonce = nonce.hyphenated().to_string();
    let mut aad = Vec::with_capacity(source_id.len() + 1 + nonce.len());
    aad.extend_from_slice(source_id.as_bytes());
    aad.push(0);
    aad.extend_from_slice(nonce.as_bytes());
    aad
}

/// Open an encrypted reading.
///
/// # Errors
///
/// `DecryptionFailed` when the source has no AEAD key, the IV has the wrong
/// length, authentication fails or the plaintext is not a finite reading.
pub fn open_reading(
    keys: Option<&SourceKeys>,
    source_id: &str,
    nonce: &Uuid,
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<SealedReading, ValidationError> {
    let key = keys
        .and_then(|k| k.aead_key.as_ref())
        .ok_or_else(|| failed(format!("no AEAD key bound to source {source_id}")))?;
    let iv = Iv::from_slice(iv).map_err(|e| failed(e.to_string()))?;

    let plaintext = open(key, &iv, ciphertext, &associated_data(source_id, nonce))
        .map_err(|e| failed(e.to_string()))?;

    let reading: SealedReading = serde_json::from_slice(&plaintext)
        .map_err(|e| failed(format!("plaintext is not a reading: {e}")))?;
    if !reading.value.is_finite() {
        return Err(failed("plaintext value is not finite"));
    }
    Ok(reading)
}

/// Encrypt a reading for the wire.
///
/// # Errors
///
/// Returns `CryptoError` if encryption or plaintext encoding fails.
pub fn seal_reading(
    key: &AeadKey,
    source_id: &str,
    nonce: &Uuid,
    reading: &SealedReading,
) -> Result<EncryptedPayload, CryptoError> {
    let plaintext =
        serde_json::to_vec(reading).map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
    let (ciphertext, iv) = seal(key, &plaintext, &associated_data(source_id, nonce))?;
    Ok(EncryptedPayload {
        iv: BASE64.encode(iv.as_bytes()),
        ciphertext: BASE64.encode(ciphertext),
    })
}

fn failed(detail: impl Into<String>) -> ValidationError {
    ValidationError::DecryptionFailed(detail.into())
}
