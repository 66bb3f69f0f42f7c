//! # Signature Verifier
//!
//! Checks the HMAC-SHA256 tag over the canonical bytes with the key bound to
//! the claimed source. The key lookup comes first so an unknown source is
//! reported as such, never as a bad signature.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use edge_telemetry::{log_stage, metric_inc, SIGNATURE_FAILURES, SIGNATURE_VERIFICATIONS};
use shared_types::{verify_hmac, KeyProvider, SourceKeys, MAC_LEN};
use std::sync::Arc;

use super::canonical::CanonicalMessage;
use super::errors::ValidationError;

/// Verifies message signatures against a [`KeyProvider`].
pub struct SignatureVerifier<K: KeyProvider + ?Sized> {
    keys: Arc<K>,
}

impl<K: KeyProvider + ?Sized> SignatureVerifier<K> {
    /// Create a verifier over `keys`.
    pub fn new(keys: Arc<K>) -> Self {
        Self { keys }
    }

    /// Look up the keys for a source without checking a signature.
    ///
    /// # Errors
    ///
    /// `ValidationError::UnknownSource` if no key is bound.
    pub fn keys_for(&self, source_id: &str) -> Result<Arc<SourceKeys>, ValidationError> {
        self.keys
            .keys_for(source_id)
            .ok_or_else(|| ValidationError::UnknownSource(source_id.to_string()))
    }

    /// Verify `signature` (base64) over `canonical`.
    ///
    /// Returns the source keys so later stages can reuse them.
    ///
    /// # Errors
    ///
    /// - `UnknownSource` when no key is bound to the source
    /// - `InvalidSignature` when the signature is absent, not base64, the
    ///   wrong length or does not match
    pub fn verify(
        &self,
        canonical: &CanonicalMessage,
        signature: Option<&str>,
    ) -> Result<Arc<SourceKeys>, ValidationError> {
        let keys = self.keys_for(&canonical.source_id)?;

        metric_inc!(SIGNATURE_VERIFICATIONS);
        let result = decode_signature(signature).and_then(|tag| {
            if verify_hmac(canonical.bytes(), &tag, &keys.mac_key) {
                Ok(())
            } else {
                Err(ValidationError::InvalidSignature(
                    "tag does not match message".into(),
                ))
            }
        });

        match result {
            Ok(()) => {
                log_stage!(trace, "signature", canonical.source_id, "Signature verified");
                Ok(keys)
            }
            Err(e) => {
                metric_inc!(SIGNATURE_FAILURES);
                Err(e)
            }
        }
    }
}

fn decode_signature(signature: Option<&str>) -> Result<Vec<u8>, ValidationError> {
    let text = signature
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ValidationError::InvalidSignature("missing field 'sig'".into()))?;
    let tag = BASE64
        .decode(text.trim())
        .map_err(|e| ValidationError::InvalidSignature(format!("signature is not base64: {e}")))?;
    if tag.len() != MAC_LEN {
        return Err(ValidationError::InvalidSignature(format!(
            "signature is {} bytes, expected {MAC_LEN}",
            tag.len()
        )));
    }
    Ok(tag)
}
