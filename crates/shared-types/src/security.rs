//! # Message Authentication Primitives
//!
//! HMAC-SHA256 signing and constant-time verification, plus the per-source
//! key stores the signature verifier and the confidentiality unit read from.
//!
//! ## Security Properties
//!
//! - **HMAC-SHA256 Signatures**: every sensor signs with its own pre-shared key
//! - **Constant-Time Compare**: verification goes through `Mac::verify_slice`
//! - **Zeroized Keys**: MAC keys are wiped from memory when dropped
//! - **Closed Source Set**: a lookup for an undeclared source returns `None`

use crate::errors::KeyError;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use shared_crypto::AeadKey;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use zeroize::Zeroize;

type HmacSha256 = Hmac<Sha256>;

// =============================================================================
// CONSTANTS
// =============================================================================

/// HMAC-SHA256 output length in bytes.
pub const MAC_LEN: usize = 32;

/// Shortest MAC key accepted at load time.
pub const MIN_MAC_KEY_LEN: usize = 16;

// =============================================================================
// HMAC
// =============================================================================

/// Computes HMAC-SHA256 over `message_bytes`.
pub fn sign_hmac(message_bytes: &[u8], key: &MacKey) -> [u8; MAC_LEN] {
    let mut mac = key.mac();
    mac.update(message_bytes);
    let mut tag = [0u8; MAC_LEN];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    tag
}

/// Validates an HMAC-SHA256 tag.
///
/// Returns `false` for a wrong key, a tampered message or a tag of the wrong
/// length.
///
/// # Security
///
/// Uses constant-time comparison to prevent timing attacks.
pub fn verify_hmac(message_bytes: &[u8], tag: &[u8], key: &MacKey) -> bool {
    let mut mac = key.mac();
    mac.update(message_bytes);
    mac.verify_slice(tag).is_ok()
}

// =============================================================================
// KEY MATERIAL
// =============================================================================

/// HMAC key bound to one source.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct MacKey(Vec<u8>);

impl MacKey {
    /// Wraps raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::MacKeyTooShort` below [`MIN_MAC_KEY_LEN`] bytes.
    pub fn from_bytes(source_id: &str, bytes: Vec<u8>) -> Result<Self, KeyError> {
        if bytes.len() < MIN_MAC_KEY_LEN {
            return Err(KeyError::MacKeyTooShort {
                source_id: source_id.to_string(),
                actual: bytes.len(),
                minimum: MIN_MAC_KEY_LEN,
            });
        }
        Ok(Self(bytes))
    }

    /// Parses a hex-encoded key.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::InvalidHex` or `KeyError::MacKeyTooShort`.
    pub fn from_hex(source_id: &str, hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key.trim()).map_err(|e| KeyError::InvalidHex {
            source_id: source_id.to_string(),
            reason: e.to_string(),
        })?;
        Self::from_bytes(source_id, bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length; the fallback is unreachable.
        <HmacSha256 as Mac>::new_from_slice(&self.0)
            .unwrap_or_else(|_| <HmacSha256 as Mac>::new(&Default::default()))
    }
}

impl fmt::Debug for MacKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MacKey(<redacted>)")
    }
}

/// Key material for one source.
#[derive(Debug, Clone)]
pub struct SourceKeys {
    /// Signs the canonical form.
    pub mac_key: MacKey,
    /// Opens encrypted payloads. Sources that never encrypt may omit it.
    pub aead_key: Option<AeadKey>,
}

impl SourceKeys {
    /// Builds key material from hex strings.
    ///
    /// # Errors
    ///
    /// Returns a `KeyError` describing the first invalid key.
    pub fn from_hex(
        source_id: &str,
        mac_hex: &str,
        aead_hex: Option<&str>,
    ) -> Result<Self, KeyError> {
        let mac_key = MacKey::from_hex(source_id, mac_hex)?;
        let aead_key = aead_hex
            .map(|h| {
                AeadKey::from_hex(h).map_err(|e| KeyError::InvalidAeadKey {
                    source_id: source_id.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;
        Ok(Self { mac_key, aead_key })
    }
}

// =============================================================================
// KEY PROVIDERS
// =============================================================================

/// Trait for retrieving per-source key material.
///
/// Implementations might:
/// - Hold keys loaded from a configuration file
/// - Derive keys from a master secret
/// - Query a key management service
pub trait KeyProvider: Send + Sync {
    /// Returns the keys bound to `source_id`.
    ///
    /// # Returns
    ///
    /// - `Some(keys)` if the source is known
    /// - `None` if the source is unknown (reject message)
    fn keys_for(&self, source_id: &str) -> Option<Arc<SourceKeys>>;

    /// Number of sources this provider knows.
    fn source_count(&self) -> usize;
}

impl<K: KeyProvider + ?Sized> KeyProvider for Arc<K> {
    fn keys_for(&self, source_id: &str) -> Option<Arc<SourceKeys>> {
        (**self).keys_for(source_id)
    }

    fn source_count(&self) -> usize {
        (**self).source_count()
    }
}

/// Keys supplied explicitly per source.
#[derive(Debug, Clone, Default)]
pub struct StaticKeyStore {
    keys: HashMap<String, Arc<SourceKeys>>,
}

impl StaticKeyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds key material to a source.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::EmptySourceId` or `KeyError::DuplicateSource`.
    pub fn insert(&mut self, source_id: &str, keys: SourceKeys) -> Result<(), KeyError> {
        if source_id.is_empty() {
            return Err(KeyError::EmptySourceId);
        }
        if self.keys.contains_key(source_id) {
            return Err(KeyError::DuplicateSource(source_id.to_string()));
        }
        self.keys.insert(source_id.to_string(), Arc::new(keys));
        Ok(())
    }

    /// Builder-style variant of [`insert`](Self::insert).
    ///
    /// # Errors
    ///
    /// Same as [`insert`](Self::insert).
    pub fn with_source(mut self, source_id: &str, keys: SourceKeys) -> Result<Self, KeyError> {
        self.insert(source_id, keys)?;
        Ok(self)
    }

    /// Declared source ids, sorted.
    pub fn sources(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.keys.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl KeyProvider for StaticKeyStore {
    fn keys_for(&self, source_id: &str) -> Option<Arc<SourceKeys>> {
        self.keys.get(source_id).cloned()
    }

    fn source_count(&self) -> usize {
        self.keys.len()
    }
}

/// Keys derived from a master secret for a declared set of sources.
///
/// `mac_key = HMAC(master, "mac:" || source_id)` and
/// `aead_key = HMAC(master, "aead:" || source_id)`.
#[derive(Debug, Clone)]
pub struct DerivedKeyStore {
    inner: StaticKeyStore,
}

impl DerivedKeyStore {
    /// Derives keys for every id in `sources`.
    ///
    /// # Errors
    ///
    /// Returns `KeyError` for an empty or duplicate source id.
    pub fn new<I, S>(master_secret: &MacKey, sources: I) -> Result<Self, KeyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut inner = StaticKeyStore::new();
        for source in sources {
            let source_id = source.as_ref();
            let mac_raw = derive(master_secret, "mac:", source_id);
            let aead_raw = derive(master_secret, "aead:", source_id);
            let keys = SourceKeys {
                mac_key: MacKey::from_bytes(source_id, mac_raw.to_vec())?,
                aead_key: Some(AeadKey::from_bytes(aead_raw)),
            };
            inner.insert(source_id, keys)?;
        }
        debug!(sources = inner.source_count(), "Derived per-source keys");
        Ok(Self { inner })
    }
}

fn derive(master: &MacKey, label: &str, source_id: &str) -> [u8; MAC_LEN] {
    let mut input = Vec::with_capacity(label.len() + source_id.len());
    input.extend_from_slice(label.as_bytes());
    input.extend_from_slice(source_id.as_bytes());
    sign_hmac(&input, master)
}

impl KeyProvider for DerivedKeyStore {
    fn keys_for(&self, source_id: &str) -> Option<Arc<SourceKeys>> {
        self.inner.keys_for(source_id)
    }

    fn source_count(&self) -> usize {
        self.inner.source_count()
    }
}

// =============================================================================
// TESTS
// =============================================================================
