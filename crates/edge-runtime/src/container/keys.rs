//! Key store construction.
//!
//! Any problem with a declared source's key material is fatal: the process
//! must not start validating with a partial key set.

use edge_validation::ConfigError;
use shared_crypto::AeadKey;
use shared_types::{DerivedKeyStore, KeyError, KeyProvider, MacKey, SourceKeys, StaticKeyStore};
use std::sync::Arc;
use tracing::info;

use super::config::KeysConfig;

/// Build the key store described by `config`.
///
/// Explicit sources and derived sources end up in one store; a source id
/// appearing in both is rejected as a duplicate.
pub fn build_key_store(config: &KeysConfig) -> Result<Arc<StaticKeyStore>, ConfigError> {
    let shared_aead = config
        .shared_aead_key
        .as_deref()
        .map(|hex_key| {
            AeadKey::from_hex(hex_key).map_err(|e| KeyError::InvalidAeadKey {
                source_id: "*".to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()?;

    let mut store = StaticKeyStore::new();
    for (source_id, declared) in &config.sources {
        let mac_hex = declared.mac_key.as_deref().ok_or_else(|| {
            ConfigError::invalid(format!("keys.sources.{source_id}.mac_key"), "missing")
        })?;
        let mut keys = SourceKeys::from_hex(source_id, mac_hex, declared.aead_key.as_deref())?;
        if keys.aead_key.is_none() {
            keys.aead_key = shared_aead.clone();
        }
        store.insert(source_id, keys)?;
    }

    if !config.derived_sources.is_empty() {
        let master_hex = config.master_secret.as_deref().ok_or_else(|| {
            ConfigError::invalid("keys.master_secret", "derived_sources requires a master secret")
        })?;
        let master = MacKey::from_hex("<master>", master_hex)?;
        let derived = DerivedKeyStore::new(&master, &config.derived_sources)?;
        for source_id in &config.derived_sources {
            if let Some(keys) = derived.keys_for(source_id) {
                store.insert(source_id, (*keys).clone())?;
            }
        }
    }

    if store.source_count() == 0 {
        return Err(ConfigError::NoKeyMaterial);
    }

    info!(
        explicit = config.sources.len(),
        derived = config.derived_sources.len(),
        "Key store loaded"
    );
    Ok(Arc::new(store))
}
