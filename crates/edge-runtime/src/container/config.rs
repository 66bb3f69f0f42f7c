//! # Edge Configuration
//!
//! Configuration for the edge process: the pipeline snapshot, key material
//! and dispatch limits.
//!
//! ## Sources, in order of precedence
//!
//! 1. Environment variables (see [`EdgeConfig::apply_env_overrides`])
//! 2. TOML file passed with `--config`
//! 3. Built-in defaults
//!
//! ## Security Requirements
//!
//! - Every declared source MUST end up with a MAC key, or startup fails
//! - Keys are hex strings and never logged

use edge_telemetry::parse_flag;
use edge_validation::{ConfigError, PipelineConfig, RateAlgorithm};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Complete edge configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Validation pipeline snapshot.
    pub pipeline: PipelineConfig,
    /// Per-source key material.
    pub keys: KeysConfig,
    /// Per-source lanes.
    pub dispatch: DispatchConfig,
}

/// Key material section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// Explicit keys, keyed by source id.
    pub sources: BTreeMap<String, SourceKeyConfig>,
    /// Hex master secret for derived keys.
    pub master_secret: Option<String>,
    /// Sources whose keys are derived from `master_secret`.
    pub derived_sources: Vec<String>,
    /// Hex AEAD key for explicit sources that declare none of their own.
    pub shared_aead_key: Option<String>,
}

/// Keys for one explicitly declared source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceKeyConfig {
    /// Hex HMAC key. May be left out and supplied via the environment.
    pub mac_key: Option<String>,
    /// Hex AES-256-GCM key.
    pub aead_key: Option<String>,
}

/// Dispatch limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Queue depth of each source lane.
    pub lane_capacity: usize,
    /// Lanes beyond this share one overflow lane.
    pub max_lanes: usize,
    /// Buffer between the pipeline and the forward sink.
    pub forward_buffer: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            lane_capacity: 256,
            max_lanes: 1024,
            forward_buffer: 1024,
        }
    }
}

/// Errors while loading configuration.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Config file unreadable
    #[error("Cannot read config file {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`EdgeConfig`]
    #[error("Cannot parse config file {path}: {source}")]
    Parse {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: toml::de::Error,
    },

    /// Loaded values are unusable
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

impl EdgeConfig {
    /// Parse from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Read a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from an optional file, apply process environment overrides and
    /// validate.
    pub fn load(path: Option<&Path>) -> Result<Self, LoadError> {
        let mut config = match path {
            Some(path) => {
                info!(path = %path.display(), "Loading configuration file");
                Self::from_file(path)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// # Environment Variables
    ///
    /// - `ENABLE_SIGNATURE_VERIFICATION`, `ENABLE_TIMESTAMP_VALIDATION`,
    ///   `ENABLE_NONCE_VALIDATION`, `ENABLE_DECRYPTION`, `ENABLE_RATE_LIMITING`
    /// - `TIMESTAMP_WINDOW_SECONDS`: freshness window
    /// - `NONCE_CACHE_SIZE`: replay cache entries per source
    /// - `RATE_LIMIT_PER_MINUTE`, `RATE_LIMIT_BURST`, `RATE_LIMIT_ALGORITHM`
    /// - `SENSOR_<ID>_HMAC_KEY`: MAC key for a declared source; the stock
    ///   sensors also accept `SENSOR_TEMP_HMAC_KEY`, `SENSOR_HUMIDITY_HMAC_KEY`
    ///   and `SENSOR_WIND_HMAC_KEY`
    /// - `AES_GCM_KEY`: shared AEAD key
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_env_overrides<L>(&mut self, lookup: L)
    where
        L: Fn(&str) -> Option<String>,
    {
        let stages = &mut self.pipeline.stages;
        for (var, flag) in [
            ("ENABLE_SIGNATURE_VERIFICATION", &mut stages.signature),
            ("ENABLE_TIMESTAMP_VALIDATION", &mut stages.timestamp),
            ("ENABLE_NONCE_VALIDATION", &mut stages.replay),
            ("ENABLE_DECRYPTION", &mut stages.decryption),
            ("ENABLE_RATE_LIMITING", &mut stages.rate_limit),
        ] {
            if let Some(value) = lookup(var) {
                *flag = parse_flag(&value);
            }
        }

        if let Some(secs) = parse_var(&lookup, "TIMESTAMP_WINDOW_SECONDS") {
            self.pipeline.freshness.window_secs = secs;
        }
        if let Some(size) = parse_var(&lookup, "NONCE_CACHE_SIZE") {
            self.pipeline.freshness.max_entries_per_source = size;
        }
        if let Some(per_minute) = parse_var::<u32, _>(&lookup, "RATE_LIMIT_PER_MINUTE") {
            self.pipeline.rate_limit = self.pipeline.rate_limit.clone().with_per_minute(per_minute);
        }
        if let Some(burst) = parse_var(&lookup, "RATE_LIMIT_BURST") {
            self.pipeline.rate_limit.capacity = burst;
        }
        if let Some(algorithm) = parse_var::<RateAlgorithm, _>(&lookup, "RATE_LIMIT_ALGORITHM") {
            self.pipeline.rate_limit.algorithm = algorithm;
        }

        for (source_id, keys) in &mut self.keys.sources {
            let key = lookup(&hmac_env_var(source_id))
                .or_else(|| legacy_hmac_env_var(source_id).and_then(|var| lookup(var)));
            if let Some(key) = key {
                keys.mac_key = Some(key);
            }
        }
        if let Some(key) = lookup("AES_GCM_KEY") {
            self.keys.shared_aead_key = Some(key);
        }
    }

    /// Validate pipeline values and key declarations. Key bytes are
    /// checked when the key store is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;

        for (source_id, keys) in &self.keys.sources {
            if keys.mac_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
                return Err(ConfigError::invalid(
                    format!("keys.sources.{source_id}.mac_key"),
                    format!("missing; set it in the file or in {}", hmac_env_var(source_id)),
                ));
            }
        }
        if !self.keys.derived_sources.is_empty() && self.keys.master_secret.is_none() {
            return Err(ConfigError::invalid(
                "keys.master_secret",
                "derived_sources requires a master secret",
            ));
        }
        if self.keys.sources.is_empty() && self.keys.derived_sources.is_empty() {
            return Err(ConfigError::NoKeyMaterial);
        }

        if self.dispatch.lane_capacity == 0 || self.dispatch.forward_buffer == 0 {
            return Err(ConfigError::invalid(
                "dispatch",
                "queue sizes cannot be 0",
            ));
        }
        if self.dispatch.max_lanes == 0 {
            return Err(ConfigError::invalid(
                "dispatch.max_lanes",
                "at least one lane is required",
            ));
        }
        Ok(())
    }
}

/// Environment variable carrying the MAC key of `source_id`:
/// `temp-01` maps to `SENSOR_TEMP_01_HMAC_KEY`.
pub fn hmac_env_var(source_id: &str) -> String {
    let id: String = source_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("SENSOR_{id}_HMAC_KEY")
}

/// Older per-kind variable names of the three stock sensors. Consulted only
/// when [`hmac_env_var`] is unset.
pub fn legacy_hmac_env_var(source_id: &str) -> Option<&'static str> {
    match source_id {
        "temp-01" => Some("SENSOR_TEMP_HMAC_KEY"),
        "humidity-01" => Some("SENSOR_HUMIDITY_HMAC_KEY"),
        "wind-01" => Some("SENSOR_WIND_HMAC_KEY"),
        _ => None,
    }
}

fn parse_var<T, L>(lookup: &L, var: &str) -> Option<T>
where
    T: std::str::FromStr,
    L: Fn(&str) -> Option<String>,
{
    let raw = lookup(var)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}
