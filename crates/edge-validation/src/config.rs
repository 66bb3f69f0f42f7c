//! Pipeline configuration with validation.
//!
//! A `PipelineConfig` is an immutable snapshot. The pipeline holds it behind
//! an `Arc` and every validation reads exactly one snapshot from start to
//! finish, so toggles never change mid-message.

use serde::{Deserialize, Serialize};
use shared_types::KeyError;
use std::time::Duration;
use thiserror::Error;

/// Main pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Per-stage enable switches
    pub stages: StageToggles,
    /// Timestamp window and replay cache
    pub freshness: FreshnessConfig,
    /// Per-source admission control
    pub rate_limit: RateLimitConfig,
    /// Accept-side event emission
    pub events: EventConfig,
}

impl PipelineConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.freshness.window_secs == 0 {
            return Err(ConfigError::invalid(
                "freshness.window_secs",
                "window cannot be 0",
            ));
        }
        if self.freshness.window_secs > MAX_WINDOW_SECS {
            return Err(ConfigError::invalid(
                "freshness.window_secs",
                format!("window cannot exceed {MAX_WINDOW_SECS} seconds"),
            ));
        }
        if self.freshness.max_entries_per_source == 0 {
            return Err(ConfigError::invalid(
                "freshness.max_entries_per_source",
                "replay cache needs room for at least one nonce",
            ));
        }
        if self.rate_limit.capacity == 0 {
            return Err(ConfigError::invalid(
                "rate_limit.capacity",
                "capacity cannot be 0",
            ));
        }
        let rate = self.rate_limit.refill_per_second;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ConfigError::invalid(
                "rate_limit.refill_per_second",
                "rate must be a positive number",
            ));
        }
        if self.rate_limit.drain_granularity == 0 {
            return Err(ConfigError::invalid(
                "rate_limit.drain_granularity",
                "granularity cannot be 0",
            ));
        }
        Ok(())
    }
}

/// Largest accepted freshness window (one day).
pub const MAX_WINDOW_SECS: u64 = 86_400;

/// Stage switches. A disabled stage is skipped and counts as a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageToggles {
    /// HMAC verification
    pub signature: bool,
    /// Timestamp window
    pub timestamp: bool,
    /// Nonce replay cache
    pub replay: bool,
    /// AEAD decryption of encrypted payloads
    pub decryption: bool,
    /// Per-source rate limiting
    pub rate_limit: bool,
}

impl StageToggles {
    /// Every stage disabled.
    pub fn none() -> Self {
        Self {
            signature: false,
            timestamp: false,
            replay: false,
            decryption: false,
            rate_limit: false,
        }
    }
}

impl Default for StageToggles {
    fn default() -> Self {
        Self {
            signature: true,
            timestamp: true,
            replay: true,
            decryption: true,
            rate_limit: true,
        }
    }
}

/// Freshness configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreshnessConfig {
    /// Window `W` in seconds, applied on both sides of now
    pub window_secs: u64,
    /// Replay cache capacity per source
    pub max_entries_per_source: usize,
}

impl FreshnessConfig {
    /// Window as a `Duration`.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            window_secs: 120,
            max_entries_per_source: 10_000,
        }
    }
}

/// Rate limiting algorithm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateAlgorithm {
    /// Bursts up to capacity after idle
    #[default]
    TokenBucket,
    /// Smooths admission regardless of idle time
    LeakyBucket,
}

impl std::str::FromStr for RateAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "token_bucket" | "token" => Ok(Self::TokenBucket),
            "leaky_bucket" | "leaky" => Ok(Self::LeakyBucket),
            other => Err(ConfigError::invalid(
                "rate_limit.algorithm",
                format!("unknown algorithm '{other}'"),
            )),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Token or leaky bucket
    pub algorithm: RateAlgorithm,
    /// Capacity `C`: burst size for the token bucket
    #[serde(alias = "burst")]
    pub capacity: u32,
    /// Rate `R`: refill (token) or drain (leaky) per second
    pub refill_per_second: f64,
    /// Leaky bucket depth limit is `min(capacity, drain_granularity)`
    pub drain_granularity: u32,
}

impl RateLimitConfig {
    /// Set the rate from a messages-per-minute figure.
    #[must_use]
    pub fn with_per_minute(mut self, messages_per_minute: u32) -> Self {
        self.refill_per_second = f64::from(messages_per_minute) / 60.0;
        self
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            algorithm: RateAlgorithm::TokenBucket,
            capacity: 10,
            refill_per_second: 1.0,
            drain_granularity: 1,
        }
    }
}

/// Events emitted for accepted messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Emit `telemetry_processed` for every Nth accept (0 = never)
    pub sample_accepted_every: u64,
    /// Emit `source_first_seen` for a source's first accept
    pub emit_first_seen: bool,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            sample_accepted_every: 100,
            emit_first_seen: true,
        }
    }
}

/// Configuration errors. Fatal at startup.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// A field has an unusable value
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        /// Dotted field path
        field: String,
        /// What is wrong with it
        reason: String,
    },

    /// Key material for a declared source is invalid
    #[error("Invalid key material: {0}")]
    Key(#[from] KeyError),

    /// No source has any key material
    #[error("No key material configured for any source")]
    NoKeyMaterial,
}

impl ConfigError {
    /// Shorthand for `InvalidValue`.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
