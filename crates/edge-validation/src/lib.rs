//! # Edge Validation
//!
//! The message-validation pipeline an edge process applies to inbound
//! telemetry before it is trusted and forwarded to the cloud.
//!
//! ## Architecture
//!
//! This crate follows hexagonal architecture:
//! - **Domain Layer** (`domain/`): canonicalization, HMAC verification,
//!   freshness, AEAD decryption, rate limiting. No I/O.
//! - **Ports Layer** (`ports/`): the validation API, plus forwarder, event
//!   sink and clock traits
//! - **Pipeline** (`pipeline.rs`): runs the stages in fixed order
//! - **Service Layer** (`service.rs`): wires the pipeline to its ports
//! - **Adapters** (`adapters/`): event bus, tracing and channel adapters
//!
//! ## Stage order
//!
//! ```text
//! canonicalize → signature → timestamp → nonce → decrypt → rate limit → ACCEPT
//! ```
//!
//! Every stage except canonicalization can be switched off in
//! [`config::StageToggles`]; a disabled stage always passes.
//!
//! ## Security Notes
//!
//! - **Sign-the-ciphertext**: the signature covers IV and ciphertext, so
//!   tampering is caught before decryption is attempted
//! - **Constant-time compare**: HMAC tags are checked with `verify_slice`
//! - **Per-source state**: replay cache and rate buckets are locked per
//!   source; one noisy sensor cannot stall another

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::float_cmp))]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod pipeline;
pub mod ports;
pub mod service;

// Re-export public API
pub use adapters::{BusEventSink, ChannelForwarder, CompositeSink, TracingEventSink};
pub use config::{
    ConfigError, EventConfig, FreshnessConfig, PipelineConfig, RateAlgorithm, RateLimitConfig,
    StageToggles,
};
pub use domain::canonical::{canonicalize, quantize, CanonicalMessage, Reading, CANONICAL_TAG};
pub use domain::confidentiality::{associated_data, open_reading, seal_reading};
pub use domain::entities::{PipelineStats, Rejection, ValidationOutcome, ValidationReport};
pub use domain::errors::{RejectReason, ValidationError};
pub use domain::freshness::{check_timestamp, ReplayCache, ReplayPolicy};
pub use domain::rate_limit::{LeakyBucket, RateLimiter, SourceStats, TokenBucket};
pub use domain::sealer::{SealError, TelemetrySealer};
pub use domain::signature::SignatureVerifier;
pub use pipeline::ValidationPipeline;
pub use ports::inbound::TelemetryValidationApi;
pub use ports::outbound::{
    Clock, ForwardError, ManualClock, SecurityEventSink, SystemClock, TelemetryForwarder,
};
pub use service::EdgeValidationService;
