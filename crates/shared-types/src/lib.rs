//! # Shared Types Crate
//!
//! This crate contains the telemetry wire entities and the key material used
//! by every stage of the edge validation pipeline.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: The wire format of a sensor message is
//!   defined once, in [`entities::TelemetryMessage`].
//! - **Lenient Decoding**: Every wire field is optional at the serde layer so
//!   that a structurally incomplete message still decodes and can be rejected
//!   with a precise reason by the canonicalizer.
//! - **Keys Stay Local**: Key material lives behind [`security::KeyProvider`]
//!   and is zeroized on drop. Keys are never part of a message.

pub mod entities;
pub mod errors;
pub mod security;

pub use entities::*;
pub use errors::*;
pub use security::*;
