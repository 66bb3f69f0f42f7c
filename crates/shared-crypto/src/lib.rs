//! # Shared Crypto - Payload Confidentiality Primitives
//!
//! AEAD helpers used to seal and open telemetry payloads that travel
//! through the broker in encrypted form.
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `symmetric` | AES-256-GCM | Payload encryption |
//!
//! ## Security Properties
//!
//! - 256-bit keys, zeroized on drop
//! - 96-bit random IV per message
//! - Associated data binds a ciphertext to its sender and message nonce

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod symmetric;

// Re-exports
pub use errors::CryptoError;
pub use symmetric::{open, seal, seal_with_iv, AeadKey, Iv, IV_LEN, KEY_LEN, TAG_LEN};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
