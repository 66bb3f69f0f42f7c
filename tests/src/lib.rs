//! # Edge Validator Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Shared harness: manual clock, keys, sealers
//! └── integration/      # Cross-crate scenarios
//!     ├── flows.rs      # Accept paths, rate limiting, stage toggles, events
//!     ├── attacks.rs    # Replay, staleness, tampering, spoofing, flooding
//!     └── runtime.rs    # Config file → container → dispatcher → output
//!
//! tests/benches/
//! └── pipeline_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p edge-tests
//!
//! # By category
//! cargo test -p edge-tests integration::attacks::
//!
//! # Benchmarks
//! cargo bench -p edge-tests
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::float_cmp)]

pub mod fixtures;
pub mod integration;
