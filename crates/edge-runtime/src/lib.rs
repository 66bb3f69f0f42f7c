//! # Edge Runtime Library
//!
//! This library exposes the internal modules of the edge runtime for testing.
//! The main entry point is the `main.rs` binary.
//!
//! ## Modular Structure
//!
//! - `container/` - configuration, key store and component wiring
//! - `dispatch` - per-source lanes feeding the validation service
//! - `alerts` - relay of high-severity security events
//! - `seal` - signed readings for the `seal` command

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::float_cmp))]

pub mod alerts;
pub mod container;
pub mod dispatch;
pub mod seal;

pub use alerts::{
    alert_filter, recent_alerts, relay_alerts, subscribe_alerts, DEFAULT_ALERT_SEVERITY,
};
pub use container::{
    build_key_store, DispatchConfig, EdgeConfig, EdgeContainer, EdgeService, KeysConfig,
    LoadError, SourceKeyConfig,
};
pub use dispatch::{DispatchError, LaneReport, SourceDispatcher, OVERFLOW_LANE};
pub use seal::{backdate, seal_batch, SealCommandError, SealRequest};
