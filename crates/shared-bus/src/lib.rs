//! # Shared Bus - Security Event Bus
//!
//! Carries [`SecurityEvent`]s from the validation pipeline to whatever logs,
//! alerts on or stores them. The pipeline never persists events itself.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │  Validation  │                    │ Log shipper  │
//! │   service    │    publish()       │  / alerting  │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```
//!
//! ## Delivery
//!
//! - Broadcast to every live subscriber, filtered per subscription
//! - Slow subscribers lag and lose the oldest events, publishers never block
//! - A bounded history keeps the latest events for late readers

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{EventFilter, EventTopic, EventType, SecurityEvent, Severity};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Number of recent events the bus keeps for late readers.
pub const DEFAULT_HISTORY_SIZE: usize = 256;
