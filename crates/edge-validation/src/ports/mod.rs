//! # Ports Layer
//!
//! Trait definitions for the hexagonal architecture.
//! - **Inbound (Driving)**: API that the runtime and tests call
//! - **Outbound (Driven)**: Forwarding, event delivery and time

pub mod inbound;
pub mod outbound;
