//! # Adapters Module
//!
//! Infrastructure adapters implementing the outbound ports.

pub mod bus;
pub mod forwarder;
pub mod logging;

pub use bus::BusEventSink;
pub use forwarder::ChannelForwarder;
pub use logging::{CompositeSink, TracingEventSink};
