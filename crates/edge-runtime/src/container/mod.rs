//! # Edge Container
//!
//! Holds the pipeline, the event bus and the service that joins them, built
//! once from an [`EdgeConfig`].
//!
//! ```text
//! EdgeConfig ──→ key store ──→ ValidationPipeline
//!                                     │
//!                        EdgeValidationService
//!                        ├── ChannelForwarder ──→ forward receiver
//!                        └── CompositeSink
//!                            ├── TracingEventSink
//!                            └── BusEventSink ──→ InMemoryEventBus
//! ```

pub mod config;
pub mod keys;

pub use config::{DispatchConfig, EdgeConfig, KeysConfig, LoadError, SourceKeyConfig};
pub use keys::build_key_store;

use edge_validation::{
    BusEventSink, ChannelForwarder, Clock, CompositeSink, ConfigError, EdgeValidationService,
    SystemClock, TracingEventSink, ValidationPipeline,
};
use shared_bus::InMemoryEventBus;
use shared_types::ForwardedTelemetry;
use std::sync::Arc;
use tokio::sync::mpsc;

/// The service type the runtime runs.
pub type EdgeService = EdgeValidationService<ChannelForwarder, CompositeSink>;

/// Runtime components built from configuration.
pub struct EdgeContainer {
    /// Configuration the container was built from.
    pub config: EdgeConfig,
    /// Security event bus.
    pub bus: Arc<InMemoryEventBus>,
    /// Validation service.
    pub service: Arc<EdgeService>,
}

impl EdgeContainer {
    /// Build on the system clock.
    ///
    /// Returns the container and the receiver of accepted telemetry.
    pub fn build(
        config: EdgeConfig,
    ) -> Result<(Self, mpsc::Receiver<ForwardedTelemetry>), ConfigError> {
        Self::build_with_clock(config, Arc::new(SystemClock::new()))
    }

    /// Build on an explicit clock.
    pub fn build_with_clock(
        config: EdgeConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<(Self, mpsc::Receiver<ForwardedTelemetry>), ConfigError> {
        config.validate()?;
        let keys = build_key_store(&config.keys)?;
        let pipeline = Arc::new(ValidationPipeline::new(
            config.pipeline.clone(),
            keys,
            clock,
        )?);

        let bus = Arc::new(InMemoryEventBus::new());
        let sink = CompositeSink::new()
            .with(Arc::new(TracingEventSink))
            .with(Arc::new(BusEventSink::new(Arc::clone(&bus))));
        let (forwarder, forwarded) = ChannelForwarder::channel(config.dispatch.forward_buffer);
        let service = Arc::new(EdgeValidationService::new(pipeline, forwarder, sink));

        Ok((
            Self {
                config,
                bus,
                service,
            },
            forwarded,
        ))
    }

    /// The validation pipeline.
    pub fn pipeline(&self) -> &Arc<ValidationPipeline> {
        self.service.pipeline()
    }
}
