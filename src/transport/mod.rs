//! Transport layer for sensor readings
//!
//! Provides a small sink abstraction over the MQTT client so the publish
//! loop can be driven against a mock in tests.

use crate::sensors::Reading;

pub mod mqtt;

pub use mqtt::{Backoff, MqttSink, TransportError};

/// Destination for sensor readings
#[async_trait::async_trait]
pub trait ReadingSink: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Publish a single reading to its sensor topic
    async fn publish_reading(&self, reading: &Reading) -> Result<(), Self::Error>;
}
