//! MQTT client plumbing built on rumqttc
//!
//! Option building and backoff are pure and unit-tested; the connect and
//! subscribe helpers wrap the async client.

use crate::config::{MonitorConfig, SensorsSection};
use crate::sensors::{Reading, Sensor};
use crate::transport::ReadingSink;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// MQTT transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("No ConnAck from broker within {0:?}")]
    ConnAckTimeout(Duration),
    #[error("Publishing failed")]
    PublishFailed(#[source] rumqttc::ClientError),
    #[error("Subscription failed")]
    SubscriptionFailed(#[source] rumqttc::ClientError),
}

/// Build MQTT options from the broker config
///
/// The client id carries the role (publisher or watcher) plus the process id
/// so two instances on the same host never collide at the broker.
pub fn configure_mqtt_options(
    role: &str,
    config: &MonitorConfig,
) -> Result<MqttOptions, TransportError> {
    let url = Url::parse(&config.broker.url)
        .map_err(|_| TransportError::InvalidBrokerUrl(config.broker.url.clone()))?;

    let host = url
        .host_str()
        .ok_or_else(|| TransportError::InvalidBrokerUrl(config.broker.url.clone()))?;
    let port = url
        .port()
        .unwrap_or(if url.scheme() == "mqtts" { 8883 } else { 1883 });

    let client_id = format!("watermon-{role}-{}", std::process::id());
    let mut options = MqttOptions::new(client_id, host, port);

    if url.scheme() == "mqtts" {
        options.set_transport(rumqttc::Transport::tls_with_default_config());
    }

    if let Some(username) = config.mqtt_username() {
        let password = config.mqtt_password().unwrap_or_default();
        options.set_credentials(username, password);
    }

    options.set_keep_alive(Duration::from_secs(config.broker.keep_alive_secs));
    options.set_clean_session(true);

    Ok(options)
}

/// Create a client and event loop for the given role
pub fn connect(role: &str, config: &MonitorConfig) -> Result<(AsyncClient, EventLoop), TransportError> {
    let options = configure_mqtt_options(role, config)?;
    Ok(AsyncClient::new(options, 100))
}

/// Drive the event loop until the broker acknowledges the connection
///
/// rumqttc connects lazily on the first poll, so success is only known once
/// a ConnAck arrives. A broker that never answers trips the timeout.
pub async fn wait_for_connack(
    eventloop: &mut EventLoop,
    timeout: Duration,
) -> Result<(), TransportError> {
    let wait = async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    debug!("ConnAck received");
                    return Ok(());
                }
                Ok(_) => continue,
                Err(e) => return Err(TransportError::ConnectionFailed(e.to_string())),
            }
        }
    };

    match tokio::time::timeout(timeout, wait).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::ConnAckTimeout(timeout)),
    }
}

/// Subscribe to every sensor topic at QoS 1
pub async fn subscribe_sensors(
    client: &AsyncClient,
    sensors: &SensorsSection,
) -> Result<(), TransportError> {
    for sensor in Sensor::all() {
        let topic = sensors.topic(sensor);
        client
            .subscribe(&topic, QoS::AtLeastOnce)
            .await
            .map_err(TransportError::SubscriptionFailed)?;
        debug!(topic = %topic, "Subscribed");
    }
    Ok(())
}

/// Bounded exponential backoff for reconnection attempts
#[derive(Debug, Clone)]
pub struct Backoff {
    next_secs: u64,
}

const INITIAL_BACKOFF_SECS: u64 = 1;
const MAX_BACKOFF_SECS: u64 = 30;

impl Backoff {
    pub fn new() -> Self {
        Self {
            next_secs: INITIAL_BACKOFF_SECS,
        }
    }

    /// Delay to sleep before the next attempt; doubles up to the cap
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next_secs;
        self.next_secs = std::cmp::min(self.next_secs * 2, MAX_BACKOFF_SECS);
        Duration::from_secs(delay)
    }

    /// Reset after a stable connection
    pub fn reset(&mut self) {
        self.next_secs = INITIAL_BACKOFF_SECS;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

/// Reading sink backed by the MQTT client
pub struct MqttSink {
    client: AsyncClient,
    sensors: SensorsSection,
}

impl MqttSink {
    pub fn new(client: AsyncClient, sensors: SensorsSection) -> Self {
        Self { client, sensors }
    }
}

#[async_trait::async_trait]
impl ReadingSink for MqttSink {
    type Error = TransportError;

    async fn publish_reading(&self, reading: &Reading) -> Result<(), TransportError> {
        let topic = self.sensors.topic(reading.sensor);
        self.client
            .publish(topic, QoS::AtLeastOnce, false, reading.payload())
            .await
            .map_err(TransportError::PublishFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_url(url: &str) -> MonitorConfig {
        let mut config = MonitorConfig::test_config();
        config.broker.url = url.to_string();
        config
    }

    #[test]
    fn test_configure_mqtt_options() {
        let config = config_with_url("mqtt://broker.local:1883");
        let options = configure_mqtt_options("pub", &config).unwrap();
        assert_eq!(options.broker_address(), ("broker.local".to_string(), 1883));
        assert_eq!(options.keep_alive(), Duration::from_secs(60));
    }

    #[test]
    fn test_default_ports_by_scheme() {
        let options =
            configure_mqtt_options("pub", &config_with_url("mqtt://broker.local")).unwrap();
        assert_eq!(options.broker_address().1, 1883);

        let options =
            configure_mqtt_options("pub", &config_with_url("mqtts://broker.local")).unwrap();
        assert_eq!(options.broker_address().1, 8883);
    }

    #[test]
    fn test_invalid_broker_url_rejected() {
        let result = configure_mqtt_options("pub", &config_with_url("not a url"));
        assert!(matches!(result, Err(TransportError::InvalidBrokerUrl(_))));
    }

    #[test]
    fn test_client_id_carries_role() {
        let config = config_with_url("mqtt://localhost:1883");
        let options = configure_mqtt_options("watch", &config).unwrap();
        assert!(options.client_id().starts_with("watermon-watch-"));
    }

    #[test]
    fn test_backoff_doubles_to_cap() {
        let mut backoff = Backoff::new();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
        assert_eq!(backoff.next_delay(), Duration::from_secs(8));
        assert_eq!(backoff.next_delay(), Duration::from_secs(16));
        assert_eq!(backoff.next_delay(), Duration::from_secs(30));
        assert_eq!(backoff.next_delay(), Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_reset() {
        let mut backoff = Backoff::new();
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }
}
