//! Configuration for the Water Status Monitor MQTT tooling
//!
//! Configuration is TOML on disk; broker credentials are never stored in the
//! file itself, only the names of environment variables that hold them.

use crate::sensors::{canonicalize_topic, Sensor};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use url::Url;

/// Top-level configuration for both the publisher and the watch mode
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorConfig {
    pub broker: BrokerSection,
    #[serde(default)]
    pub sensors: SensorsSection,
    #[serde(default)]
    pub thresholds: ThresholdSection,
    #[serde(default)]
    pub publisher: PublisherSection,
}

/// MQTT broker connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerSection {
    /// Broker URL with protocol and optional port (mqtt:// or mqtts://)
    pub url: String,
    /// Environment variable containing the username
    pub username_env: Option<String>,
    /// Environment variable containing the password
    pub password_env: Option<String>,
    /// Keep-alive interval in seconds
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

fn default_keep_alive_secs() -> u64 {
    60
}

/// Sensor topic layout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensorsSection {
    /// Topic prefix shared by all sensors
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Override topic for the room sensor (the device allows remapping it)
    pub room_topic: Option<String>,
}

fn default_prefix() -> String {
    "home/water".to_string()
}

impl Default for SensorsSection {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            room_topic: None,
        }
    }
}

impl SensorsSection {
    /// Topic for a sensor, honoring the room-topic override
    pub fn topic(&self, sensor: Sensor) -> String {
        match (sensor, &self.room_topic) {
            (Sensor::Room, Some(topic)) => canonicalize_topic(topic),
            _ => sensor.topic(&self.prefix),
        }
    }

    /// Map a received topic back to its sensor
    pub fn sensor_for_topic(&self, topic: &str) -> Option<Sensor> {
        let canonical = canonicalize_topic(topic);
        if let Some(room) = &self.room_topic {
            if canonicalize_topic(room) == canonical {
                return Some(Sensor::Room);
            }
        }
        Sensor::from_topic(&self.prefix, &canonical)
    }
}

/// Bath-readiness temperature thresholds in degrees Celsius
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ThresholdSection {
    /// Minimum tank temperature for the bath to count as ready
    #[serde(default = "default_min_tank_temp")]
    pub min_tank_temp: f64,
    /// Minimum out-pipe temperature for the bath to count as ready
    #[serde(default = "default_min_out_pipe_temp")]
    pub min_out_pipe_temp: f64,
}

fn default_min_tank_temp() -> f64 {
    52.0
}

fn default_min_out_pipe_temp() -> f64 {
    38.0
}

impl Default for ThresholdSection {
    fn default() -> Self {
        Self {
            min_tank_temp: default_min_tank_temp(),
            min_out_pipe_temp: default_min_out_pipe_temp(),
        }
    }
}

/// Synthetic publisher settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PublisherSection {
    /// Seconds between publish rounds
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Fixed RNG seed for reproducible synthetic series
    pub seed: Option<u64>,
}

fn default_interval_secs() -> u64 {
    5
}

impl Default for PublisherSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            seed: None,
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MonitorConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: MonitorConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field constraints beyond what serde enforces
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.broker.url)
            .map_err(|_| ConfigError::InvalidBrokerUrl(self.broker.url.clone()))?;
        if url.scheme() != "mqtt" && url.scheme() != "mqtts" {
            return Err(ConfigError::InvalidBrokerUrl(format!(
                "unsupported scheme '{}', expected mqtt:// or mqtts://",
                url.scheme()
            )));
        }
        if url.host_str().is_none() {
            return Err(ConfigError::InvalidBrokerUrl(self.broker.url.clone()));
        }

        if self.publisher.interval_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "publisher.interval_secs must be at least 1".to_string(),
            ));
        }

        for (name, value) in [
            ("thresholds.min_tank_temp", self.thresholds.min_tank_temp),
            (
                "thresholds.min_out_pipe_temp",
                self.thresholds.min_out_pipe_temp,
            ),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidConfig(format!(
                    "{name} must be a positive finite temperature, got {value}"
                )));
            }
        }

        Ok(())
    }

    /// Helper method to get an environment variable, None if unset
    fn get_env_var_optional(env_var_name: Option<&String>) -> Option<String> {
        env_var_name.and_then(|name| std::env::var(name).ok())
    }

    /// Get the MQTT username from its environment variable
    pub fn mqtt_username(&self) -> Option<String> {
        Self::get_env_var_optional(self.broker.username_env.as_ref())
    }

    /// Get the MQTT password from its environment variable
    pub fn mqtt_password(&self) -> Option<String> {
        Self::get_env_var_optional(self.broker.password_env.as_ref())
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[broker]
url = "mqtt://localhost:1883"

[thresholds]
min_tank_temp = 52.0
min_out_pipe_temp = 38.0
"#;
        let config: MonitorConfig = toml::from_str(toml_content).expect("Test config should parse");
        config
    }
}
