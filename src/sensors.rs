//! Sensor identities, topic layout, and synthetic readings
//!
//! The Water Status Monitor watches four water-system temperatures plus an
//! optional room sensor. Each sensor owns one MQTT topic under a shared
//! prefix and publishes its value as a plain decimal string with one
//! fractional digit, e.g. `47.3`.

use chrono::{DateTime, Utc};
use rand::Rng;
use thiserror::Error;

/// The temperature sensors known to the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sensor {
    /// Hot water storage tank
    Tank,
    /// Hot water out pipe
    OutPipe,
    /// Heating circuit, incoming
    HeatingIn,
    /// Heating circuit, outgoing
    HeatingOut,
    /// Ambient room temperature (no part in bath readiness)
    Room,
}

/// Inclusive temperature range in degrees Celsius
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempRange {
    pub low: f64,
    pub high: f64,
}

impl TempRange {
    pub fn contains(&self, celsius: f64) -> bool {
        celsius >= self.low && celsius <= self.high
    }
}

impl Sensor {
    /// All sensors, in display order
    pub const fn all() -> [Sensor; 5] {
        [
            Sensor::Tank,
            Sensor::OutPipe,
            Sensor::HeatingIn,
            Sensor::HeatingOut,
            Sensor::Room,
        ]
    }

    /// Short name used in config, logs, and banner output
    pub fn label(&self) -> &'static str {
        match self {
            Sensor::Tank => "tank",
            Sensor::OutPipe => "outpipe",
            Sensor::HeatingIn => "heating_in",
            Sensor::HeatingOut => "heating_out",
            Sensor::Room => "room",
        }
    }

    fn topic_suffix(&self) -> &'static str {
        match self {
            Sensor::Tank => "tank/temperature",
            Sensor::OutPipe => "outpipe/temperature",
            Sensor::HeatingIn => "heating/in/temperature",
            Sensor::HeatingOut => "heating/out/temperature",
            Sensor::Room => "room/temperature",
        }
    }

    /// Build the sensor's MQTT topic under the given prefix
    pub fn topic(&self, prefix: &str) -> String {
        canonicalize_topic(&format!("{}/{}", prefix, self.topic_suffix()))
    }

    /// Map a topic back to its sensor, if it belongs to this prefix
    pub fn from_topic(prefix: &str, topic: &str) -> Option<Sensor> {
        let topic = canonicalize_topic(topic);
        Sensor::all()
            .into_iter()
            .find(|sensor| sensor.topic(prefix) == topic)
    }

    /// Range the synthetic publisher draws values from
    ///
    /// The water ranges match the device's expected operating envelope:
    /// heating-in runs hottest, out-pipe slightly cooler than the tank.
    pub fn synthetic_range(&self) -> TempRange {
        match self {
            Sensor::Tank => TempRange {
                low: 38.0,
                high: 55.0,
            },
            Sensor::OutPipe => TempRange {
                low: 35.0,
                high: 50.0,
            },
            Sensor::HeatingIn => TempRange {
                low: 50.0,
                high: 70.0,
            },
            Sensor::HeatingOut => TempRange {
                low: 30.0,
                high: 50.0,
            },
            Sensor::Room => TempRange {
                low: 18.0,
                high: 26.0,
            },
        }
    }
}

/// A single temperature reading
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub sensor: Sensor,
    pub celsius: f64,
    pub timestamp: DateTime<Utc>,
}

/// Payload parsing errors
#[derive(Debug, Error, PartialEq)]
pub enum PayloadError {
    #[error("Payload is not a number: '{0}'")]
    NotANumber(String),
    #[error("Payload is not a finite temperature: {0}")]
    NotFinite(f64),
}

impl Reading {
    /// Draw a synthetic reading from the sensor's range
    pub fn synthetic<R: Rng>(sensor: Sensor, rng: &mut R) -> Reading {
        let range = sensor.synthetic_range();
        Reading {
            sensor,
            celsius: rng.gen_range(range.low..=range.high),
            timestamp: Utc::now(),
        }
    }

    /// Wire payload, one decimal place
    pub fn payload(&self) -> String {
        format!("{:.1}", self.celsius)
    }

    /// Parse a wire payload received for the given sensor
    pub fn parse_payload(sensor: Sensor, payload: &str) -> Result<Reading, PayloadError> {
        let celsius: f64 = payload
            .trim()
            .parse()
            .map_err(|_| PayloadError::NotANumber(payload.to_string()))?;
        if !celsius.is_finite() {
            return Err(PayloadError::NotFinite(celsius));
        }
        Ok(Reading {
            sensor,
            celsius,
            timestamp: Utc::now(),
        })
    }
}

/// Canonicalize an MQTT topic: collapse duplicate slashes, strip leading
/// and trailing slashes. Sensor topics never start with a slash.
pub fn canonicalize_topic(topic: &str) -> String {
    let mut result = topic.to_string();

    while result.contains("//") {
        result = result.replace("//", "/");
    }

    result.trim_matches('/').to_string()
}
