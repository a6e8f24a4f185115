//! watermon - MQTT tooling for the Water Status Monitor
//!
//! Two modes against the same broker and topic layout the device uses:
//!
//! - `publish`: feed the device synthetic temperature readings for testing
//! - `watch`: follow live sensor traffic and show the bath-readiness verdict
//!
//! # Example
//!
//! ```rust
//! use watermon::sensors::{Reading, Sensor};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let reading = Reading::synthetic(Sensor::Tank, &mut rng);
//! assert!(Sensor::Tank.synthetic_range().contains(reading.celsius));
//! assert_eq!(Sensor::Tank.topic("home/water"), "home/water/tank/temperature");
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod publisher;
pub mod readiness;
pub mod sensors;
pub mod transport;
pub mod watch;

pub use config::{ConfigError, MonitorConfig};
pub use error::{MonitorError, MonitorResult};
pub use readiness::{evaluate, BathStatus, ReadingsTable};
pub use sensors::{Reading, Sensor, TempRange};
pub use transport::{MqttSink, ReadingSink, TransportError};
