//! Bath-readiness evaluation
//!
//! The bath counts as ready when both the tank and the out pipe are at or
//! above their configured minimum temperatures. A sensor that has not
//! reported yet, or reports 0.0 (the device's "no data" marker), keeps the
//! status at STOP.

use crate::config::ThresholdSection;
use crate::sensors::{Reading, Sensor};
use std::collections::HashMap;

/// Latest reading per sensor
#[derive(Debug, Default, Clone)]
pub struct ReadingsTable {
    latest: HashMap<Sensor, Reading>,
}

impl ReadingsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reading, replacing any previous one for the same sensor
    pub fn insert(&mut self, reading: Reading) {
        self.latest.insert(reading.sensor, reading);
    }

    pub fn get(&self, sensor: Sensor) -> Option<&Reading> {
        self.latest.get(&sensor)
    }

    /// Temperature for a sensor, with 0.0 treated as missing data
    fn temperature(&self, sensor: Sensor) -> Option<f64> {
        self.latest
            .get(&sensor)
            .map(|r| r.celsius)
            .filter(|&c| c != 0.0)
    }
}

/// Result of a readiness evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BathStatus {
    pub ready: bool,
    pub tank: Option<f64>,
    pub out_pipe: Option<f64>,
}

impl BathStatus {
    pub fn label(&self) -> &'static str {
        if self.ready {
            "READY"
        } else {
            "STOP"
        }
    }
}

/// Evaluate bath readiness against the configured thresholds
pub fn evaluate(table: &ReadingsTable, thresholds: &ThresholdSection) -> BathStatus {
    let tank = table.temperature(Sensor::Tank);
    let out_pipe = table.temperature(Sensor::OutPipe);

    let ready = matches!(
        (tank, out_pipe),
        (Some(t), Some(o)) if t >= thresholds.min_tank_temp && o >= thresholds.min_out_pipe_temp
    );

    BathStatus {
        ready,
        tank,
        out_pipe,
    }
}
