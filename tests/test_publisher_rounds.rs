//! Publish-round behavior against a recording sink
//!
//! Exercises the publish loop's core without a broker: every round sends one
//! reading per sensor, values stay inside the synthetic ranges, and sink
//! failures surface as errors.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use watermon::publisher::publish_round;
use watermon::sensors::{Reading, Sensor};
use watermon::transport::ReadingSink;

#[derive(Debug, thiserror::Error)]
#[error("sink refused the reading")]
struct SinkRefused;

/// Records readings; optionally fails from the nth publish onward
struct RecordingSink {
    readings: Mutex<Vec<Reading>>,
    published: AtomicUsize,
    fail_from: Option<usize>,
}

impl RecordingSink {
    fn new() -> Self {
        Self {
            readings: Mutex::new(Vec::new()),
            published: AtomicUsize::new(0),
            fail_from: None,
        }
    }

    fn failing_from(n: usize) -> Self {
        Self {
            fail_from: Some(n),
            ..Self::new()
        }
    }
}

#[async_trait::async_trait]
impl ReadingSink for RecordingSink {
    type Error = SinkRefused;

    async fn publish_reading(&self, reading: &Reading) -> Result<(), SinkRefused> {
        let seen = self.published.fetch_add(1, Ordering::SeqCst);
        if let Some(fail_from) = self.fail_from {
            if seen >= fail_from {
                return Err(SinkRefused);
            }
        }
        self.readings.lock().await.push(reading.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_round_publishes_one_reading_per_sensor() {
    let sink = RecordingSink::new();
    let mut rng = StdRng::seed_from_u64(1);

    let published = publish_round(&sink, &mut rng).await.unwrap();

    let sensors: Vec<Sensor> = published.iter().map(|r| r.sensor).collect();
    assert_eq!(sensors, Sensor::all().to_vec());

    let recorded = sink.readings.lock().await;
    assert_eq!(recorded.len(), Sensor::all().len());
    assert_eq!(*recorded, published);
}

#[tokio::test]
async fn test_round_values_stay_in_sensor_ranges() {
    let sink = RecordingSink::new();
    let mut rng = StdRng::from_entropy();

    for _ in 0..50 {
        let published = publish_round(&sink, &mut rng).await.unwrap();
        for reading in published {
            let range = reading.sensor.synthetic_range();
            assert!(
                range.contains(reading.celsius),
                "{} reading {} outside [{}, {}]",
                reading.sensor.label(),
                reading.celsius,
                range.low,
                range.high
            );
        }
    }
}

#[tokio::test]
async fn test_seeded_rounds_are_reproducible() {
    let sink_a = RecordingSink::new();
    let sink_b = RecordingSink::new();
    let mut rng_a = StdRng::seed_from_u64(42);
    let mut rng_b = StdRng::seed_from_u64(42);

    let round_a = publish_round(&sink_a, &mut rng_a).await.unwrap();
    let round_b = publish_round(&sink_b, &mut rng_b).await.unwrap();

    let temps_a: Vec<f64> = round_a.iter().map(|r| r.celsius).collect();
    let temps_b: Vec<f64> = round_b.iter().map(|r| r.celsius).collect();
    assert_eq!(temps_a, temps_b);
}

#[tokio::test]
async fn test_sink_failure_propagates() {
    // Fails on the third sensor of the round
    let sink = RecordingSink::failing_from(2);
    let mut rng = StdRng::seed_from_u64(7);

    let result = publish_round(&sink, &mut rng).await;
    assert!(result.is_err());

    // The two readings before the failure were still delivered
    let recorded = sink.readings.lock().await;
    assert_eq!(recorded.len(), 2);
}
