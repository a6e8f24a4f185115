//! Live monitor for sensor traffic
//!
//! Subscribes to every sensor topic, tracks the latest reading per sensor,
//! and prints each message together with the current bath-readiness verdict.

use crate::config::{MonitorConfig, ThresholdSection};
use crate::error::MonitorResult;
use crate::readiness::{evaluate, BathStatus, ReadingsTable};
use crate::sensors::Reading;
use crate::transport::{mqtt, Backoff};
use rumqttc::{Event, Outgoing, Packet};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_TIMEOUT: Duration = Duration::from_millis(100);
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

const RESET: &str = "\x1b[0m";
const CYAN: &str = "\x1b[1;36m";
const YELLOW: &str = "\x1b[1;33m";
const GREEN: &str = "\x1b[1;32m";
const RED: &str = "\x1b[1;31m";

/// Output formatting options
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum WatchFormat {
    /// Color-coded, human-readable (default)
    Pretty,
    /// Single line per message, minimal formatting
    Compact,
    /// JSON output for programmatic processing
    Json,
}

/// Render one received reading plus the readiness verdict
fn render_line(
    format: WatchFormat,
    reading: &Reading,
    status: &BathStatus,
    thresholds: &ThresholdSection,
) -> String {
    let timestamp = reading.timestamp.format("%H:%M:%S");

    match format {
        WatchFormat::Json => serde_json::json!({
            "timestamp": reading.timestamp.to_rfc3339(),
            "sensor": reading.sensor.label(),
            "celsius": reading.celsius,
            "bath_ready": status.ready,
            "tank": status.tank,
            "out_pipe": status.out_pipe,
        })
        .to_string(),
        WatchFormat::Compact => format!(
            "{} {:12} {:5.1}C bath={}",
            timestamp,
            reading.sensor.label(),
            reading.celsius,
            status.label()
        ),
        WatchFormat::Pretty => {
            let status_color = if status.ready { GREEN } else { RED };
            let tank = status
                .tank
                .map_or("--.-".to_string(), |t| format!("{t:.1}"));
            let out_pipe = status
                .out_pipe
                .map_or("--.-".to_string(), |t| format!("{t:.1}"));
            format!(
                "{status_color}[{}]{RESET} {timestamp} {CYAN}{:12}{RESET} {YELLOW}{:5.1}°C{RESET}  (tank {tank}/{:.1}, outpipe {out_pipe}/{:.1})",
                status.label(),
                reading.sensor.label(),
                reading.celsius,
                thresholds.min_tank_temp,
                thresholds.min_out_pipe_temp,
            )
        }
    }
}

/// Watch sensor traffic until Ctrl+C
pub async fn run(config: &MonitorConfig, format: WatchFormat) -> MonitorResult<()> {
    info!(
        broker = %config.broker.url,
        prefix = %config.sensors.prefix,
        "Watching sensor topics"
    );

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let mut table = ReadingsTable::new();
    let mut backoff = Backoff::new();

    loop {
        if *shutdown_rx.borrow() {
            return Ok(());
        }

        let (client, mut eventloop) = mqtt::connect("watch", config)?;
        if let Err(e) = mqtt::wait_for_connack(&mut eventloop, CONNECT_TIMEOUT).await {
            let delay = backoff.next_delay();
            warn!("Connection failed: {}. Retrying in {:?}", e, delay);
            tokio::time::sleep(delay).await;
            continue;
        }
        info!("Connected to MQTT broker");

        if let Err(e) = mqtt::subscribe_sensors(&client, &config.sensors).await {
            let delay = backoff.next_delay();
            warn!("Subscription failed: {}. Retrying in {:?}", e, delay);
            tokio::time::sleep(delay).await;
            continue;
        }
        backoff.reset();

        // Session loop; polls with a timeout so shutdown is checked often.
        loop {
            if *shutdown_rx.borrow() {
                // Keep polling until the DISCONNECT is flushed.
                if client.disconnect().await.is_ok() {
                    let drain = async {
                        loop {
                            match eventloop.poll().await {
                                Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                                Ok(_) => {}
                            }
                        }
                    };
                    let _ = tokio::time::timeout(DISCONNECT_TIMEOUT, drain).await;
                }
                return Ok(());
            }

            let poll_result = tokio::time::timeout(POLL_TIMEOUT, eventloop.poll()).await;
            match poll_result {
                Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => {
                    let payload = String::from_utf8_lossy(&publish.payload);
                    handle_message(
                        config,
                        format,
                        &mut table,
                        &publish.topic,
                        &payload,
                    );
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    warn!("MQTT connection lost: {}", e);
                    break;
                }
                Err(_) => continue, // poll timeout, re-check shutdown
            }
        }

        let delay = backoff.next_delay();
        warn!("Reconnecting in {:?}", delay);
        tokio::time::sleep(delay).await;
    }
}

fn handle_message(
    config: &MonitorConfig,
    format: WatchFormat,
    table: &mut ReadingsTable,
    topic: &str,
    payload: &str,
) {
    let Some(sensor) = config.sensors.sensor_for_topic(topic) else {
        return;
    };

    let reading = match Reading::parse_payload(sensor, payload) {
        Ok(reading) => reading,
        Err(e) => {
            warn!(topic = %topic, "Skipping unparseable payload: {}", e);
            return;
        }
    };

    table.insert(reading.clone());
    let status = evaluate(table, &config.thresholds);
    println!("{}", render_line(format, &reading, &status, &config.thresholds));
}
