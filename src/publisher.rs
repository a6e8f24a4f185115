//! Synthetic temperature publisher
//!
//! Publishes one synthetic reading per sensor every interval, for exercising
//! a Water Status Monitor device against a live broker. Connection loss is
//! handled by a reconnect loop with bounded backoff rather than killing the
//! process.

use crate::config::MonitorConfig;
use crate::error::MonitorResult;
use crate::sensors::{Reading, Sensor};
use crate::transport::{mqtt, Backoff, MqttSink, ReadingSink};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rumqttc::{Event, EventLoop, Outgoing};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Publish loop options, resolved from CLI flags and config
#[derive(Debug, Clone, Copy)]
pub struct PublishOptions {
    /// Delay between publish rounds
    pub interval: Duration,
    /// Stop after this many rounds; None runs until Ctrl+C
    pub rounds: Option<u64>,
    /// Fixed RNG seed for a reproducible series
    pub seed: Option<u64>,
}

/// Outcome of a single broker session
enum SessionEnd {
    /// Requested number of rounds published
    Finished,
    /// Ctrl+C received
    Shutdown,
    /// Broker connection lost, caller should reconnect
    ConnectionLost,
}

/// Publish one synthetic reading per sensor, returning what was sent
pub async fn publish_round<S: ReadingSink>(
    sink: &S,
    rng: &mut StdRng,
) -> Result<Vec<Reading>, S::Error> {
    let mut published = Vec::with_capacity(Sensor::all().len());
    for sensor in Sensor::all() {
        let reading = Reading::synthetic(sensor, rng);
        sink.publish_reading(&reading).await?;
        published.push(reading);
    }
    Ok(published)
}

fn print_banner(config: &MonitorConfig, options: &PublishOptions) {
    println!("Water Status Monitor - MQTT Test Publisher");
    println!("{}", "=".repeat(50));
    println!("Broker: {}", config.broker.url);
    println!("Topics:");
    for sensor in Sensor::all() {
        println!("  - {:12} {}", sensor.label(), config.sensors.topic(sensor));
    }
    println!("{}", "=".repeat(50));
    println!(
        "Publishing temperature data every {} seconds{}",
        options.interval.as_secs(),
        match options.rounds {
            Some(n) => format!(" ({n} rounds)"),
            None => ", press Ctrl+C to stop".to_string(),
        }
    );
    println!();
}

/// Run the publisher until the requested rounds are done or Ctrl+C arrives
pub async fn run(config: &MonitorConfig, options: PublishOptions) -> MonitorResult<()> {
    print_banner(config, &options);

    if options.rounds == Some(0) {
        return Ok(());
    }

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut remaining = options.rounds;
    let mut backoff = Backoff::new();

    // Ctrl+C flips the shutdown flag; sessions watch for the change.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    loop {
        if *shutdown_rx.borrow() {
            return Ok(());
        }

        let (client, mut eventloop) = mqtt::connect("pub", config)?;
        if let Err(e) = mqtt::wait_for_connack(&mut eventloop, CONNECT_TIMEOUT).await {
            let delay = backoff.next_delay();
            warn!("Connection failed: {}. Retrying in {:?}", e, delay);
            tokio::time::sleep(delay).await;
            continue;
        }
        info!("Connected to MQTT broker");
        backoff.reset();

        // The event loop must keep being polled or the client stalls; errors
        // from it end the session.
        let (err_tx, err_rx) = watch::channel(false);
        let mut driver = tokio::spawn(drive_eventloop(eventloop, err_tx));

        let sink = MqttSink::new(client.clone(), config.sensors.clone());
        let end = run_session(
            &sink,
            &mut rng,
            &mut remaining,
            options.interval,
            shutdown_rx.clone(),
            err_rx,
        )
        .await;

        match end {
            SessionEnd::Finished | SessionEnd::Shutdown => {
                // Publish requests resolve once enqueued, not once sent. The
                // disconnect request queues behind them, and the driver keeps
                // polling until the DISCONNECT has gone out on the wire, so
                // every round reaches the broker before the process exits.
                if let Err(e) = client.disconnect().await {
                    warn!("Disconnect request failed: {}", e);
                }
                if tokio::time::timeout(FLUSH_TIMEOUT, &mut driver)
                    .await
                    .is_err()
                {
                    warn!("Timed out flushing outgoing messages");
                    driver.abort();
                }
                info!("Publisher stopped");
                return Ok(());
            }
            SessionEnd::ConnectionLost => {
                driver.abort();
                let delay = backoff.next_delay();
                warn!("Connection lost, reconnecting in {:?}", delay);
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Poll the event loop until the connection ends
///
/// Exits cleanly once the DISCONNECT is flushed; a broker-side drop flags
/// the error channel so the session can reconnect.
async fn drive_eventloop(mut eventloop: EventLoop, err_tx: watch::Sender<bool>) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("Disconnect flushed");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("MQTT event loop error: {}", e);
                let _ = err_tx.send(true);
                break;
            }
        }
    }
}

/// Publish rounds over one broker connection until it ends
async fn run_session<S: ReadingSink>(
    sink: &S,
    rng: &mut StdRng,
    remaining: &mut Option<u64>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    mut err_rx: watch::Receiver<bool>,
) -> SessionEnd {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    return SessionEnd::Shutdown;
                }
            }
            _ = err_rx.changed() => {
                return SessionEnd::ConnectionLost;
            }
            _ = ticker.tick() => {
                match publish_round(sink, rng).await {
                    Ok(readings) => {
                        for reading in &readings {
                            info!(
                                sensor = reading.sensor.label(),
                                celsius = %reading.payload(),
                                "Published reading"
                            );
                        }
                        if let Some(count) = remaining {
                            *count -= 1;
                            if *count == 0 {
                                return SessionEnd::Finished;
                            }
                        }
                    }
                    Err(e) => {
                        warn!("Publish round failed: {}", e);
                        return SessionEnd::ConnectionLost;
                    }
                }
            }
        }
    }
}
