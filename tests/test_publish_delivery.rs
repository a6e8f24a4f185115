//! Wire-level delivery tests for the publisher
//!
//! Publish requests resolve once enqueued with the client, so exiting
//! without flushing would report success with nothing on the wire. These
//! tests stand up a minimal in-process MQTT broker and assert that every
//! requested round actually arrives before `publish --count N` returns.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use watermon::config::MonitorConfig;
use watermon::publisher::{self, PublishOptions};
use watermon::sensors::Sensor;

/// What the broker stub observed on the wire
#[derive(Debug, Default)]
struct BrokerLog {
    publish_topics: Vec<String>,
    disconnect_seen: bool,
}

/// Minimal MQTT 3.1.1 broker for one client: acks the connect, acks QoS 1
/// publishes, and records traffic until the client disconnects.
async fn serve_one_client(listener: TcpListener, log: Arc<Mutex<BrokerLog>>) {
    let (mut stream, _) = listener.accept().await.expect("client connects");
    let mut buffer: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        let Some(packet) = take_packet(&mut buffer) else {
            let n = stream.read(&mut chunk).await.expect("socket read");
            if n == 0 {
                return;
            }
            buffer.extend_from_slice(&chunk[..n]);
            continue;
        };

        match packet[0] >> 4 {
            // CONNECT: accept, no stored session
            1 => stream
                .write_all(&[0x20, 0x02, 0x00, 0x00])
                .await
                .expect("connack write"),
            // PUBLISH: record the topic, ack QoS 1
            3 => {
                let (topic, pkid) = parse_publish(&packet);
                log.lock().unwrap().publish_topics.push(topic);
                if let Some(pkid) = pkid {
                    let puback = [0x40, 0x02, (pkid >> 8) as u8, pkid as u8];
                    stream.write_all(&puback).await.expect("puback write");
                }
            }
            // PINGREQ
            12 => stream.write_all(&[0xd0, 0x00]).await.expect("pingresp write"),
            // DISCONNECT
            14 => {
                log.lock().unwrap().disconnect_seen = true;
                return;
            }
            _ => {}
        }
    }
}

/// Pop one complete packet (fixed header + body) off the front of the buffer
fn take_packet(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let mut remaining: usize = 0;
    let mut multiplier: usize = 1;
    let mut header_len = 1;
    for i in 1..=4 {
        let byte = *buffer.get(i)?;
        remaining += (byte as usize & 0x7f) * multiplier;
        multiplier *= 128;
        header_len = i + 1;
        if byte & 0x80 == 0 {
            break;
        }
    }
    let total = header_len + remaining;
    if buffer.len() < total {
        return None;
    }
    Some(buffer.drain(..total).collect())
}

/// Topic and packet id (QoS > 0 only) of a PUBLISH packet
fn parse_publish(packet: &[u8]) -> (String, Option<u16>) {
    let qos = (packet[0] >> 1) & 0x03;
    let mut i = 1;
    while packet[i] & 0x80 != 0 {
        i += 1;
    }
    i += 1;
    let topic_len = ((packet[i] as usize) << 8) | packet[i + 1] as usize;
    let topic = String::from_utf8_lossy(&packet[i + 2..i + 2 + topic_len]).to_string();
    let pkid = (qos > 0).then(|| {
        let j = i + 2 + topic_len;
        ((packet[j] as u16) << 8) | packet[j + 1] as u16
    });
    (topic, pkid)
}

fn config_for_port(port: u16) -> MonitorConfig {
    let toml_content = format!(
        r#"
[broker]
url = "mqtt://127.0.0.1:{port}"
"#
    );
    toml::from_str(&toml_content).expect("valid config")
}

#[tokio::test]
async fn test_count_rounds_reach_the_broker_before_exit() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let log = Arc::new(Mutex::new(BrokerLog::default()));
    let broker = tokio::spawn(serve_one_client(listener, log.clone()));

    let config = config_for_port(port);
    let options = PublishOptions {
        interval: Duration::from_millis(20),
        rounds: Some(2),
        seed: Some(11),
    };
    tokio::time::timeout(Duration::from_secs(15), publisher::run(&config, options))
        .await
        .expect("publisher exits within the deadline")
        .expect("publisher succeeds");

    // The stub exits on DISCONNECT, so by here all traffic is recorded.
    tokio::time::timeout(Duration::from_secs(5), broker)
        .await
        .expect("broker stub sees the disconnect")
        .expect("broker stub does not panic");

    let log = log.lock().unwrap();
    assert!(log.disconnect_seen, "client should disconnect cleanly");
    assert_eq!(
        log.publish_topics.len(),
        2 * Sensor::all().len(),
        "every round must be on the wire before exit, got topics: {:?}",
        log.publish_topics
    );
    assert!(log
        .publish_topics
        .contains(&"home/water/tank/temperature".to_string()));
    assert!(log
        .publish_topics
        .contains(&"home/water/heating/out/temperature".to_string()));
}
