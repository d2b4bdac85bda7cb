// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/brewsense-rs

//! MQTT transport: the platform uplink and the remote-sensor subscription.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::Uplink;
use crate::config::{LinkConfig, UplinkConfig};
use crate::detection::EventRecord;
use crate::sensors::{SensorId, SensorLink};

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);
const CHANNEL_CAPACITY: usize = 100;

/// MQTT uplink to the platform broker.
///
/// The rumqttc event loop runs as its own local task; publishing is
/// fire-and-forget at QoS 1.
pub struct MqttUplink {
    client: AsyncClient,
}

impl MqttUplink {
    /// Connect to the configured broker. Must run inside a `LocalSet`; the
    /// event loop task is spawned locally.
    pub fn connect(config: &UplinkConfig) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(KEEP_ALIVE);

        let (client, mut eventloop) = AsyncClient::new(options, CHANNEL_CAPACITY);
        let broker = format!("{}:{}", config.host, config.port);
        tokio::task::spawn_local(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!(%broker, "uplink connected");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(%broker, "uplink connection error: {e}");
                        tokio::time::sleep(RECONNECT_BACKOFF).await;
                    }
                }
            }
        });

        Self { client }
    }
}

#[async_trait(?Send)]
impl Uplink for MqttUplink {
    async fn put(&self, topic: &str, record: &EventRecord) -> crate::Result<()> {
        let payload =
            serde_json::to_vec(record).map_err(|e| crate::Error::Uplink(e.to_string()))?;
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| crate::Error::Uplink(e.to_string()))
    }
}

/// Inbound message stream from one remote sensor.
///
/// Subscribes to the sensor's Tasmota telemetry topic (`<id>/tele/SENSOR`)
/// and queues raw payload text for the owning `RemoteSource`. Subscription
/// is (re)issued on every ConnAck so a broker reconnect picks the topic
/// back up.
pub struct MqttSensorLink {
    rx: mpsc::UnboundedReceiver<String>,
}

impl MqttSensorLink {
    /// Connect and subscribe for `sensor_id`. Must run inside a `LocalSet`.
    pub fn subscribe(config: &LinkConfig, sensor_id: &SensorId) -> Self {
        let client_id = format!("{}-{}", config.client_id, sensor_id);
        let mut options = MqttOptions::new(client_id, &config.host, config.port);
        options.set_keep_alive(KEEP_ALIVE);

        let (client, mut eventloop) = AsyncClient::new(options, CHANNEL_CAPACITY);
        let (tx, rx) = mpsc::unbounded_channel();
        let topic = format!("{sensor_id}/tele/SENSOR");

        tokio::task::spawn_local(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!(%topic, "sensor link connected, subscribing");
                        if let Err(e) = client.subscribe(&topic, QoS::AtMostOnce).await {
                            warn!(%topic, "subscribe failed: {e}");
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        debug!(topic = %publish.topic, "sensor link message");
                        let text = String::from_utf8_lossy(&publish.payload).into_owned();
                        if tx.send(text).is_err() {
                            // Receiver gone: the source has shut down.
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(%topic, "sensor link connection error: {e}");
                        tokio::time::sleep(RECONNECT_BACKOFF).await;
                    }
                }
            }
        });

        Self { rx }
    }
}

#[async_trait(?Send)]
impl SensorLink for MqttSensorLink {
    async fn next(&mut self) -> crate::Result<String> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| crate::Error::Link("mqtt sensor link closed".into()))
    }
}
