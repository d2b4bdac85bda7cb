// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/brewsense-rs

//! Simulated sensors for demo mode and tests.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::mpsc;
use tracing::info;

use super::{ReadingSource, SensorLink};
use crate::core::Stop;

/// Simulated scale: a settable level plus load-cell noise.
pub struct ScaleSimulator {
    level: f64,
    noise: f64,
    rng: rand::rngs::ThreadRng,
}

impl ScaleSimulator {
    /// Scale holding `level` grams with a few grams of jitter.
    pub fn new(level: f64, noise: f64) -> Self {
        Self {
            level,
            noise,
            rng: rand::thread_rng(),
        }
    }

    /// Noise-free scale pinned at `level` grams (deterministic tests).
    pub fn steady(level: f64) -> Self {
        Self::new(level, 0.0)
    }

    /// Move the simulated pot weight (scripted demos).
    pub fn set_level(&mut self, level: f64) {
        self.level = level;
    }
}

impl ReadingSource for ScaleSimulator {
    fn get_value(&mut self) -> crate::Result<f64> {
        let jitter = if self.noise > 0.0 {
            (self.rng.gen::<f64>() - 0.5) * 2.0 * self.noise
        } else {
            0.0
        };
        Ok(self.level + jitter)
    }
}

/// Channel-backed sensor link: whatever is sent into the channel arrives as
/// inbound messages. Stands in for the MQTT subscription in demo mode and
/// tests.
pub struct QueueSensorLink {
    rx: mpsc::UnboundedReceiver<String>,
}

impl QueueSensorLink {
    /// Create the link and the sender that feeds it.
    pub fn channel() -> (mpsc::UnboundedSender<String>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }
}

#[async_trait(?Send)]
impl SensorLink for QueueSensorLink {
    async fn next(&mut self) -> crate::Result<String> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| crate::Error::Link("queue sensor link closed".into()))
    }
}

/// Demo feeder for a [`QueueSensorLink`]: publishes idle Tasmota-style
/// telemetry on a fixed period until stopped.
pub struct PowerSimulator {
    tx: mpsc::UnboundedSender<String>,
    period: Duration,
    power: f64,
    stop: Stop,
}

impl PowerSimulator {
    /// Feeder publishing `power` watts every `period`.
    pub fn new(tx: mpsc::UnboundedSender<String>, period: Duration, power: f64, stop: Stop) -> Self {
        Self {
            tx,
            period,
            power,
            stop,
        }
    }

    /// Run until stopped or the consuming link goes away.
    pub async fn run(mut self) -> crate::Result<()> {
        info!(period = ?self.period, "power simulator started");
        loop {
            let message = serde_json::json!({ "ENERGY": { "Power": self.power } }).to_string();
            if self.tx.send(message).is_err() {
                break;
            }
            tokio::select! {
                biased;
                _ = self.stop.wait() => break,
                _ = tokio::time::sleep(self.period) => {}
            }
        }
        info!("power simulator finished");
        Ok(())
    }
}
