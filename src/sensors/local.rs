// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/brewsense-rs

//! Locally attached sensor loop.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use super::{DetectorSet, Reading, ReadingSource, SensorId};
use crate::core::{epoch_ts, Hub, Stop};
use crate::detection::SensorBuffers;
use crate::Result;

/// Ingestion adapter for a sensor read synchronously in-process (the
/// scale).
///
/// Owns the reading collaborator and registers a `{samples, stats}` buffer
/// pair with the hub at construction. The loop reads one value, pushes it
/// through the hub, then sleeps `max(min_sleep, period - processing_time)`:
/// a self-correcting cadence that never produces a zero or negative sleep.
/// Overruns are logged but samples are never dropped or coalesced.
pub struct LocalSource {
    sensor_id: SensorId,
    hub: Rc<RefCell<Hub>>,
    source: Box<dyn ReadingSource>,
    period: Duration,
    min_sleep: Duration,
    stop: Stop,
}

impl LocalSource {
    /// Register the sensor's buffers and build the adapter.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        hub: Rc<RefCell<Hub>>,
        sensor_id: SensorId,
        set: DetectorSet,
        buffers: SensorBuffers,
        source: Box<dyn ReadingSource>,
        period: Duration,
        min_sleep: Duration,
        stop: Stop,
    ) -> Result<Self> {
        hub.borrow_mut().register(sensor_id.clone(), set, buffers)?;
        Ok(Self {
            sensor_id,
            hub,
            source,
            period,
            min_sleep,
            stop,
        })
    }

    /// Run until the stop signal is observed between iterations.
    pub async fn run(mut self) -> Result<()> {
        info!(sensor = %self.sensor_id, period = ?self.period, "local source started");
        while !self.stop.is_set() {
            let started = Instant::now();

            match self.source.get_value() {
                Ok(value) => {
                    let ts = epoch_ts();
                    self.hub
                        .borrow_mut()
                        .ingest(ts, &self.sensor_id, Reading::Weight(value))?;
                    Hub::on_reading(&self.hub, ts, &self.sensor_id).await?;
                }
                Err(e) => {
                    warn!(sensor = %self.sensor_id, "read failed, skipping tick: {e}");
                }
            }

            let elapsed = started.elapsed();
            if elapsed > self.period {
                warn!(
                    sensor = %self.sensor_id,
                    ?elapsed,
                    "tick overran the read period"
                );
            }
            let sleep = self.period.saturating_sub(elapsed).max(self.min_sleep);
            tokio::select! {
                biased;
                _ = self.stop.wait() => break,
                _ = tokio::time::sleep(sleep) => {}
            }
        }
        info!(sensor = %self.sensor_id, "local source finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::config::Config;
    use crate::core::stop_channel;
    use crate::detection::EventRecord;
    use crate::display::ConsoleDisplay;
    use crate::sensors::ScaleSimulator;
    use crate::streaming::Uplink;

    struct SilentUplink;

    #[async_trait(?Send)]
    impl Uplink for SilentUplink {
        async fn put(&self, _topic: &str, _record: &EventRecord) -> Result<()> {
            Ok(())
        }
    }

    fn test_hub() -> Rc<RefCell<Hub>> {
        Rc::new(RefCell::new(Hub::new(
            &Config::default(),
            Rc::new(SilentUplink),
            Box::new(ConsoleDisplay::new()),
        )))
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_cadence_and_stop() {
        let hub = test_hub();
        let (handle, stop) = stop_channel();
        let config = Config::default();
        let weight_id = SensorId::new(config.sensors.weight_sensor_id.clone());

        let source = LocalSource::new(
            hub.clone(),
            weight_id.clone(),
            DetectorSet::Weight,
            SensorBuffers::scalar(1000, 1000, 1.0),
            Box::new(ScaleSimulator::steady(2500.0)),
            Duration::from_millis(100),
            Duration::from_millis(10),
            stop,
        )
        .unwrap();

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let task = tokio::task::spawn_local(source.run());
                tokio::time::sleep(Duration::from_secs(1)).await;
                handle.trigger();
                task.await.unwrap().unwrap();
            })
            .await;

        // Instant reads plus a 100 ms sleep per iteration under paused time:
        // one tick per period over the one-second run, give or take the
        // stop-aligned final iteration.
        let hub_ref = hub.borrow();
        let samples = hub_ref.detector().weight_samples().unwrap().len();
        assert!((9..=11).contains(&samples), "got {samples} ticks");
    }
}
