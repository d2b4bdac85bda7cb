// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/brewsense-rs

//! Node wiring and the cooperative task harness.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{error, info};

use super::{epoch_ts, stop_channel, Hub, Watchdog};
use crate::config::Config;
use crate::detection::SensorBuffers;
use crate::display::ConsoleDisplay;
use crate::sensors::{
    DetectorSet, LocalSource, PowerSimulator, QueueSensorLink, RemoteSource, ScaleSimulator,
    SensorId, SensorLink,
};
use crate::streaming::{LogUplink, MqttSensorLink, MqttUplink, Uplink};
use crate::Result;

/// Demo scale level: a pot of coffee sitting on the sensor.
const DEMO_SCALE_GRAMS: f64 = 2500.0;
/// Demo scale noise, grams.
const DEMO_SCALE_NOISE: f64 = 5.0;
/// Demo smart plugs publish idle telemetry at this period.
const DEMO_POWER_PERIOD: Duration = Duration::from_secs(5);

/// The whole node: builds the hub and its adapters from configuration and
/// runs them as cooperative tasks until interrupted.
///
/// Every task is spawned on the current-thread `LocalSet`; the
/// run-to-completion reasoning in [`Hub`] depends on that, so `run` must be
/// driven from a single-threaded runtime.
pub struct SensorNode {
    config: Config,
    capture: Option<PathBuf>,
}

impl SensorNode {
    /// Node from configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            capture: None,
        }
    }

    /// Dump the scale's sample buffer to a CSV file on shutdown.
    pub fn capture_to(mut self, path: PathBuf) -> Self {
        self.capture = Some(path);
        self
    }

    /// Run until Ctrl-C (or a fatal configuration fault). Must be called
    /// inside a `tokio::task::LocalSet`.
    pub async fn run(self) -> Result<()> {
        let config = &self.config;
        info!(node = %config.node.sensor_id, "starting sensor node");

        let uplink: Rc<dyn Uplink> = if config.uplink.enabled {
            Rc::new(MqttUplink::connect(&config.uplink))
        } else {
            info!("uplink disabled, logging records instead");
            Rc::new(LogUplink)
        };
        let hub = Rc::new(RefCell::new(Hub::new(
            config,
            uplink,
            Box::new(ConsoleDisplay::new()),
        )));

        let (stop_handle, stop) = stop_channel();
        let mut tasks: JoinSet<Result<()>> = JoinSet::new();

        Hub::startup(&hub, epoch_ts()).await?;

        // The scale, read in-process. The hardware load-cell wrapper plugs
        // in here on the device; everywhere else the simulator stands in.
        let weight_id = SensorId::new(config.sensors.weight_sensor_id.clone());
        let scale = LocalSource::new(
            hub.clone(),
            weight_id,
            DetectorSet::Weight,
            SensorBuffers::scalar(
                config.sensors.sample_buffer_size,
                config.sensors.stats_buffer_size,
                config.sensors.stats_duration_secs,
            ),
            Box::new(ScaleSimulator::new(DEMO_SCALE_GRAMS, DEMO_SCALE_NOISE)),
            Duration::from_millis(config.sensors.read_period_ms),
            Duration::from_millis(config.sensors.min_sleep_ms),
            stop.clone(),
        )?;
        tasks.spawn_local(scale.run());

        // The smart plugs, delivered over the sensor link.
        for (sensor_id, set) in [
            (config.sensors.grind_sensor_id.clone(), DetectorSet::Grind),
            (config.sensors.brew_sensor_id.clone(), DetectorSet::Brew),
        ] {
            let sensor_id = SensorId::new(sensor_id);
            let link: Box<dyn SensorLink> = if config.link.enabled {
                Box::new(MqttSensorLink::subscribe(&config.link, &sensor_id))
            } else {
                let (tx, link) = QueueSensorLink::channel();
                tasks.spawn_local(
                    PowerSimulator::new(tx, DEMO_POWER_PERIOD, 0.0, stop.clone()).run(),
                );
                Box::new(link)
            };
            let source = RemoteSource::new(
                hub.clone(),
                sensor_id,
                set,
                SensorBuffers::payload(config.sensors.sample_buffer_size),
                link,
                stop.clone(),
            )?;
            tasks.spawn_local(source.run());
        }

        let watchdog = Watchdog::new(
            hub.clone(),
            Duration::from_secs(config.watchdog.period_secs),
            stop.clone(),
        );
        tasks.spawn_local(watchdog.run());

        spawn_interrupt_watcher(stop_handle.clone());

        // Join in completion order so one task's fatal fault stops the rest
        // instead of hanging behind a sibling that is still looping.
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!("task failed: {e}");
                    stop_handle.trigger();
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Err(e) => {
                    error!("task panicked: {e}");
                    stop_handle.trigger();
                }
            }
        }

        if let Some(path) = &self.capture {
            let hub_ref = hub.borrow();
            if let Ok(samples) = hub_ref.detector().weight_samples() {
                info!(path = %path.display(), "capturing scale samples");
                samples.save(path)?;
            }
        }

        info!("sensor node finished");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Turn Ctrl-C into the cooperative stop signal.
fn spawn_interrupt_watcher(stop_handle: super::StopHandle) {
    tokio::task::spawn_local(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping");
            stop_handle.trigger();
        }
    });
}
