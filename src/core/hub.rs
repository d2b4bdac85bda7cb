// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/brewsense-rs

//! The hub: ingestion, detection dispatch, enrichment and routing.
//!
//! The hub is the single mutation path into the sensor registry and the
//! status cache. On the single-threaded cooperative runtime every call
//! completes its mutation before the first `.await` (records to publish are
//! collected and the uplink handle cloned out first), so no other task can
//! observe the registry or cache mid-update - the run-to-completion
//! guarantee that replaces locks. `Hub` lives in an `Rc<RefCell<..>>`; no
//! borrow is ever held across a suspension point.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::buffers::Sample;
use crate::config::Config;
use crate::detection::{
    round_grams, Event, EventCode, EventDetector, EventRecord, NewPotStatus, SensorBuffers,
};
use crate::display::Display;
use crate::sensors::{DetectorSet, Reading, SensorId};
use crate::streaming::Uplink;
use crate::Result;

/// Last-known pot and appliance state, overwritten by the latest matching
/// event and read by the watchdog heartbeat.
#[derive(Debug, Default)]
pub struct StatusCache {
    /// Latest NEW event.
    pub new_pot: Option<Sample<Event>>,
    /// Latest grinder event (activity or heartbeat).
    pub grind: Option<Sample<Event>>,
    /// Latest brewer event (activity or heartbeat).
    pub brew: Option<Sample<Event>>,
}

/// Owns the detector and the outbound collaborators; enriches and routes
/// everything the detector produces.
pub struct Hub {
    node_id: String,
    node_type: String,
    detector: EventDetector,
    uplink: Rc<dyn Uplink>,
    display: Box<dyn Display>,
    status: StatusCache,
}

impl Hub {
    /// Build a hub from the node configuration and its collaborators.
    pub fn new(config: &Config, uplink: Rc<dyn Uplink>, display: Box<dyn Display>) -> Self {
        let detector = EventDetector::new(
            config.detector,
            SensorId::new(config.sensors.weight_sensor_id.clone()),
            config.sensors.event_buffer_size,
        );
        Self {
            node_id: config.node.sensor_id.clone(),
            node_type: config.node.sensor_type.clone(),
            detector,
            uplink,
            display,
            status: StatusCache::default(),
        }
    }

    /// Register an adapter's buffers. Called once per adapter at
    /// construction; entries live for the process lifetime.
    pub fn register(&mut self, id: SensorId, set: DetectorSet, buffers: SensorBuffers) -> Result<()> {
        info!(sensor = %id, ?set, "registering sensor buffers");
        self.detector.register(id, set, buffers)
    }

    /// Push one reading into a registered sensor's buffers.
    pub fn ingest(&mut self, ts: f64, id: &SensorId, reading: Reading) -> Result<()> {
        self.detector.ingest(ts, id, reading)
    }

    /// Read access to the status cache (heartbeat tests and diagnostics).
    pub fn status(&self) -> &StatusCache {
        &self.status
    }

    /// Read access to the detector and its buffers.
    pub fn detector(&self) -> &EventDetector {
        &self.detector
    }

    /// Handle one sensor tick: run the detector battery, update the cache,
    /// enrich and forward.
    ///
    /// Everything that mutates shared state happens synchronously inside
    /// one `borrow_mut` scope; only the fire-and-forget publishes are
    /// awaited, after the borrow is released.
    pub async fn on_reading(hub: &Rc<RefCell<Hub>>, ts: f64, id: &SensorId) -> Result<()> {
        let (uplink, topic, records) = {
            let mut this = hub.borrow_mut();
            let records = this.process_reading(ts, id)?;
            (this.uplink.clone(), this.node_id.clone(), records)
        };
        for record in records {
            if let Err(e) = uplink.put(&topic, &record).await {
                warn!(%topic, "uplink publish failed: {e}");
            }
        }
        Ok(())
    }

    /// Publish the startup event.
    pub async fn startup(hub: &Rc<RefCell<Hub>>, ts: f64) -> Result<()> {
        let (uplink, topic, record) = {
            let this = hub.borrow();
            (
                this.uplink.clone(),
                this.node_id.clone(),
                this.envelope(ts, EventCode::Startup, 1.0),
            )
        };
        info!(%topic, "node startup");
        if let Err(e) = uplink.put(&topic, &record).await {
            warn!(%topic, "startup publish failed: {e}");
        }
        Ok(())
    }

    /// Publish the periodic status heartbeat: the latest two-second weight
    /// median plus the cached pot/appliance summaries. Independent of any
    /// state-change detection.
    pub async fn watchdog(hub: &Rc<RefCell<Hub>>, ts: f64) -> Result<()> {
        let (uplink, topic, record) = {
            let this = hub.borrow();
            (this.uplink.clone(), this.node_id.clone(), this.status_record(ts))
        };
        debug!(%topic, "watchdog heartbeat");
        if let Err(e) = uplink.put(&topic, &record).await {
            warn!(%topic, "watchdog publish failed: {e}");
        }
        Ok(())
    }

    /// The synchronous half of a tick: detect, cache, enrich. Returns the
    /// records to publish.
    fn process_reading(&mut self, ts: f64, id: &SensorId) -> Result<Vec<EventRecord>> {
        let events = self.detector.test(ts, id)?;

        let mut records = Vec::with_capacity(events.len());
        for event in events {
            self.cache_status(ts, &event);

            // Telemetry heartbeats stop at the cache; they are not
            // individually forwarded.
            if event.code.is_telemetry() {
                continue;
            }

            self.display.update_event(ts, &event);
            if event.code == EventCode::New {
                self.display.update_new(ts);
            }
            records.push(self.enrich(ts, event));
        }

        if self.detector.is_weight_sensor(id) {
            if let Ok(samples) = self.detector.weight_samples() {
                self.display.update(ts, samples);
            }
        }
        Ok(records)
    }

    fn cache_status(&mut self, ts: f64, event: &Event) {
        let slot = match event.code {
            EventCode::New => &mut self.status.new_pot,
            EventCode::Grinding | EventCode::GrindStatus => &mut self.status.grind,
            EventCode::Brewing | EventCode::BrewStatus => &mut self.status.brew,
            _ => return,
        };
        *slot = Some(Sample {
            ts,
            value: event.clone(),
        });
    }

    /// Wrap an event in the platform envelope, backfilling the weight from
    /// the scale statistics when the event carries none and attaching the
    /// cached new-pot status.
    fn enrich(&self, ts: f64, event: Event) -> EventRecord {
        let weight = event
            .weight
            .or_else(|| self.detector.latest_stats_median().map(round_grams));
        EventRecord {
            event_code: event.code,
            weight,
            weight_poured: event.weight_poured,
            power: event.power,
            value: event.payload.as_ref().map(|p| p.to_value()),
            new_pot: self.new_pot_status(),
            acp_confidence: event.confidence,
            acp_ts: ts,
            acp_id: self.node_id.clone(),
            acp_type: self.node_type.clone(),
        }
    }

    /// Minimal envelope for node-level events (startup).
    fn envelope(&self, ts: f64, code: EventCode, confidence: f64) -> EventRecord {
        EventRecord {
            event_code: code,
            weight: None,
            weight_poured: None,
            power: None,
            value: None,
            new_pot: None,
            acp_confidence: confidence,
            acp_ts: ts,
            acp_id: self.node_id.clone(),
            acp_type: self.node_type.clone(),
        }
    }

    fn new_pot_status(&self) -> Option<NewPotStatus> {
        self.status.new_pot.as_ref().map(|sample| NewPotStatus {
            ts: sample.ts,
            weight: sample.value.weight,
        })
    }

    fn status_record(&self, ts: f64) -> EventRecord {
        let weight = self.detector.weight_median(2.0).map(round_grams);
        if weight.is_none() {
            debug!("status heartbeat without weight (scale not warmed up)");
        }
        let value = serde_json::json!({
            "new_pot": Self::summarize(&self.status.new_pot),
            "grind": Self::summarize(&self.status.grind),
            "brew": Self::summarize(&self.status.brew),
        });
        EventRecord {
            event_code: EventCode::Status,
            weight,
            weight_poured: None,
            power: None,
            value: Some(value),
            new_pot: self.new_pot_status(),
            acp_confidence: 1.0,
            acp_ts: ts,
            acp_id: self.node_id.clone(),
            acp_type: self.node_type.clone(),
        }
    }

    fn summarize(slot: &Option<Sample<Event>>) -> serde_json::Value {
        match slot {
            None => serde_json::Value::Null,
            Some(sample) => serde_json::json!({
                "ts": sample.ts,
                "event_code": sample.value.code,
                "weight": sample.value.weight,
                "power": sample.value.power,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use std::time::Duration;

    use crate::sensors::Payload;

    /// Uplink that records everything it is handed.
    #[derive(Default)]
    struct RecordingUplink {
        records: RefCell<Vec<(String, EventRecord)>>,
        delay: Option<Duration>,
    }

    #[async_trait(?Send)]
    impl Uplink for RecordingUplink {
        async fn put(&self, topic: &str, record: &EventRecord) -> Result<()> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.records
                .borrow_mut()
                .push((topic.to_string(), record.clone()));
            Ok(())
        }
    }

    struct NullDisplay;
    impl Display for NullDisplay {
        fn update(&mut self, _ts: f64, _buffer: &crate::SampleBuffer<f64>) {}
        fn update_new(&mut self, _ts: f64) {}
        fn update_event(&mut self, _ts: f64, _event: &Event) {}
    }

    fn hub_with(delay: Option<Duration>) -> (Rc<RefCell<Hub>>, Rc<RecordingUplink>) {
        let uplink = Rc::new(RecordingUplink {
            records: RefCell::new(Vec::new()),
            delay,
        });
        let config = Config::default();
        let uplink_dyn: Rc<dyn Uplink> = uplink.clone();
        let mut hub = Hub::new(&config, uplink_dyn, Box::new(NullDisplay));

        let weight = SensorId::new(config.sensors.weight_sensor_id.clone());
        hub.register(weight, DetectorSet::Weight, SensorBuffers::scalar(1000, 1000, 1.0))
            .unwrap();
        let grind = SensorId::new(config.sensors.grind_sensor_id.clone());
        hub.register(grind, DetectorSet::Grind, SensorBuffers::payload(100))
            .unwrap();
        let brew = SensorId::new(config.sensors.brew_sensor_id.clone());
        hub.register(brew, DetectorSet::Brew, SensorBuffers::payload(100))
            .unwrap();

        (Rc::new(RefCell::new(hub)), uplink)
    }

    /// Feed a steady weight at 10 Hz so the statistics buffer warms up.
    async fn warm_scale(hub: &Rc<RefCell<Hub>>, ticks: u64, value: f64) {
        let id = SensorId::new(Config::default().sensors.weight_sensor_id);
        for tick in 0..ticks {
            let ts = tick as f64 * 0.1;
            hub.borrow_mut()
                .ingest(ts, &id, Reading::Weight(value))
                .unwrap();
            Hub::on_reading(hub, ts, &id).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_enrichment_backfills_weight_and_stamps_envelope() {
        let (hub, uplink) = hub_with(None);
        warm_scale(&hub, 30, 2500.0).await;

        let grind = SensorId::new(Config::default().sensors.grind_sensor_id);
        let ts = 3.0;
        hub.borrow_mut()
            .ingest(
                ts,
                &grind,
                Reading::Power(Payload::decode(r#"{"ENERGY":{"Power":1450}}"#)),
            )
            .unwrap();
        Hub::on_reading(&hub, ts, &grind).await.unwrap();

        let records = uplink.records.borrow();
        let (topic, record) = records.last().unwrap();
        assert_eq!(topic, "csn-node-test");
        assert_eq!(record.event_code, EventCode::Grinding);
        assert_eq!(record.power, Some(1450.0));
        // The grinder event carries no weight of its own; it is backfilled
        // from the scale statistics median.
        assert_eq!(record.weight, Some(2500));
        assert_eq!(record.acp_ts, ts);
        assert_eq!(record.acp_id, "csn-node-test");
        assert_eq!(record.acp_type, "coffee_pot");
    }

    #[tokio::test]
    async fn test_telemetry_updates_cache_but_is_not_forwarded() {
        let (hub, uplink) = hub_with(None);

        let brew = SensorId::new(Config::default().sensors.brew_sensor_id);
        hub.borrow_mut()
            .ingest(
                1.0,
                &brew,
                Reading::Power(Payload::decode(r#"{"ENERGY":{"Power":0}}"#)),
            )
            .unwrap();
        Hub::on_reading(&hub, 1.0, &brew).await.unwrap();

        assert!(uplink.records.borrow().is_empty());
        let hub_ref = hub.borrow();
        let cached = hub_ref.status().brew.as_ref().unwrap();
        assert_eq!(cached.value.code, EventCode::BrewStatus);
        assert_eq!(cached.ts, 1.0);
    }

    #[tokio::test]
    async fn test_watchdog_heartbeat_reports_weight_and_summaries() {
        let (hub, uplink) = hub_with(None);
        warm_scale(&hub, 30, 2500.0).await;

        let grind = SensorId::new(Config::default().sensors.grind_sensor_id);
        hub.borrow_mut()
            .ingest(
                3.0,
                &grind,
                Reading::Power(Payload::decode(r#"{"ENERGY":{"Power":1450}}"#)),
            )
            .unwrap();
        Hub::on_reading(&hub, 3.0, &grind).await.unwrap();

        Hub::watchdog(&hub, 4.0).await.unwrap();
        let records = uplink.records.borrow();
        let (_, record) = records.last().unwrap();
        assert_eq!(record.event_code, EventCode::Status);
        assert_eq!(record.weight, Some(2500));
        let value = record.value.as_ref().unwrap();
        assert_eq!(value["grind"]["event_code"], "COFFEE_GRINDING");
        assert!(value["brew"].is_null());
        assert!(value["new_pot"].is_null());
    }

    #[tokio::test]
    async fn test_watchdog_heartbeat_publishes_without_weight() {
        let (hub, uplink) = hub_with(None);
        // Scale not warmed up: heartbeat still goes out, weight omitted.
        Hub::watchdog(&hub, 1.0).await.unwrap();
        let records = uplink.records.borrow();
        let (_, record) = records.last().unwrap();
        assert_eq!(record.event_code, EventCode::Status);
        assert_eq!(record.weight, None);
    }

    #[tokio::test]
    async fn test_startup_event() {
        let (hub, uplink) = hub_with(None);
        Hub::startup(&hub, 1.0).await.unwrap();
        let records = uplink.records.borrow();
        let (topic, record) = records.last().unwrap();
        assert_eq!(topic, "csn-node-test");
        assert_eq!(record.event_code, EventCode::Startup);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_overlapping_ticks_run_to_completion() {
        // A slow collaborator keeps publishes in flight while the other
        // sensor keeps ticking. Every tick's detection/enrichment section
        // runs to completion inside one borrow (an interleaved mutation
        // would panic the RefCell), and the published records stay
        // per-sensor ordered and fully stamped.
        let (hub, uplink) = hub_with(Some(Duration::from_secs(1)));

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let grind = SensorId::new(Config::default().sensors.grind_sensor_id);
                let brew = SensorId::new(Config::default().sensors.brew_sensor_id);

                let hub_a = hub.clone();
                let task_a = tokio::task::spawn_local(async move {
                    for tick in 0..5u64 {
                        let ts = 10.0 + tick as f64;
                        hub_a
                            .borrow_mut()
                            .ingest(
                                ts,
                                &grind,
                                Reading::Power(Payload::decode(
                                    r#"{"ENERGY":{"Power":1450}}"#,
                                )),
                            )
                            .unwrap();
                        Hub::on_reading(&hub_a, ts, &grind).await.unwrap();
                    }
                });
                let hub_b = hub.clone();
                let task_b = tokio::task::spawn_local(async move {
                    for tick in 0..5u64 {
                        let ts = 10.5 + tick as f64;
                        hub_b
                            .borrow_mut()
                            .ingest(
                                ts,
                                &brew,
                                Reading::Power(Payload::decode(r#"{"ENERGY":{"Power":900}}"#)),
                            )
                            .unwrap();
                        Hub::on_reading(&hub_b, ts, &brew).await.unwrap();
                    }
                });
                task_a.await.unwrap();
                task_b.await.unwrap();
            })
            .await;

        let records = uplink.records.borrow();
        assert_eq!(records.len(), 10);
        for code in [EventCode::Grinding, EventCode::Brewing] {
            let ts_sequence: Vec<f64> = records
                .iter()
                .filter(|(_, r)| r.event_code == code)
                .map(|(_, r)| r.acp_ts)
                .collect();
            assert_eq!(ts_sequence.len(), 5);
            assert!(ts_sequence.windows(2).all(|pair| pair[0] < pair[1]));
        }
        for (_, record) in records.iter() {
            assert_eq!(record.acp_id, "csn-node-test");
            assert!(record.power.is_some());
        }
    }
}
