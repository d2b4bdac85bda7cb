// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/brewsense-rs

//! Remote sensor loop.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{info, warn};

use super::{DetectorSet, Payload, Reading, SensorId, SensorLink};
use crate::core::{epoch_ts, Hub, Stop};
use crate::detection::SensorBuffers;
use crate::Result;

/// Ingestion adapter for a sensor that delivers messages over a link (the
/// smart plugs).
///
/// Registers a samples-only buffer with the hub at construction. The loop
/// waits for the next inbound message or the stop signal, whichever comes
/// first; when both are ready at once the stop branch wins, so a message
/// that raced shutdown is dropped rather than half-processed. There is no
/// flow control over the inbound transport - buffering is its problem.
pub struct RemoteSource {
    sensor_id: SensorId,
    hub: Rc<RefCell<Hub>>,
    link: Box<dyn SensorLink>,
    stop: Stop,
}

impl RemoteSource {
    /// Register the sensor's buffers and build the adapter.
    pub fn new(
        hub: Rc<RefCell<Hub>>,
        sensor_id: SensorId,
        set: DetectorSet,
        buffers: SensorBuffers,
        link: Box<dyn SensorLink>,
        stop: Stop,
    ) -> Result<Self> {
        hub.borrow_mut().register(sensor_id.clone(), set, buffers)?;
        Ok(Self {
            sensor_id,
            hub,
            link,
            stop,
        })
    }

    /// Run until the stop signal fires or the link finishes.
    pub async fn run(mut self) -> Result<()> {
        info!(sensor = %self.sensor_id, "remote source started");
        loop {
            tokio::select! {
                // Stop takes precedence on simultaneous readiness.
                biased;
                _ = self.stop.wait() => break,
                message = self.link.next() => {
                    let text = match message {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(sensor = %self.sensor_id, "link finished: {e}");
                            break;
                        }
                    };
                    let payload = Payload::decode(&text);
                    let ts = epoch_ts();
                    self.hub
                        .borrow_mut()
                        .ingest(ts, &self.sensor_id, Reading::Power(payload))?;
                    Hub::on_reading(&self.hub, ts, &self.sensor_id).await?;
                }
            }
        }
        info!(sensor = %self.sensor_id, "remote source finished");
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
    use crate::sensors::QueueSensorLink;
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

    fn grind_id() -> SensorId {
        SensorId::new(Config::default().sensors.grind_sensor_id)
    }

    #[tokio::test]
    async fn test_messages_flow_into_buffers() {
        let hub = test_hub();
        let (handle, stop) = stop_channel();
        let (tx, link) = QueueSensorLink::channel();
        let id = grind_id();

        let source = RemoteSource::new(
            hub.clone(),
            id.clone(),
            DetectorSet::Grind,
            SensorBuffers::payload(100),
            Box::new(link),
            stop,
        )
        .unwrap();

        tx.send(r#"{"ENERGY":{"Power":1450}}"#.to_string()).unwrap();
        tx.send("garbage".to_string()).unwrap();
        drop(tx);
        // Messages drain, then the closed link ends the loop.
        source.run().await.unwrap();
        handle.trigger();

        let hub_ref = hub.borrow();
        let grind = hub_ref.status().grind.as_ref().unwrap();
        // The malformed trailer degraded to a heartbeat and still arrived.
        assert_eq!(grind.value.code, crate::EventCode::GrindStatus);
    }

    #[tokio::test]
    async fn test_stop_wins_over_pending_message() {
        let hub = test_hub();
        let (handle, stop) = stop_channel();
        let (tx, link) = QueueSensorLink::channel();
        let id = grind_id();

        let source = RemoteSource::new(
            hub.clone(),
            id.clone(),
            DetectorSet::Grind,
            SensorBuffers::payload(100),
            Box::new(link),
            stop,
        )
        .unwrap();

        // A message is already queued when the stop signal fires; the stop
        // branch is biased first, so the source exits without touching it.
        tx.send(r#"{"ENERGY":{"Power":1450}}"#.to_string()).unwrap();
        handle.trigger();
        source.run().await.unwrap();

        let hub_ref = hub.borrow();
        assert!(hub_ref.status().grind.is_none());
    }
}
