// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/brewsense-rs

//! Outbound event publishing.

mod mqtt;

pub use mqtt::{MqttSensorLink, MqttUplink};

use async_trait::async_trait;
use tracing::info;

use crate::detection::EventRecord;

/// Publish collaborator for enriched event records.
///
/// Fire-and-forget from the node's perspective: a failed `put` is logged by
/// the caller and never retried, and buffer state is never rolled back on
/// transport trouble. Delivery guarantees live on the other side of this
/// trait.
#[async_trait(?Send)]
pub trait Uplink {
    /// Publish one record under the node's topic.
    async fn put(&self, topic: &str, record: &EventRecord) -> crate::Result<()>;
}

/// Uplink that logs instead of publishing. Used when the node runs without
/// a broker (demo mode, tests, bench captures).
pub struct LogUplink;

#[async_trait(?Send)]
impl Uplink for LogUplink {
    async fn put(&self, topic: &str, record: &EventRecord) -> crate::Result<()> {
        let payload = serde_json::to_string(record)
            .map_err(|e| crate::Error::Uplink(e.to_string()))?;
        info!(topic, %payload, "uplink (log only)");
        Ok(())
    }
}
