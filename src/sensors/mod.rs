// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/brewsense-rs

//! Sensor identities, reading types and ingestion adapters.

mod local;
mod remote;
mod simulator;

pub use local::LocalSource;
pub use remote::RemoteSource;
pub use simulator::{PowerSimulator, QueueSensorLink, ScaleSimulator};

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identity of one sensor stream within the node.
///
/// An explicit newtype rather than a bare string: sensor ids are wire-level
/// identifiers (MQTT topics are derived from them) and the registry keys on
/// them, so they should not be confused with arbitrary text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorId(String);

impl SensorId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SensorId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Which detector battery runs for a sensor's readings.
///
/// A closed enum: detector dispatch is by registered role, never by pattern
/// matching on the id string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectorSet {
    /// The load-cell scale under the pot.
    Weight,
    /// Smart plug powering the grinder.
    Grind,
    /// Smart plug powering the brewer.
    Brew,
}

/// Decoded payload of one power-meter message.
///
/// Smart plugs publish Tasmota-style telemetry JSON; the detector only needs
/// the instantaneous power figure, but the full payload rides along so the
/// status heartbeat can forward it untouched. A message that cannot be
/// interpreted degrades to the tagged [`Payload::Malformed`] placeholder -
/// it still flows through the buffer and downstream, it is never dropped
/// silently and never fatal.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A power reading with the raw telemetry it came from.
    Power {
        /// Instantaneous power draw, watts.
        power: f64,
        /// The decoded telemetry document.
        raw: serde_json::Value,
    },
    /// Placeholder for a message with no usable power figure.
    Malformed {
        /// The offending message text, preserved for downstream debugging.
        raw: String,
    },
}

impl Payload {
    /// Decode one inbound message.
    ///
    /// Accepts Tasmota `tele/SENSOR` telemetry (`ENERGY.Power`) or a flat
    /// `power` field; anything else becomes [`Payload::Malformed`].
    pub fn decode(text: &str) -> Self {
        let Ok(raw) = serde_json::from_str::<serde_json::Value>(text) else {
            return Payload::Malformed {
                raw: text.to_string(),
            };
        };
        let power = raw
            .pointer("/ENERGY/Power")
            .and_then(serde_json::Value::as_f64)
            .or_else(|| raw.get("power").and_then(serde_json::Value::as_f64));
        match power {
            Some(power) => Payload::Power { power, raw },
            None => Payload::Malformed {
                raw: text.to_string(),
            },
        }
    }

    /// Instantaneous power, if this payload carries one.
    pub fn power(&self) -> Option<f64> {
        match self {
            Payload::Power { power, .. } => Some(*power),
            Payload::Malformed { .. } => None,
        }
    }

    /// The payload as a JSON value for forwarding.
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            Payload::Power { raw, .. } => raw.clone(),
            Payload::Malformed { raw } => serde_json::json!({ "malformed": raw }),
        }
    }
}

/// One reading delivered by an ingestion adapter.
#[derive(Debug, Clone)]
pub enum Reading {
    /// Scale reading, grams.
    Weight(f64),
    /// Power-meter payload.
    Power(Payload),
}

impl Reading {
    /// Kind label for configuration-fault messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Reading::Weight(_) => "weight",
            Reading::Power(_) => "power",
        }
    }
}

/// Synchronous reading collaborator for a locally attached sensor.
///
/// The hardware behind this (load-cell A/D conversion, tare handling) is a
/// thin wrapper outside the node core; the simulator stands in for it off
/// the device.
pub trait ReadingSource {
    /// Take one reading, in grams.
    fn get_value(&mut self) -> crate::Result<f64>;
}

/// Inbound message stream from a remote sensor.
#[async_trait(?Send)]
pub trait SensorLink {
    /// Wait for the next raw message. An error means the link is finished;
    /// the owning source exits its loop.
    async fn next(&mut self) -> crate::Result<String>;
}
