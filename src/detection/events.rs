// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/brewsense-rs

//! Event types and the enriched wire record.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::sensors::Payload;

/// The closed set of lifecycle event codes.
///
/// Serialized names are the platform's wire strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventCode {
    /// Node came up.
    #[serde(rename = "COFFEE_STARTUP")]
    Startup,
    /// A fresh pot landed on the scale.
    #[serde(rename = "COFFEE_NEW")]
    New,
    /// The pot is down to its empty weight.
    #[serde(rename = "COFFEE_EMPTY")]
    Empty,
    /// A cup was poured.
    #[serde(rename = "COFFEE_POURED")]
    Poured,
    /// The pot left the scale.
    #[serde(rename = "COFFEE_REMOVED")]
    Removed,
    /// The pot came back.
    #[serde(rename = "COFFEE_REPLACED")]
    Replaced,
    /// Grinder power draw went active.
    #[serde(rename = "COFFEE_GRINDING")]
    Grinding,
    /// Brewer power draw went active.
    #[serde(rename = "COFFEE_BREWING")]
    Brewing,
    /// Grinder telemetry heartbeat.
    #[serde(rename = "GRIND_STATUS")]
    GrindStatus,
    /// Brewer telemetry heartbeat.
    #[serde(rename = "BREW_STATUS")]
    BrewStatus,
    /// Periodic node status heartbeat.
    #[serde(rename = "COFFEE_STATUS")]
    Status,
}

impl EventCode {
    /// Wire string for this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCode::Startup => "COFFEE_STARTUP",
            EventCode::New => "COFFEE_NEW",
            EventCode::Empty => "COFFEE_EMPTY",
            EventCode::Poured => "COFFEE_POURED",
            EventCode::Removed => "COFFEE_REMOVED",
            EventCode::Replaced => "COFFEE_REPLACED",
            EventCode::Grinding => "COFFEE_GRINDING",
            EventCode::Brewing => "COFFEE_BREWING",
            EventCode::GrindStatus => "GRIND_STATUS",
            EventCode::BrewStatus => "BREW_STATUS",
            EventCode::Status => "COFFEE_STATUS",
        }
    }

    /// True for the auxiliary telemetry heartbeats, which update the status
    /// cache but are never forwarded individually.
    pub fn is_telemetry(&self) -> bool {
        matches!(self, EventCode::GrindStatus | EventCode::BrewStatus)
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected lifecycle event. Created once by the detector, recorded in
/// the event buffer, optionally enriched and forwarded; never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// What happened.
    pub code: EventCode,
    /// Pot weight at detection, rounded grams.
    pub weight: Option<i64>,
    /// Weight of the poured serving, rounded grams (POURED only).
    pub weight_poured: Option<i64>,
    /// Power draw, watts (GRINDING/BREWING only).
    pub power: Option<f64>,
    /// Raw telemetry (status heartbeats only).
    pub payload: Option<Payload>,
    /// Detector certainty. A bounded heuristic scalar, not a calibrated
    /// probability; near a band edge it may stray slightly outside [0, 1].
    pub confidence: f64,
}

impl Event {
    /// A weight-derived event (NEW/EMPTY/REMOVED/REPLACED).
    pub fn weighed(code: EventCode, weight: i64, confidence: f64) -> Self {
        Self {
            code,
            weight: Some(weight),
            weight_poured: None,
            power: None,
            payload: None,
            confidence,
        }
    }

    /// A POURED event.
    pub fn poured(weight_poured: i64, weight: i64, confidence: f64) -> Self {
        Self {
            code: EventCode::Poured,
            weight: Some(weight),
            weight_poured: Some(weight_poured),
            power: None,
            payload: None,
            confidence,
        }
    }

    /// A power-activity event (GRINDING/BREWING).
    pub fn powered(code: EventCode, power: f64, confidence: f64) -> Self {
        Self {
            code,
            weight: None,
            weight_poured: None,
            power: Some(power),
            payload: None,
            confidence,
        }
    }

    /// A telemetry heartbeat carrying the raw payload.
    pub fn telemetry(code: EventCode, payload: Payload) -> Self {
        Self {
            code,
            weight: None,
            weight_poured: None,
            power: payload.power(),
            payload: Some(payload),
            confidence: 1.0,
        }
    }
}

/// Cached new-pot summary attached to forwarded events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPotStatus {
    /// When the pot was brewed, Unix seconds.
    pub ts: f64,
    /// Its weight at the time, rounded grams.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
}

/// The enriched record handed to the uplink.
///
/// `acp_*` fields are the platform envelope: node identity, node type and
/// the event timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    /// Wire event code.
    pub event_code: EventCode,
    /// Pot weight, rounded grams. Backfilled from the scale statistics when
    /// the event itself carried none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
    /// Poured serving weight, rounded grams.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_poured: Option<i64>,
    /// Power draw, watts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
    /// Raw payload or heartbeat summary document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Last known new-pot status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_pot: Option<NewPotStatus>,
    /// Detector certainty (heuristic, see [`Event::confidence`]).
    pub acp_confidence: f64,
    /// Event timestamp, Unix seconds.
    pub acp_ts: f64,
    /// Node identity.
    pub acp_id: String,
    /// Node type.
    pub acp_type: String,
}

/// Round a weight to integer grams, half-up.
pub fn round_grams(grams: f64) -> i64 {
    (grams + 0.5).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_code_wire_names() {
        let json = serde_json::to_string(&EventCode::New).unwrap();
        assert_eq!(json, "\"COFFEE_NEW\"");
        let code: EventCode = serde_json::from_str("\"GRIND_STATUS\"").unwrap();
        assert_eq!(code, EventCode::GrindStatus);
        assert_eq!(EventCode::Poured.to_string(), "COFFEE_POURED");
    }

    #[test]
    fn test_record_serialization_skips_absent_fields() {
        let record = EventRecord {
            event_code: EventCode::Removed,
            weight: Some(3),
            weight_poured: None,
            power: None,
            value: None,
            new_pot: None,
            acp_confidence: 0.99,
            acp_ts: 1234.5,
            acp_id: "csn-node-test".into(),
            acp_type: "coffee_pot".into(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["event_code"], "COFFEE_REMOVED");
        assert_eq!(json["weight"], 3);
        assert!(json.get("weight_poured").is_none());
        assert!(json.get("power").is_none());
    }

    #[test]
    fn test_round_grams_half_up() {
        assert_eq!(round_grams(2499.4), 2499);
        assert_eq!(round_grams(2499.5), 2500);
        assert_eq!(round_grams(-0.2), 0);
    }
}
