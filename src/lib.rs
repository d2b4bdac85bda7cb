// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/brewsense-rs

//! BrewSense - Coffee Pot Sensor Node
//!
//! A sensor node that watches a communal coffee pot through a load-cell scale
//! and two smart-plug power meters, turning the raw streams into discrete,
//! confidence-scored lifecycle events: a fresh pot brewed, the pot emptied,
//! removed, replaced or poured from, and the grinder/brewer switching on.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       BrewSense Node                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌───────────┐   ┌───────────┐   ┌─────────┐  │
//! │  │ Local /  │ → │  Sample / │ → │   Event   │ → │   Hub   │  │
//! │  │ Remote   │   │  Stats    │   │ Detector  │   │ enrich  │  │
//! │  │ Sources  │   │  Buffers  │   │           │   │ & route │  │
//! │  └──────────┘   └───────────┘   └───────────┘   └────┬────┘  │
//! │        ↑                                             ↓       │
//! │  ┌──────────┐                              ┌─────────────┐   │
//! │  │ Watchdog │ ───── heartbeat ───────────→ │ Uplink/LCD  │   │
//! │  └──────────┘                              └─────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! All tasks run cooperatively on a single-threaded runtime; shared state is
//! only ever mutated between suspension points, which is what makes the
//! sensor registry and status cache safe without locks.

#![warn(missing_docs)]

pub mod buffers;
pub mod config;
pub mod core;
pub mod detection;
pub mod display;
pub mod sensors;
pub mod streaming;

// Re-exports for convenience
pub use crate::buffers::{Sample, SampleBuffer, StatsBuffer, StatsRecord};
pub use crate::config::Config;
pub use crate::core::{Hub, SensorNode, Watchdog};
pub use crate::detection::{Event, EventCode, EventDetector, EventRecord, Thresholds};
pub use crate::sensors::{DetectorSet, Payload, Reading, SensorId};

/// BrewSense version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// BrewSense name
pub const NAME: &str = "BrewSense";

/// Library error type.
///
/// Indeterminate statistics are *not* errors: buffer and window operations
/// return `Option::None` for "insufficient data" and callers skip the tick.
/// The variants here are genuine faults - misconfiguration or transport
/// trouble.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A reading or detector test referenced a sensor id that was never
    /// registered. This is a configuration fault and aborts the node.
    #[error("sensor `{0}` is not registered")]
    UnknownSensor(String),

    /// Two adapters tried to register the same sensor id.
    #[error("sensor `{0}` is already registered")]
    DuplicateSensor(String),

    /// A reading of the wrong kind was pushed at a registered sensor.
    #[error("sensor `{id}` stores {expected} readings, got {got}")]
    ReadingKind {
        /// Offending sensor id.
        id: String,
        /// Kind of reading the registered buffers store.
        expected: &'static str,
        /// Kind of reading that was delivered.
        got: &'static str,
    },

    /// Uplink transport failure. Fire-and-forget: logged, never retried.
    #[error("uplink: {0}")]
    Uplink(String),

    /// Inbound sensor link failure.
    #[error("sensor link: {0}")]
    Link(String),

    /// Configuration file could not be read or parsed.
    #[error("config: {0}")]
    Config(String),

    /// Buffer persistence I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Library result alias.
pub type Result<T> = std::result::Result<T, Error>;
