// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/brewsense-rs

//! Wall-clock timestamps.
//!
//! Timestamps enter the system only at the ingestion adapters and the
//! watchdog; everything below them takes `ts` parameters, so detection and
//! statistics are driven from recorded clocks in tests.

use chrono::Utc;

/// Current Unix time as floating-point seconds, the platform wire format.
pub fn epoch_ts() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1e6
}
