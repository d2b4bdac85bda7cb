// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/brewsense-rs

//! Status display collaborator.
//!
//! The node pushes state at a display and never reads back. The physical
//! device is a small LCD driven over SPI; that rendering stack lives
//! outside the node core, behind this trait. [`ConsoleDisplay`] stands in
//! for it everywhere else.

use tracing::info;

use crate::buffers::SampleBuffer;
use crate::detection::{Event, EventCode};

/// Render collaborator. Push-only; implementations must not block the
/// cooperative scheduler.
pub trait Display {
    /// A weight tick happened; redraw whatever the display derives from the
    /// sample history.
    fn update(&mut self, ts: f64, buffer: &SampleBuffer<f64>);
    /// A fresh pot arrived; restart any pot-age rendering.
    fn update_new(&mut self, ts: f64);
    /// A lifecycle event fired.
    fn update_event(&mut self, ts: f64, event: &Event);
}

/// Console stand-in for the LCD: logs a weight line at most once a second
/// and every lifecycle event.
pub struct ConsoleDisplay {
    last_drawn: Option<f64>,
    pot_since: Option<f64>,
}

impl ConsoleDisplay {
    /// New console display.
    pub fn new() -> Self {
        Self {
            last_drawn: None,
            pot_since: None,
        }
    }
}

impl Default for ConsoleDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ConsoleDisplay {
    fn update(&mut self, ts: f64, buffer: &SampleBuffer<f64>) {
        if self.last_drawn.is_some_and(|last| ts - last < 1.0) {
            return;
        }
        self.last_drawn = Some(ts);
        if let Some(sample) = buffer.latest() {
            let age = self
                .pot_since
                .map(|since| format!(", pot {:.0} s old", ts - since))
                .unwrap_or_default();
            info!("weight {:7.1} g{age}", sample.value);
        }
    }

    fn update_new(&mut self, ts: f64) {
        self.pot_since = Some(ts);
        info!("fresh pot on the scale");
    }

    fn update_event(&mut self, _ts: f64, event: &Event) {
        match event.code {
            EventCode::Poured => info!(
                "poured {} g, {} g left",
                event.weight_poured.unwrap_or_default(),
                event.weight.unwrap_or_default()
            ),
            code => info!(%code, weight = ?event.weight, "event"),
        }
    }
}
