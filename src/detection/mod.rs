// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/brewsense-rs

//! Event pattern recognition over the sensor buffers.
//!
//! The [`EventDetector`] owns the per-sensor buffer registry and an event
//! buffer of everything it has emitted, and runs a battery of heuristics on
//! each tick: weight-band predicates, stability probes over short windows,
//! and lookbacks into the statistics and event history for edge-triggering
//! and duplicate suppression.
//!
//! Everything here is synchronous and deterministic: the detector computes
//! from buffer contents and the caller's timestamp only, so the whole
//! battery is driven from recorded streams in tests.

mod events;

pub use events::{round_grams, Event, EventCode, EventRecord, NewPotStatus};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::buffers::{SampleBuffer, StatsBuffer};
use crate::sensors::{DetectorSet, Payload, Reading, SensorId};
use crate::{Error, Result};

/// A window is "stable" when its RMS deviation stays at or below this many
/// grams - scale noise plus a hand brushing the pot stays under it, any
/// real handling blows past it.
const STABLE_DEVIATION_MAX: f64 = 30.0;
/// A stability probe needs strictly more than this many samples.
const MIN_STABLE_SAMPLES: usize = 5;
/// Stability window for the empty/full probes, seconds.
const STABLE_WINDOW_SECS: f64 = 1.0;
/// Stability window for the removed probe, seconds. Longer: "gone" has to
/// hold through the wobble of lifting the pot off.
const REMOVED_WINDOW_SECS: f64 = 3.0;

/// A median this far above the current one is a push artifact - someone
/// pressing on or bumping the scale - not a plausible pot weight.
const PUSH_DELTA_GRAMS: f64 = 2000.0;
/// How many statistics records the pour scan walks back.
const POUR_SCAN_RECORDS: usize = 30;
/// Duplicate-POURED suppression lookback, seconds.
const POUR_SUPPRESS_SECS: f64 = 30.0;
/// A pour-scan record is usable once it spans at least this much time...
const POUR_RECORD_MIN_SECS: f64 = 0.5;
/// ...and holds at least this many samples.
const POUR_RECORD_MIN_SAMPLES: usize = 5;

/// NEW requires a removed statistics record within this lookback, seconds.
const NEW_REMOVED_SECS: f64 = 30.0;
/// NEW accepts a below-band weight when the grinder/brewer ran within this
/// lookback, seconds (30 minutes).
const NEW_ACTIVITY_SECS: f64 = 1800.0;
/// Duplicate-NEW suppression lookback, seconds (30 minutes).
const NEW_SUPPRESS_SECS: f64 = 1800.0;
/// Confidence for a NEW accepted on recent grind/brew activity rather than
/// the full band.
const NEW_FALLBACK_CONFIDENCE: f64 = 0.85;

/// Duplicate-REMOVED cool-down, seconds.
const REMOVED_SUPPRESS_SECS: f64 = 600.0;

/// EMPTY requires a not-empty statistics record within this lookback.
const EMPTY_LOOKBACK_SECS: f64 = 30.0;
/// Duplicate-EMPTY suppression lookback, seconds.
const EMPTY_SUPPRESS_SECS: f64 = 60.0;

/// REPLACED requires a removed statistics record within this lookback
/// (anchored at the stats stream's own clock, so effectively 3-6 s of
/// caller time given the flush lag).
const REPLACED_REMOVED_SECS: f64 = 3.0;
/// Duplicate-REPLACED suppression lookback, seconds.
const REPLACED_SUPPRESS_SECS: f64 = 10.0;
/// REPLACED fast-reject fraction of the empty weight.
const REPLACED_WEIGHT_FRACTION: f64 = 0.9;

const POURED_CONFIDENCE: f64 = 0.8;
const REPLACED_CONFIDENCE: f64 = 0.8;
const POWER_CONFIDENCE: f64 = 0.8;

/// Weight bands and detector thresholds, all in grams except the power
/// threshold (watts).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Weight of the pot with no coffee in it.
    pub empty_weight: f64,
    /// Half-width of the empty band.
    pub empty_margin: f64,
    /// Weight of a freshly brewed pot.
    pub full_weight: f64,
    /// Half-width of the full band.
    pub full_margin: f64,
    /// Scale reading with the pot off it.
    pub removed_weight: f64,
    /// Half-width of the removed band.
    pub removed_margin: f64,
    /// Smallest weight change that counts as a pour.
    pub minimum_pour: f64,
    /// Largest weight change that counts as a single pour.
    pub maximum_pour: f64,
    /// Power draw above which a plug's appliance counts as running.
    pub power_threshold: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            empty_weight: 1630.0,
            empty_margin: 50.0,
            full_weight: 3400.0,
            full_margin: 400.0,
            removed_weight: 0.0,
            removed_margin: 100.0,
            minimum_pour: 40.0,
            maximum_pour: 1000.0,
            power_threshold: 10.0,
        }
    }
}

/// Buffer set owned by one registered sensor.
#[derive(Debug)]
pub enum SensorBuffers {
    /// Scale stream: raw samples plus the derived statistics cache.
    Scalar {
        /// Raw readings.
        samples: SampleBuffer<f64>,
        /// Per-cycle aggregates, updated on every `put`.
        stats: StatsBuffer,
    },
    /// Power-meter stream: payloads only.
    Payload {
        /// Decoded payloads.
        samples: SampleBuffer<Payload>,
    },
}

impl SensorBuffers {
    /// Buffers for a scalar stream with an attached statistics cache.
    pub fn scalar(sample_capacity: usize, stats_capacity: usize, stats_duration: f64) -> Self {
        SensorBuffers::Scalar {
            samples: SampleBuffer::new(sample_capacity),
            stats: StatsBuffer::new(stats_capacity, stats_duration),
        }
    }

    /// Buffers for a payload stream.
    pub fn payload(sample_capacity: usize) -> Self {
        SensorBuffers::Payload {
            samples: SampleBuffer::new(sample_capacity),
        }
    }
}

/// One registered sensor: its detector battery and its buffers.
#[derive(Debug)]
pub struct SensorEntry {
    /// Which detector battery runs for this sensor.
    pub set: DetectorSet,
    /// The sensor's buffers.
    pub buffers: SensorBuffers,
}

/// Mapping from sensor identity to its buffer set.
///
/// Populated once while the ingestion adapters are constructed, read for
/// the rest of the process lifetime; entries are never removed.
#[derive(Debug, Default)]
pub struct SensorRegistry {
    entries: HashMap<SensorId, SensorEntry>,
}

impl SensorRegistry {
    /// Register a sensor. Registering the same id twice is a configuration
    /// fault.
    pub fn register(&mut self, id: SensorId, set: DetectorSet, buffers: SensorBuffers) -> Result<()> {
        if self.entries.contains_key(&id) {
            return Err(Error::DuplicateSensor(id.to_string()));
        }
        self.entries.insert(id, SensorEntry { set, buffers });
        Ok(())
    }

    /// Look up a sensor's entry.
    pub fn get(&self, id: &SensorId) -> Option<&SensorEntry> {
        self.entries.get(id)
    }

    fn get_mut(&mut self, id: &SensorId) -> Option<&mut SensorEntry> {
        self.entries.get_mut(id)
    }
}

/// Borrowed view of the weight sensor's buffer pair.
struct WeightView<'a> {
    samples: &'a SampleBuffer<f64>,
    stats: &'a StatsBuffer,
}

/// Outcome of a stability probe: whether the probed band held, the stable
/// median it was judged on, and the chaining anchor for "one window
/// earlier". An indeterminate window (too few samples, not stable) is the
/// whole probe returning `None` - callers skip the tick.
struct StateProbe {
    held: bool,
    next_offset: Option<usize>,
    weight: f64,
    confidence: f64,
}

/// Band membership plus the distance-based confidence heuristic.
///
/// Confidence is `1 - distance / margin / 2`: 1.0 dead on target, 0.5 at
/// the band edge. It is deliberately not clamped; just outside a band it
/// strays below 0.5 toward and past 0, and callers treat it as the
/// documented heuristic scalar it is, not a probability.
fn band(x: f64, target: f64, margin: f64) -> (bool, f64) {
    let distance = (x - target).abs();
    (distance < margin, 1.0 - distance / margin / 2.0)
}

/// The heuristics engine.
///
/// Owns the registry and the event buffer; `test` runs the battery
/// registered for a sensor and records everything it emits.
#[derive(Debug)]
pub struct EventDetector {
    thresholds: Thresholds,
    weight_sensor: SensorId,
    registry: SensorRegistry,
    event_buffer: SampleBuffer<Event>,
}

impl EventDetector {
    /// Create a detector. `weight_sensor` names the registry entry the
    /// weight heuristics read.
    pub fn new(thresholds: Thresholds, weight_sensor: SensorId, event_capacity: usize) -> Self {
        Self {
            thresholds,
            weight_sensor,
            registry: SensorRegistry::default(),
            event_buffer: SampleBuffer::new(event_capacity),
        }
    }

    /// Register a sensor's buffers. Called once per adapter at construction.
    pub fn register(&mut self, id: SensorId, set: DetectorSet, buffers: SensorBuffers) -> Result<()> {
        self.registry.register(id, set, buffers)
    }

    /// Detector battery registered for `id`, if any.
    pub fn detector_set(&self, id: &SensorId) -> Option<DetectorSet> {
        self.registry.get(id).map(|entry| entry.set)
    }

    /// Push one reading into a registered sensor's buffers. The scalar path
    /// also advances the attached statistics cache.
    pub fn ingest(&mut self, ts: f64, id: &SensorId, reading: Reading) -> Result<()> {
        let entry = self
            .registry
            .get_mut(id)
            .ok_or_else(|| Error::UnknownSensor(id.to_string()))?;
        match (&mut entry.buffers, reading) {
            (SensorBuffers::Scalar { samples, stats }, Reading::Weight(value)) => {
                samples.put(ts, value);
                stats.update(samples);
                Ok(())
            }
            (SensorBuffers::Payload { samples }, Reading::Power(payload)) => {
                samples.put(ts, payload);
                Ok(())
            }
            (SensorBuffers::Scalar { .. }, other) => Err(Error::ReadingKind {
                id: id.to_string(),
                expected: "weight",
                got: other.kind(),
            }),
            (SensorBuffers::Payload { .. }, other) => Err(Error::ReadingKind {
                id: id.to_string(),
                expected: "power",
                got: other.kind(),
            }),
        }
    }

    /// Run the detector battery for one sensor tick.
    ///
    /// Every produced event is appended to the event buffer and returned.
    /// An unregistered id is a fatal configuration fault, not a recoverable
    /// runtime condition.
    pub fn test(&mut self, ts: f64, id: &SensorId) -> Result<Vec<Event>> {
        let set = self
            .detector_set(id)
            .ok_or_else(|| Error::UnknownSensor(id.to_string()))?;

        let produced: Vec<Event> = match set {
            DetectorSet::Weight => {
                let this = &*self;
                let w = this.weight_view()?;
                let battery: [fn(&Self, &WeightView, f64) -> Option<Event>; 5] = [
                    Self::test_new,
                    Self::test_removed,
                    Self::test_poured,
                    Self::test_empty,
                    Self::test_replaced,
                ];
                battery.iter().filter_map(|detect| detect(this, &w, ts)).collect()
            }
            DetectorSet::Grind => self
                .test_power(id, EventCode::Grinding, EventCode::GrindStatus)?
                .into_iter()
                .collect(),
            DetectorSet::Brew => self
                .test_power(id, EventCode::Brewing, EventCode::BrewStatus)?
                .into_iter()
                .collect(),
        };

        for event in &produced {
            self.event_buffer.put(ts, event.clone());
        }
        Ok(produced)
    }

    /// The emitted-event history.
    pub fn event_buffer(&self) -> &SampleBuffer<Event> {
        &self.event_buffer
    }

    /// True if `id` is the registered weight sensor.
    pub fn is_weight_sensor(&self, id: &SensorId) -> bool {
        *id == self.weight_sensor
    }

    /// The weight sensor's raw sample buffer.
    pub fn weight_samples(&self) -> Result<&SampleBuffer<f64>> {
        self.weight_view().map(|w| w.samples)
    }

    /// Median of the weight stream over the trailing `duration` seconds.
    pub fn weight_median(&self, duration: f64) -> Option<f64> {
        let w = self.weight_view().ok()?;
        w.samples.median(0, duration).map(|stats| stats.value)
    }

    /// Median of the most recent weight statistics record.
    pub fn latest_stats_median(&self) -> Option<f64> {
        let w = self.weight_view().ok()?;
        w.stats.latest_median()
    }

    fn weight_view(&self) -> Result<WeightView<'_>> {
        let entry = self
            .registry
            .get(&self.weight_sensor)
            .ok_or_else(|| Error::UnknownSensor(self.weight_sensor.to_string()))?;
        match &entry.buffers {
            SensorBuffers::Scalar { samples, stats } => Ok(WeightView { samples, stats }),
            SensorBuffers::Payload { .. } => Err(Error::ReadingKind {
                id: self.weight_sensor.to_string(),
                expected: "power",
                got: "weight",
            }),
        }
    }

    fn payload_samples(&self, id: &SensorId) -> Result<&SampleBuffer<Payload>> {
        let entry = self
            .registry
            .get(id)
            .ok_or_else(|| Error::UnknownSensor(id.to_string()))?;
        match &entry.buffers {
            SensorBuffers::Payload { samples } => Ok(samples),
            SensorBuffers::Scalar { .. } => Err(Error::ReadingKind {
                id: id.to_string(),
                expected: "weight",
                got: "power",
            }),
        }
    }

    // ---- band predicates -------------------------------------------------

    fn empty_value(&self, x: f64) -> (bool, f64) {
        band(x, self.thresholds.empty_weight, self.thresholds.empty_margin)
    }

    fn full_value(&self, x: f64) -> (bool, f64) {
        band(x, self.thresholds.full_weight, self.thresholds.full_margin)
    }

    fn removed_value(&self, x: f64) -> (bool, f64) {
        band(x, self.thresholds.removed_weight, self.thresholds.removed_margin)
    }

    // ---- stability probes ------------------------------------------------

    /// Median + deviation over a window; indeterminate unless the window is
    /// populated (`> MIN_STABLE_SAMPLES` samples) and stable.
    fn stable_probe<F>(&self, w: &WeightView, offset: usize, window: f64, in_band: F) -> Option<StateProbe>
    where
        F: Fn(f64) -> (bool, f64),
    {
        let median = w.samples.median(offset, window)?;
        let deviation = w.samples.deviation(offset, window, median.value)?;
        if median.samples <= MIN_STABLE_SAMPLES || deviation.value > STABLE_DEVIATION_MAX {
            return None;
        }
        let (held, confidence) = in_band(median.value);
        Some(StateProbe {
            held,
            next_offset: median.next_offset,
            weight: median.value,
            confidence,
        })
    }

    fn is_empty(&self, w: &WeightView, offset: usize) -> Option<StateProbe> {
        self.stable_probe(w, offset, STABLE_WINDOW_SECS, |x| self.empty_value(x))
    }

    fn is_full(&self, w: &WeightView, offset: usize) -> Option<StateProbe> {
        self.stable_probe(w, offset, STABLE_WINDOW_SECS, |x| self.full_value(x))
    }

    fn is_removed(&self, w: &WeightView, offset: usize) -> Option<StateProbe> {
        self.stable_probe(w, offset, REMOVED_WINDOW_SECS, |x| self.removed_value(x))
    }

    // ---- event history ---------------------------------------------------

    /// Most recent event with `code` in the last `lookback` seconds of
    /// caller time.
    ///
    /// The event buffer's newest entry may lag the caller's clock (events
    /// are sparse), so the search window is shrunk by that gap to keep the
    /// lookback anchored at `ts`.
    fn find_event(&self, ts: f64, code: EventCode, lookback: f64) -> Option<crate::Sample<Event>> {
        let latest = self.event_buffer.get(0)?;
        let window = lookback - (ts - latest.ts);
        if window < 0.0 {
            return None;
        }
        self.event_buffer
            .find(0, window, |sample| sample.value.code == code)?
            .sample
    }

    // ---- weight detectors ------------------------------------------------

    /// A fresh pot: stable weight well above empty, after the pot was away,
    /// at most once per half hour.
    fn test_new(&self, w: &WeightView, ts: f64) -> Option<Event> {
        let probe = self.is_full(w, 0)?;
        if probe.weight <= self.thresholds.empty_weight + self.thresholds.minimum_pour {
            return None;
        }
        let confidence = if probe.held {
            probe.confidence
        } else {
            // A short brew sits below the full band; accept it when the
            // grinder or brewer ran recently.
            let recently_active = self
                .find_event(ts, EventCode::Grinding, NEW_ACTIVITY_SECS)
                .is_some()
                || self
                    .find_event(ts, EventCode::Brewing, NEW_ACTIVITY_SECS)
                    .is_some();
            if !recently_active {
                return None;
            }
            NEW_FALLBACK_CONFIDENCE
        };

        // The pot must have been off the scale in the recent past.
        let removed = w
            .stats
            .find(0, NEW_REMOVED_SECS, |s| self.removed_value(s.value.median).0)?;
        removed.sample.as_ref()?;

        if self.find_event(ts, EventCode::New, NEW_SUPPRESS_SECS).is_some() {
            return None;
        }
        Some(Event::weighed(EventCode::New, round_grams(probe.weight), confidence))
    }

    /// The pot left the scale: removed now, determinately present one
    /// window earlier.
    fn test_removed(&self, w: &WeightView, ts: f64) -> Option<Event> {
        let now = self.is_removed(w, 0)?;
        if !now.held {
            return None;
        }
        let before = self.is_removed(w, now.next_offset?)?;
        if before.held {
            return None;
        }
        if self
            .find_event(ts, EventCode::Removed, REMOVED_SUPPRESS_SECS)
            .is_some()
        {
            return None;
        }
        Some(Event::weighed(
            EventCode::Removed,
            round_grams(now.weight),
            now.confidence,
        ))
    }

    /// A cup poured: current weight stable, a push artifact in the recent
    /// statistics, and before the push a stable level a cup's-worth higher
    /// than now.
    fn test_poured(&self, w: &WeightView, ts: f64) -> Option<Event> {
        let current = w.samples.median(0, STABLE_WINDOW_SECS)?;
        let deviation = w.samples.deviation(0, STABLE_WINDOW_SECS, current.value)?;
        if deviation.value > STABLE_DEVIATION_MAX {
            return None;
        }
        let current_median = current.value;

        let mut push_seen = false;
        for i in 0..POUR_SCAN_RECORDS {
            let Some(record) = w.stats.get(i) else {
                continue;
            };
            let stats = &record.value;
            if stats.duration < POUR_RECORD_MIN_SECS || stats.samples < POUR_RECORD_MIN_SAMPLES {
                continue;
            }

            if !push_seen {
                if stats.median > current_median + PUSH_DELTA_GRAMS {
                    push_seen = true;
                }
                continue;
            }

            let delta = stats.median - current_median;
            if stats.deviation < STABLE_DEVIATION_MAX
                && delta > self.thresholds.minimum_pour
                && delta < self.thresholds.maximum_pour
            {
                let weight = round_grams(current_median);
                let weight_poured = round_grams(delta);

                // A recent POURED landing on the same resulting weight is
                // the same pour seen again, not a second serving.
                let duplicate = self
                    .find_event(ts, EventCode::Poured, POUR_SUPPRESS_SECS)
                    .and_then(|previous| previous.value.weight)
                    .is_some_and(|previous| {
                        (previous - weight).abs() as f64 <= self.thresholds.minimum_pour
                    });
                if !duplicate {
                    return Some(Event::poured(weight_poured, weight, POURED_CONFIDENCE));
                }
            }
        }
        None
    }

    /// The pot ran out: empty now, not empty somewhere in the last half
    /// minute of statistics.
    fn test_empty(&self, w: &WeightView, ts: f64) -> Option<Event> {
        let now = self.is_empty(w, 0)?;
        if !now.held {
            return None;
        }
        let was_not_empty = w
            .stats
            .find(0, EMPTY_LOOKBACK_SECS, |s| !self.empty_value(s.value.median).0)?;
        was_not_empty.sample.as_ref()?;

        if self
            .find_event(ts, EventCode::Empty, EMPTY_SUPPRESS_SECS)
            .is_some()
        {
            return None;
        }
        Some(Event::weighed(
            EventCode::Empty,
            round_grams(now.weight),
            now.confidence,
        ))
    }

    /// The pot came back: stable at a plausible pot weight right after the
    /// scale read removed.
    fn test_replaced(&self, w: &WeightView, ts: f64) -> Option<Event> {
        let threshold = self.thresholds.empty_weight * REPLACED_WEIGHT_FRACTION;

        // Fast reject on the raw latest reading before any window work.
        let latest = w.samples.get(0)?;
        if latest.value < threshold {
            return None;
        }

        let median = w.samples.median(0, STABLE_WINDOW_SECS)?;
        let deviation = w.samples.deviation(0, STABLE_WINDOW_SECS, median.value)?;
        if median.value < threshold || deviation.value > STABLE_DEVIATION_MAX {
            return None;
        }

        let removed = w
            .stats
            .find(0, REPLACED_REMOVED_SECS, |s| self.removed_value(s.value.median).0)?;
        removed.sample.as_ref()?;

        if self
            .find_event(ts, EventCode::Replaced, REPLACED_SUPPRESS_SECS)
            .is_some()
        {
            return None;
        }
        Some(Event::weighed(
            EventCode::Replaced,
            round_grams(median.value),
            REPLACED_CONFIDENCE,
        ))
    }

    // ---- power detectors -------------------------------------------------

    /// Grinder/brewer activity from the latest plug payload. Below the
    /// power threshold (or with no usable payload) this is a telemetry
    /// heartbeat instead - never suppressed, never consulted for de-dup.
    fn test_power(&self, id: &SensorId, active: EventCode, status: EventCode) -> Result<Option<Event>> {
        let samples = self.payload_samples(id)?;
        let Some(latest) = samples.get(0) else {
            return Ok(None);
        };
        let event = match &latest.value {
            Payload::Power { power, .. } if *power > self.thresholds.power_threshold => {
                Event::powered(active, *power, POWER_CONFIDENCE)
            }
            payload => Event::telemetry(status, payload.clone()),
        };
        Ok(Some(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEIGHT_ID: &str = "test-weight";
    const GRIND_ID: &str = "test-grind";
    const BREW_ID: &str = "test-brew";

    /// Detector with a registered weight sensor fed at 10 Hz by the `run`
    /// helper below.
    fn detector() -> EventDetector {
        let mut det = EventDetector::new(Thresholds::default(), SensorId::new(WEIGHT_ID), 1000);
        det.register(
            SensorId::new(WEIGHT_ID),
            DetectorSet::Weight,
            SensorBuffers::scalar(1000, 1000, 1.0),
        )
        .unwrap();
        det
    }

    /// Feed a constant weight for ticks `[from, to)` (tenths of a second),
    /// running the battery on every tick, and return everything emitted.
    fn run(det: &mut EventDetector, from: u64, to: u64, value: f64) -> Vec<Event> {
        let id = SensorId::new(WEIGHT_ID);
        let mut events = Vec::new();
        for tick in from..to {
            let ts = tick as f64 * 0.1;
            det.ingest(ts, &id, Reading::Weight(value)).unwrap();
            events.extend(det.test(ts, &id).unwrap());
        }
        events
    }

    fn count(events: &[Event], code: EventCode) -> usize {
        events.iter().filter(|e| e.code == code).count()
    }

    #[test]
    fn test_unregistered_sensor_is_fatal() {
        let mut det = detector();
        let err = det.test(0.0, &SensorId::new("nobody")).unwrap_err();
        assert!(matches!(err, Error::UnknownSensor(_)));
        let err = det
            .ingest(0.0, &SensorId::new("nobody"), Reading::Weight(1.0))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownSensor(_)));
    }

    #[test]
    fn test_reading_kind_mismatch_is_fatal() {
        let mut det = detector();
        let err = det
            .ingest(
                0.0,
                &SensorId::new(WEIGHT_ID),
                Reading::Power(Payload::decode("{}")),
            )
            .unwrap_err();
        assert!(matches!(err, Error::ReadingKind { .. }));
    }

    #[test]
    fn test_band_confidence_unclamped() {
        let (held, confidence) = band(1630.0, 1630.0, 50.0);
        assert!(held);
        assert_eq!(confidence, 1.0);
        // At the band edge confidence is 0.5; outside it keeps falling.
        let (held, confidence) = band(1680.0, 1630.0, 50.0);
        assert!(!held);
        assert_eq!(confidence, 0.5);
        let (_, confidence) = band(1880.0, 1630.0, 50.0);
        assert!(confidence < 0.0);
    }

    #[test]
    fn test_new_pot_once_per_half_hour() {
        let mut det = detector();
        // Pot away for 30 s, then a full pot lands and sits stable.
        let mut events = run(&mut det, 0, 300, 0.0);
        events.extend(run(&mut det, 300, 313, 3400.0));

        assert_eq!(count(&events, EventCode::New), 1);
        let new = events.iter().find(|e| e.code == EventCode::New).unwrap();
        assert_eq!(new.weight, Some(3400));
        assert!((new.confidence - 1.0).abs() < 1e-9);

        // A second away/full cycle inside 30 minutes stays quiet.
        let mut later = run(&mut det, 313, 613, 0.0);
        later.extend(run(&mut det, 613, 626, 3400.0));
        assert_eq!(count(&later, EventCode::New), 0);
    }

    #[test]
    fn test_new_pot_needs_removal_first() {
        let mut det = detector();
        // Full pot sits stable with no removal history at all.
        let events = run(&mut det, 0, 200, 3400.0);
        assert_eq!(count(&events, EventCode::New), 0);
    }

    #[test]
    fn test_new_pot_below_band_accepted_after_brewing() {
        let mut det = detector();
        let grind = SensorId::new(GRIND_ID);
        det.register(grind.clone(), DetectorSet::Grind, SensorBuffers::payload(100))
            .unwrap();

        // Pot away while the grinder runs.
        let mut events = run(&mut det, 0, 300, 0.0);
        det.ingest(
            29.95,
            &grind,
            Reading::Power(Payload::decode(r#"{"ENERGY":{"Power":1450}}"#)),
        )
        .unwrap();
        events.extend(det.test(29.95, &grind).unwrap());
        assert_eq!(count(&events, EventCode::Grinding), 1);

        // A half-size pot lands: below the full band, accepted on recent
        // grinder activity with the fallback confidence.
        let events = run(&mut det, 300, 313, 2500.0);
        let new = events.iter().find(|e| e.code == EventCode::New).unwrap();
        assert_eq!(new.weight, Some(2500));
        assert!((new.confidence - NEW_FALLBACK_CONFIDENCE).abs() < 1e-9);
    }

    #[test]
    fn test_removed_edge_fires_once_with_cooldown() {
        let mut det = detector();
        // Pot present 8 s, then lifted off.
        let mut events = run(&mut det, 0, 80, 2500.0);
        events.extend(run(&mut det, 80, 120, 0.0));
        assert_eq!(count(&events, EventCode::Removed), 1);

        // Back on and off again inside the 600 s cool-down: no repeat.
        let mut again = run(&mut det, 120, 200, 2500.0);
        again.extend(run(&mut det, 200, 240, 0.0));
        assert_eq!(count(&again, EventCode::Removed), 0);
    }

    #[test]
    fn test_poured_with_duplicate_suppression() {
        let mut det = detector();
        // Stable pot, a push artifact, then stable one cup lighter.
        let mut events = run(&mut det, 0, 100, 2600.0);
        events.extend(run(&mut det, 100, 110, 4600.0));
        events.extend(run(&mut det, 110, 125, 2500.0));

        assert_eq!(count(&events, EventCode::Poured), 1);
        let poured = events.iter().find(|e| e.code == EventCode::Poured).unwrap();
        assert_eq!(poured.weight_poured, Some(100));
        assert_eq!(poured.weight, Some(2500));
        assert!((poured.confidence - 0.8).abs() < 1e-9);

        // A second pour to a clearly different level is a new event.
        let mut second = run(&mut det, 125, 135, 4600.0);
        second.extend(run(&mut det, 135, 150, 2400.0));
        assert_eq!(count(&second, EventCode::Poured), 1);
        let poured = second.iter().find(|e| e.code == EventCode::Poured).unwrap();
        assert_eq!(poured.weight, Some(2400));
    }

    #[test]
    fn test_poured_needs_push_artifact() {
        let mut det = detector();
        // Weight drifts down a cup's worth with no push spike: the drop
        // alone is not treated as a pour.
        let mut events = run(&mut det, 0, 100, 2600.0);
        events.extend(run(&mut det, 100, 150, 2500.0));
        assert_eq!(count(&events, EventCode::Poured), 0);
    }

    #[test]
    fn test_empty_edge_with_dedup() {
        let mut det = detector();
        // Above the empty band half a minute, then down to empty.
        let mut events = run(&mut det, 0, 320, 1700.0);
        events.extend(run(&mut det, 320, 340, 1630.0));
        assert_eq!(count(&events, EventCode::Empty), 1);
        let empty = events.iter().find(|e| e.code == EventCode::Empty).unwrap();
        assert_eq!(empty.weight, Some(1630));

        // Still empty shortly after: deduplicated.
        let more = run(&mut det, 340, 400, 1630.0);
        assert_eq!(count(&more, EventCode::Empty), 0);
    }

    #[test]
    fn test_replaced_after_removal() {
        let mut det = detector();
        let mut events = run(&mut det, 0, 80, 1700.0);
        events.extend(run(&mut det, 80, 120, 0.0));
        let put_back = run(&mut det, 120, 135, 1700.0);
        assert_eq!(count(&put_back, EventCode::Replaced), 1);
        let replaced = put_back
            .iter()
            .find(|e| e.code == EventCode::Replaced)
            .unwrap();
        assert_eq!(replaced.weight, Some(1700));

        // While the pot was away the fast reject kept REPLACED quiet.
        assert_eq!(count(&events, EventCode::Replaced), 0);
    }

    #[test]
    fn test_power_battery() {
        let mut det = detector();
        let brew = SensorId::new(BREW_ID);
        det.register(brew.clone(), DetectorSet::Brew, SensorBuffers::payload(100))
            .unwrap();

        // Idle draw: telemetry heartbeat carrying the raw payload.
        det.ingest(
            1.0,
            &brew,
            Reading::Power(Payload::decode(r#"{"ENERGY":{"Power":0}}"#)),
        )
        .unwrap();
        let events = det.test(1.0, &brew).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].code, EventCode::BrewStatus);
        assert!(events[0].payload.is_some());

        // Heating element on: BREWING with the power figure.
        det.ingest(
            2.0,
            &brew,
            Reading::Power(Payload::decode(r#"{"ENERGY":{"Power":900}}"#)),
        )
        .unwrap();
        let events = det.test(2.0, &brew).unwrap();
        assert_eq!(events[0].code, EventCode::Brewing);
        assert_eq!(events[0].power, Some(900.0));

        // Malformed telemetry degrades to a heartbeat, never drops.
        det.ingest(3.0, &brew, Reading::Power(Payload::decode("garbage")))
            .unwrap();
        let events = det.test(3.0, &brew).unwrap();
        assert_eq!(events[0].code, EventCode::BrewStatus);
        assert_eq!(events[0].payload.as_ref().unwrap().to_value()["malformed"], "garbage");
    }

    #[test]
    fn test_find_event_adjusts_for_buffer_lag() {
        let mut det = detector();
        det.event_buffer
            .put(100.0, Event::poured(120, 2500, 0.8));

        // 25 s later a 30 s lookback still reaches the event...
        assert!(det.find_event(125.0, EventCode::Poured, 30.0).is_some());
        // ...but 31 s later it no longer does, even though the event is the
        // buffer's newest entry.
        assert!(det.find_event(131.0, EventCode::Poured, 30.0).is_none());
        // Other codes never match.
        assert!(det.find_event(125.0, EventCode::New, 30.0).is_none());
    }

    #[test]
    fn test_events_are_recorded_in_event_buffer() {
        let mut det = detector();
        let mut events = run(&mut det, 0, 300, 0.0);
        events.extend(run(&mut det, 300, 313, 3400.0));
        assert!(count(&events, EventCode::New) > 0);

        let recorded = det
            .event_buffer()
            .find(0, 3600.0, |s| s.value.code == EventCode::New)
            .unwrap();
        assert!(recorded.sample.is_some());
    }
}
