// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/brewsense-rs

//! Periodic aggregate cache over a raw sample stream.
//!
//! A [`StatsBuffer`] sits next to a scale's [`SampleBuffer`] and flushes one
//! [`StatsRecord`] per aggregation cycle so the detectors can scan seconds
//! of history without recomputing medians on every tick.
//!
//! The cadence contract matters: a cycle closes when the *source stream's*
//! latest timestamp passes `cycle_start + duration`, so record spacing
//! tracks the wall-clock drift of the samples, not a fixed clock. Offset
//! `i` into a stats buffer therefore means "the i-th most recently flushed
//! record", **not** "`i * duration` seconds ago". Consumers that need real
//! time must read the record timestamps.

use super::{Sample, SampleBuffer, WindowFind};

/// Aggregates for one cycle of the source stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsRecord {
    /// Median of the source values over the cycle window.
    pub median: f64,
    /// RMS deviation of the source values around that median.
    pub deviation: f64,
    /// Actual time span of the contributing samples (`<=` the configured
    /// duration, given the stochastic arrival of source samples).
    pub duration: f64,
    /// Number of contributing samples.
    pub samples: usize,
}

/// Periodic statistics cache derived from a scalar [`SampleBuffer`].
#[derive(Debug)]
pub struct StatsBuffer {
    records: SampleBuffer<StatsRecord>,
    duration: f64,
    cycle_start: Option<f64>,
}

impl StatsBuffer {
    /// Create a cache of `capacity` records aggregating `duration` seconds
    /// of source samples each.
    pub fn new(capacity: usize, duration: f64) -> Self {
        Self {
            records: SampleBuffer::new(capacity),
            duration,
            cycle_start: None,
        }
    }

    /// Configured aggregation cycle length, seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Number of records flushed so far, saturating at capacity.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if no record has been flushed yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Advance the cycle from the source stream. Called after every `put`
    /// on the source buffer.
    ///
    /// The first call anchors `cycle_start`; thereafter, once the source's
    /// latest timestamp passes `cycle_start + duration`, a record is
    /// computed over the trailing window and the cycle restarts at that
    /// timestamp.
    pub fn update(&mut self, source: &SampleBuffer<f64>) {
        let Some(latest) = source.get(0) else {
            return;
        };
        let ts = latest.ts;
        match self.cycle_start {
            None => self.cycle_start = Some(ts),
            Some(start) if ts > start + self.duration => {
                self.flush(source, ts);
                self.cycle_start = Some(ts);
            }
            Some(_) => {}
        }
    }

    /// Compute and store one record. A window that cannot produce a median
    /// (fewer than three samples) flushes nothing; the detectors skip such
    /// cycles either way.
    fn flush(&mut self, source: &SampleBuffer<f64>, ts: f64) {
        let Some(median) = source.median(0, self.duration) else {
            return;
        };
        let Some(deviation) = source.deviation(0, self.duration, median.value) else {
            return;
        };
        self.records.put(
            ts,
            StatsRecord {
                median: median.value,
                deviation: deviation.value,
                duration: deviation.duration,
                samples: deviation.samples,
            },
        );
    }

    /// The `offset`-th most recently flushed record.
    pub fn get(&self, offset: usize) -> Option<&Sample<StatsRecord>> {
        self.records.get(offset)
    }

    /// Median of the most recently flushed record, if any.
    pub fn latest_median(&self) -> Option<f64> {
        self.get(0).map(|sample| sample.value.median)
    }

    /// Search the flushed records, newest to oldest, for the most recent
    /// one satisfying `pred`. Window semantics are [`SampleBuffer::find`]'s,
    /// anchored at the newest record's own timestamp.
    pub fn find<F>(&self, offset: usize, duration: f64, pred: F) -> Option<WindowFind<StatsRecord>>
    where
        F: FnMut(&Sample<StatsRecord>) -> bool,
    {
        self.records.find(offset, duration, pred)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(source: &mut SampleBuffer<f64>, stats: &mut StatsBuffer, ts: f64, value: f64) {
        source.put(ts, value);
        stats.update(source);
    }

    #[test]
    fn test_no_record_until_duration_passes() {
        let mut source = SampleBuffer::new(100);
        let mut stats = StatsBuffer::new(10, 1.0);

        for i in 0..5 {
            put(&mut source, &mut stats, i as f64 * 0.25, 10.0 * (i + 1) as f64);
        }
        // Latest ts is 1.0, not yet past cycle_start (0.0) + duration.
        assert!(stats.is_empty());

        put(&mut source, &mut stats, 1.25, 60.0);
        assert_eq!(stats.len(), 1);

        let record = stats.get(0).unwrap();
        assert_eq!(record.ts, 1.25);
        // Window [0.25, 1.25] holds 60, 50, 40, 30, 20.
        assert_eq!(record.value.samples, 5);
        assert_eq!(record.value.median, 40.0);
        assert!((record.value.duration - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cycle_restarts_at_flush() {
        let mut source = SampleBuffer::new(100);
        let mut stats = StatsBuffer::new(10, 1.0);

        for i in 0..30 {
            put(&mut source, &mut stats, i as f64 * 0.25, 100.0);
        }
        // First flush at 1.25, then every fifth sample (the first ts past
        // the restarted cycle): 2.5, 3.75, ...
        assert_eq!(stats.get(stats.len() - 1).unwrap().ts, 1.25);
        assert_eq!(stats.len(), 5);
    }

    #[test]
    fn test_offset_is_records_not_seconds() {
        let mut source = SampleBuffer::new(100);
        let mut stats = StatsBuffer::new(10, 1.0);

        // Samples arriving at 0.4 s spacing: cycles close when the stream
        // passes the boundary, so records land 1.2 s apart, not 1.0 s.
        for i in 0..10 {
            put(&mut source, &mut stats, i as f64 * 0.4, 100.0);
        }
        assert!(stats.len() >= 2);
        let newest = stats.get(0).unwrap().ts;
        let prior = stats.get(1).unwrap().ts;
        assert!((newest - prior - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_sparse_window_flushes_nothing() {
        let mut source = SampleBuffer::new(100);
        let mut stats = StatsBuffer::new(10, 1.0);

        // Two samples 5 s apart: the cycle closes but the window holds too
        // few samples for a median, so no record appears.
        put(&mut source, &mut stats, 0.0, 100.0);
        put(&mut source, &mut stats, 5.0, 100.0);
        assert!(stats.is_empty());
    }
}
