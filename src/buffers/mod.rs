// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/brewsense-rs

//! Circular sample buffers and duration-windowed statistics.
//!
//! [`SampleBuffer`] is the storage primitive for every stream in the node:
//! raw scale readings (`f64`), smart-plug payloads, per-second statistics
//! records and emitted events all live in one. It is a fixed-capacity
//! circular buffer addressed by *offset*: offset `0` is the most recently
//! written sample, larger offsets are older. Writing past capacity
//! overwrites the oldest slot; reading a slot that was never written (or an
//! offset past capacity) yields `None`, never an error.
//!
//! The windowed scans (`mean`/`median`/`deviation`/`find`) all share one
//! walk: starting at an offset they move toward older samples, accumulating
//! while `sample.ts >= first.ts - duration`, and stop at the first unwritten
//! slot or on wrapping back to the start. The result reports the offset of
//! the first sample *outside* the window so scans can be chained
//! ("the window before this one").

mod stats;

pub use stats::{StatsBuffer, StatsRecord};

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// One timestamped sample. Immutable once stored.
///
/// `ts` is floating-point Unix epoch seconds, matching the wire format of
/// the platform uplink.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample<T> {
    /// Unix timestamp, seconds.
    pub ts: f64,
    /// Sample value.
    pub value: T,
}

/// Result of a windowed numeric scan (`mean`, `median`, `deviation`).
///
/// All fields describe the same walk: `value` is the statistic, `samples`
/// how many buffer entries contributed, `duration` the time span from the
/// oldest to the newest contributing sample. `next_offset` is the offset of
/// the first sample older than the window - the anchor for a chained scan -
/// or `None` when the walk exhausted the buffer before leaving the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    /// The computed statistic.
    pub value: f64,
    /// Offset of the first sample outside the window, if the buffer held one.
    pub next_offset: Option<usize>,
    /// Actual time span covered by the contributing samples.
    pub duration: f64,
    /// Number of contributing samples.
    pub samples: usize,
}

/// Result of a windowed search ([`SampleBuffer::find`]).
///
/// `sample` is the most recent in-window match, or `None` when the predicate
/// never held - an explicit "not found", distinct from the whole result
/// being `None` (buffer empty at the starting offset).
#[derive(Debug, Clone)]
pub struct WindowFind<T> {
    /// Most recent matching sample, if any.
    pub sample: Option<Sample<T>>,
    /// Offset of the first sample older than the match (or the window).
    pub next_offset: Option<usize>,
    /// Time span walked from the newest sample to the last one visited.
    pub duration: f64,
    /// Number of samples visited.
    pub samples: usize,
}

/// Fixed-capacity circular buffer of timestamped samples.
///
/// Invariants:
/// - a valid offset is in `[0, capacity)`; anything else reads as `None`
/// - `put` past capacity overwrites the oldest slot
/// - samples are immutable once stored; aging out by overwrite is the only
///   form of removal
#[derive(Debug)]
pub struct SampleBuffer<T> {
    slots: Vec<Option<Sample<T>>>,
    write_pos: usize,
    len: usize,
}

impl<T> SampleBuffer<T> {
    /// Create a buffer holding at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "sample buffer needs a non-zero capacity");
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            write_pos: 0,
            len: 0,
        }
    }

    /// Maximum number of samples the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of samples written so far, saturating at capacity.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Store a sample at the write cursor. O(1); overwrites the oldest
    /// sample once the buffer has wrapped.
    pub fn put(&mut self, ts: f64, value: T) {
        self.slots[self.write_pos] = Some(Sample { ts, value });
        self.write_pos = (self.write_pos + 1) % self.slots.len();
        if self.len < self.slots.len() {
            self.len += 1;
        }
    }

    /// Look up the sample `offset` entries before the most recent write.
    ///
    /// Offset `0` is the latest sample. Offsets past capacity or pointing at
    /// a never-written slot are a caller's normal probing pattern, not a
    /// fault, and read as `None`.
    pub fn get(&self, offset: usize) -> Option<&Sample<T>> {
        let capacity = self.slots.len();
        if offset >= capacity {
            return None;
        }
        let index = (self.write_pos + capacity - offset - 1) % capacity;
        self.slots[index].as_ref()
    }

    /// The most recent sample, if any.
    pub fn latest(&self) -> Option<&Sample<T>> {
        self.get(0)
    }
}

impl<T: Clone> SampleBuffer<T> {
    /// Search a window for the most recent sample satisfying `pred`.
    ///
    /// The walk runs newest to oldest from `offset`, so the first hit is the
    /// most recent match and is returned immediately. Returns `None` only
    /// when the buffer is empty at `offset`; a predicate that never holds
    /// yields `Some` with `sample: None`. The predicate observes samples,
    /// it cannot mutate buffer state.
    pub fn find<F>(&self, offset: usize, duration: f64, mut pred: F) -> Option<WindowFind<T>>
    where
        F: FnMut(&Sample<T>) -> bool,
    {
        let first = self.get(offset)?;
        let end_ts = first.ts;
        let limit = end_ts - duration;

        let mut samples = 0usize;
        let mut walked = 0.0;
        let mut o = offset;
        loop {
            let sample = match self.get(o) {
                // Unwritten slot or wrapped past capacity: buffer exhausted.
                None => {
                    return Some(WindowFind {
                        sample: None,
                        next_offset: None,
                        duration: walked,
                        samples,
                    });
                }
                Some(s) => s,
            };
            if sample.ts < limit {
                return Some(WindowFind {
                    sample: None,
                    next_offset: Some(o),
                    duration: walked,
                    samples,
                });
            }
            samples += 1;
            walked = end_ts - sample.ts;
            if pred(sample) {
                let next_offset = if self.get(o + 1).is_some() {
                    Some(o + 1)
                } else {
                    None
                };
                return Some(WindowFind {
                    sample: Some(sample.clone()),
                    next_offset,
                    duration: walked,
                    samples,
                });
            }
            o += 1;
        }
    }
}

impl SampleBuffer<f64> {
    /// Mean of the window anchored at `offset` reaching back `duration`
    /// seconds. `None` iff the buffer is empty at `offset`.
    pub fn mean(&self, offset: usize, duration: f64) -> Option<WindowStats> {
        let first = self.get(offset)?;
        let end_ts = first.ts;
        let limit = end_ts - duration;

        let mut total = first.value;
        let mut begin_ts = first.ts;
        let mut samples = 1usize;
        let mut next_offset = None;
        for o in offset + 1.. {
            match self.get(o) {
                None => break,
                Some(s) if s.ts < limit => {
                    next_offset = Some(o);
                    break;
                }
                Some(s) => {
                    total += s.value;
                    samples += 1;
                    begin_ts = s.ts;
                }
            }
        }
        Some(WindowStats {
            value: total / samples as f64,
            next_offset,
            duration: end_ts - begin_ts,
            samples,
        })
    }

    /// Median of the window anchored at `offset` reaching back `duration`
    /// seconds. Requires at least three in-window samples; fewer is
    /// "insufficient data" and the whole result is `None`, as it is when the
    /// buffer is empty at `offset`.
    pub fn median(&self, offset: usize, duration: f64) -> Option<WindowStats> {
        let first = self.get(offset)?;
        let end_ts = first.ts;
        let limit = end_ts - duration;

        let mut values = vec![first.value];
        let mut begin_ts = first.ts;
        let mut next_offset = None;
        for o in offset + 1.. {
            match self.get(o) {
                None => break,
                Some(s) if s.ts < limit => {
                    next_offset = Some(o);
                    break;
                }
                Some(s) => {
                    values.push(s.value);
                    begin_ts = s.ts;
                }
            }
        }
        if values.len() < 3 {
            return None;
        }

        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let n = values.len();
        let value = if n % 2 == 0 {
            (values[n / 2 - 1] + values[n / 2]) / 2.0
        } else {
            values[n / 2]
        };
        Some(WindowStats {
            value,
            next_offset,
            duration: end_ts - begin_ts,
            samples: n,
        })
    }

    /// Root-mean-square distance of the windowed values from a supplied
    /// average. The divisor is the sample count, not `count - 1`, so a
    /// single-sample window still has a deviation.
    pub fn deviation(&self, offset: usize, duration: f64, avg: f64) -> Option<WindowStats> {
        let first = self.get(offset)?;
        let end_ts = first.ts;
        let limit = end_ts - duration;

        let mut variance = (first.value - avg).powi(2);
        let mut begin_ts = first.ts;
        let mut samples = 1usize;
        let mut next_offset = None;
        for o in offset + 1.. {
            match self.get(o) {
                None => break,
                Some(s) if s.ts < limit => {
                    next_offset = Some(o);
                    break;
                }
                Some(s) => {
                    variance += (s.value - avg).powi(2);
                    samples += 1;
                    begin_ts = s.ts;
                }
            }
        }
        Some(WindowStats {
            value: (variance / samples as f64).sqrt(),
            next_offset,
            duration: end_ts - begin_ts,
            samples,
        })
    }

    /// Pump every stored sample, oldest to newest, through `process`.
    pub fn play<F>(&self, mut process: F)
    where
        F: FnMut(f64, f64),
    {
        for offset in (0..self.capacity()).rev() {
            if let Some(sample) = self.get(offset) {
                process(sample.ts, sample.value);
            }
        }
    }

    /// Save the buffer contents as `ts,value` CSV records, oldest to newest.
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let mut file = File::create(path)?;
        for offset in (0..self.capacity()).rev() {
            if let Some(sample) = self.get(offset) {
                writeln!(file, "{},{}", sample.ts, sample.value)?;
            }
        }
        Ok(())
    }

    /// Reset the buffer and load `ts,value` CSV records from a file.
    ///
    /// Lines that do not parse as a timestamp/value pair are skipped, the
    /// way a capture file with stray blank lines loads cleanly. Returns the
    /// number of samples loaded.
    pub fn load(&mut self, path: &Path) -> crate::Result<usize> {
        let capacity = self.capacity();
        self.slots.clear();
        self.slots.resize_with(capacity, || None);
        self.write_pos = 0;
        self.len = 0;

        let reader = BufReader::new(File::open(path)?);
        let mut loaded = 0usize;
        for line in reader.lines() {
            let line = line?;
            let mut fields = line.splitn(2, ',');
            let (Some(ts), Some(value)) = (fields.next(), fields.next()) else {
                continue;
            };
            let (Ok(ts), Ok(value)) = (ts.trim().parse::<f64>(), value.trim().parse::<f64>())
            else {
                continue;
            };
            self.put(ts, value);
            loaded += 1;
        }
        Ok(loaded)
    }
}
