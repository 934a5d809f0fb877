//! Windowed average over the measurement history.
//!
//! ```text
//!   front (newest)                                     back (oldest)
//!   ┌──────┬──────┬──────┬──────┬─────────────────────┬──────┐
//!   │ t=99 │ t=98 │ t=97 │  …   │                     │ t=0  │   capacity 9000
//!   └──────┴──────┴──────┴──────┴─────────────────────┴──────┘
//!   average(now, w): walk from the front, stop at the first sample with
//!   now - t > w.
//! ```
//!
//! Timestamps never decrease from back to front, so the scan ends at the
//! window edge instead of visiting the whole history.  Errored readings are
//! skipped per channel; a channel with fewer than `max(1, w / 20)` samples
//! in the window is flagged as erroneous (one sample per 20 s expected).

use std::collections::VecDeque;
use std::sync::Arc;

use crate::board::MessageBoard;
use crate::board::message::{AverageReport, Measurement, Message, Reply, Topic};
use crate::clock::Clock;
use crate::component::Component;
use crate::error::HistoryError;
use crate::sensors::SensorData;

/// 24 h at one sample per 10 s.
pub const DEFAULT_CAPACITY: usize = 9000;

/// Seconds of window per expected sample.
const SECS_PER_SAMPLE: f64 = 20.0;

// ───────────────────────────────────────────────────────────────
// History
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct History {
    samples: VecDeque<Measurement>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn newest(&self) -> Option<&Measurement> {
        self.samples.front()
    }

    pub fn oldest(&self) -> Option<&Measurement> {
        self.samples.back()
    }

    /// Insert at the front, evicting the oldest sample when full.
    pub fn record(&mut self, sample: Measurement) -> Result<(), HistoryError> {
        if let Some(newest) = self.samples.front() {
            if sample.uptime < newest.uptime {
                return Err(HistoryError::NonMonotonic {
                    previous: newest.uptime,
                    next: sample.uptime,
                });
            }
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_back();
        }
        self.samples.push_front(sample);
        Ok(())
    }

    /// Per-channel mean of the samples no older than `window` seconds
    /// before `now` (both ends inclusive).
    pub fn average(&self, now: f64, window: f64) -> AverageReport {
        let mut indoor = Accumulator::default();
        let mut outdoor = Accumulator::default();
        for sample in &self.samples {
            if now - sample.uptime > window {
                break;
            }
            indoor.add(&sample.indoor);
            outdoor.add(&sample.outdoor);
        }
        AverageReport {
            indoor: indoor.finish(window),
            outdoor: outdoor.finish(window),
        }
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[derive(Default)]
struct Accumulator {
    humidity: f64,
    temperature: f64,
    tau: f64,
    count: u32,
}

impl Accumulator {
    fn add(&mut self, data: &SensorData) {
        if data.error {
            return;
        }
        self.humidity += data.humidity;
        self.temperature += data.temperature;
        self.tau += data.tau;
        self.count += 1;
    }

    fn finish(self, window: f64) -> SensorData {
        let expected = f64::max(1.0, window / SECS_PER_SAMPLE);
        let error = f64::from(self.count) < expected;
        if self.count == 0 {
            return SensorData {
                humidity: 0.0,
                temperature: 0.0,
                tau: 0.0,
                error,
            };
        }
        let n = f64::from(self.count);
        SensorData {
            humidity: self.humidity / n,
            temperature: self.temperature / n,
            tau: self.tau / n,
            error,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Component
// ───────────────────────────────────────────────────────────────

/// State of the `average` component: the history plus the clock that
/// defines "now" for requests.
pub struct WindowedAverage {
    history: History,
    clock: Arc<dyn Clock>,
}

impl WindowedAverage {
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            history: History::new(capacity),
            clock,
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn record(&mut self, sample: Measurement) -> Result<(), HistoryError> {
        self.history.record(sample)
    }

    pub fn average(&self, window_secs: f64) -> AverageReport {
        self.history.average(self.clock.uptime(), window_secs)
    }

    /// Subscribes to `Measurement` and answers `Average` requests.
    pub fn component(self, board: Arc<MessageBoard>) -> Component<Self> {
        Component::new("average", board, self)
            .on(Topic::Measurement, |average, _, message| {
                if let Message::Measurement(sample) = message {
                    average.record(*sample)?;
                }
                Ok(None)
            })
            .on(Topic::Average, |average, _, message| match message {
                Message::Average(secs) => Ok(Some(Reply::Average(
                    average.average(f64::from(*secs)),
                ))),
                _ => Ok(None),
            })
    }
}
