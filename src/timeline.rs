//! Execution timeline recording.
//!
//! Records the `[start, end)` interval of each measured future relative to a
//! common origin, so serialized execution can be shown and checked.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use tokio::time::Instant;

/// One recorded execution interval, in milliseconds since the timeline origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub label: String,
    pub start_ms: f64,
    pub end_ms: f64,
}

impl Interval {
    pub fn duration_ms(&self) -> f64 {
        self.end_ms - self.start_ms
    }

    /// Half-open overlap: touching endpoints do not overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start_ms < other.end_ms && other.start_ms < self.end_ms
    }
}

/// Serializable snapshot of a [`Timeline`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineReport {
    pub started_at: DateTime<Utc>,
    pub intervals: Vec<Interval>,
    pub busy_ms: f64,
    pub span_ms: f64,
}

/// Thread-safe interval recorder.
#[derive(Debug)]
pub struct Timeline {
    origin: Instant,
    started_at: DateTime<Utc>,
    intervals: Mutex<Vec<Interval>>,
}

impl Timeline {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            started_at: Utc::now(),
            intervals: Mutex::new(Vec::new()),
        }
    }

    /// Await `fut`, recording when it started and finished.
    ///
    /// Nothing is recorded if `fut` panics or is dropped before completing.
    pub async fn measure<Fut>(&self, label: impl Into<String>, fut: Fut) -> Fut::Output
    where
        Fut: Future,
    {
        let start = Instant::now();
        let output = fut.await;
        self.record(label, start, Instant::now());
        output
    }

    /// Record an interval from two instants.
    pub fn record(&self, label: impl Into<String>, start: Instant, end: Instant) {
        let interval = Interval {
            label: label.into(),
            start_ms: self.offset_ms(start),
            end_ms: self.offset_ms(end),
        };
        self.intervals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(interval);
    }

    /// All intervals, ordered by start.
    pub fn intervals(&self) -> Vec<Interval> {
        let mut intervals = self
            .intervals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        intervals.sort_by(|a, b| a.start_ms.total_cmp(&b.start_ms));
        intervals
    }

    /// Every pair of intervals that overlap. Empty for serialized execution.
    pub fn overlapping_pairs(&self) -> Vec<(Interval, Interval)> {
        let intervals = self.intervals();
        let mut pairs = Vec::new();
        for (i, a) in intervals.iter().enumerate() {
            for b in &intervals[i + 1..] {
                if a.overlaps(b) {
                    pairs.push((a.clone(), b.clone()));
                }
            }
        }
        pairs
    }

    /// Sum of recorded durations.
    pub fn busy_ms(&self) -> f64 {
        self.intervals().iter().map(Interval::duration_ms).sum()
    }

    /// From the earliest start to the latest end; 0 when empty.
    pub fn span_ms(&self) -> f64 {
        let intervals = self.intervals();
        let Some(first) = intervals.first() else {
            return 0.0;
        };
        let last_end = intervals
            .iter()
            .map(|i| i.end_ms)
            .fold(f64::MIN, f64::max);
        last_end - first.start_ms
    }

    pub fn report(&self) -> TimelineReport {
        TimelineReport {
            started_at: self.started_at,
            intervals: self.intervals(),
            busy_ms: self.busy_ms(),
            span_ms: self.span_ms(),
        }
    }

    fn offset_ms(&self, at: Instant) -> f64 {
        at.saturating_duration_since(self.origin).as_secs_f64() * 1000.0
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}
