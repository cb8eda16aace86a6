//! # Rolling Series
//!
//! Fixed-capacity FIFO history of `(elapsed seconds, value)` points for one
//! display channel.
//!
//! A series starts untracked. The first [`RollingSeries::append`] anchors
//! elapsed time zero to that sample's timestamp; later samples are placed
//! relative to the anchor. Once the window is full the oldest point is
//! dropped. [`RollingSeries::reset`] clears both the points and the anchor.
//!
//! ## Usage
//!
//! ```
//! use chrono::{Duration, Utc};
//! use taternauts_gs::telemetry::series::RollingSeries;
//!
//! let t0 = Utc::now();
//! let mut altitude: RollingSeries<f64> = RollingSeries::new(20);
//! altitude.append(100.0, t0);
//! altitude.append(120.0, t0 + Duration::seconds(2));
//!
//! let points = altitude.snapshot();
//! assert_eq!(points[0].elapsed, 0.0);
//! assert_eq!(points[1].elapsed, 2.0);
//! ```

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Default number of points kept per channel
pub const DEFAULT_WINDOW: usize = 20;

/// One plotted point
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint<V> {
    /// Seconds since the series' first sample
    pub elapsed: f64,
    /// Channel value
    pub value: V,
}

/// Sliding window of samples for one channel
///
/// `V` is `f64` for scalar channels and `[f64; 3]` for rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingSeries<V> {
    points: VecDeque<SeriesPoint<V>>,
    anchor: Option<DateTime<Utc>>,
    capacity: usize,
}

impl<V> Default for RollingSeries<V> {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl<V> RollingSeries<V> {
    /// Create an untracked series holding at most `capacity` points
    ///
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity + 1),
            anchor: None,
            capacity,
        }
    }

    /// Add a sample, anchoring the series if this is the first one
    ///
    /// Samples with identical timestamps are all kept in arrival order.
    /// A timestamp earlier than the anchor is placed at zero.
    pub fn append(&mut self, value: V, timestamp: DateTime<Utc>) {
        let anchor = *self.anchor.get_or_insert(timestamp);
        let elapsed = elapsed_seconds(anchor, timestamp).max(0.0);

        self.points.push_back(SeriesPoint { elapsed, value });
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
    }

    /// Drop all points and the time anchor
    pub fn reset(&mut self) {
        self.points.clear();
        self.anchor = None;
    }

    /// Whether a first sample has anchored the series
    pub fn is_tracking(&self) -> bool {
        self.anchor.is_some()
    }

    /// Timestamp of elapsed zero, if tracking
    pub fn anchor(&self) -> Option<DateTime<Utc>> {
        self.anchor
    }

    /// Number of points currently held
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the series holds no points
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Maximum number of points held
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Elapsed span covered by the window, once it has two or more points
    pub fn x_range(&self) -> Option<(f64, f64)> {
        if self.points.len() > 1 {
            Some((self.points.front()?.elapsed, self.points.back()?.elapsed))
        } else {
            None
        }
    }
}

impl<V: Clone> RollingSeries<V> {
    /// Points oldest first, without touching the series
    pub fn snapshot(&self) -> Vec<SeriesPoint<V>> {
        self.points.iter().cloned().collect()
    }

    /// Newest point
    pub fn latest(&self) -> Option<SeriesPoint<V>> {
        self.points.back().cloned()
    }
}

fn elapsed_seconds(anchor: DateTime<Utc>, timestamp: DateTime<Utc>) -> f64 {
    let delta = timestamp - anchor;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}
