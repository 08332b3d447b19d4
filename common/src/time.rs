//! Time utilities for the daybook workspace.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A timestamp with timezone (always UTC for daybook).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// A half-open time range `[start, end)` used by activity queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeRange {
    /// Create a new range. `end` before `start` yields an empty range.
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    /// Range covering the last `duration` up to now.
    pub fn last(duration: Duration) -> Self {
        let end = now();
        Self {
            start: end - duration,
            end,
        }
    }

    /// Whether the instant falls inside the range.
    pub fn contains(&self, at: Timestamp) -> bool {
        at >= self.start && at < self.end
    }

    /// Whether the range contains no instants.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}
