use std::fmt;

use serde::Serialize;

/// Identity of one window instance: the half-open interval `[start, end)`
/// in epoch milliseconds. Ordered by `start`, then `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WindowKey {
    start: i64,
    end: i64,
}

impl WindowKey {
    /// Returns `None` unless `start < end`.
    pub fn new(start: i64, end: i64) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// Caller guarantees `start < end`.
    pub(crate) fn from_ordered(start: i64, end: i64) -> Self {
        debug_assert!(start < end, "window start {start} must be < end {end}");
        Self { start, end }
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    pub fn contains(&self, ts: i64) -> bool {
        self.start <= ts && ts < self.end
    }

    /// A window is closed once the watermark has reached its end.
    pub fn is_closed_at(&self, watermark: i64) -> bool {
        watermark >= self.end
    }
}

impl fmt::Display for WindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
