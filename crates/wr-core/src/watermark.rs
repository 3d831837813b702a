use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Monotonic low watermark for one partition.
///
/// Starts at `i64::MIN` (nothing is known to be complete) and only ever
/// moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkTracker {
    current: i64,
}

impl Default for WatermarkTracker {
    fn default() -> Self {
        Self { current: i64::MIN }
    }
}

impl WatermarkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the watermark to `max(current, candidate)` and return it.
    pub fn advance(&mut self, candidate: i64) -> i64 {
        self.current = self.current.max(candidate);
        self.current
    }

    pub fn current(&self) -> i64 {
        self.current
    }
}

/// Monotonic-max reducer shared by every partition when a single global
/// watermark is configured. Safe for concurrent `advance` calls.
#[derive(Debug, Clone)]
pub struct SharedWatermark {
    inner: Arc<AtomicI64>,
}

impl Default for SharedWatermark {
    fn default() -> Self {
        Self {
            inner: Arc::new(AtomicI64::new(i64::MIN)),
        }
    }
}

impl SharedWatermark {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `candidate` into the shared value and return the reduced
    /// watermark, which is never below `candidate`.
    pub fn advance(&self, candidate: i64) -> i64 {
        let prev = self.inner.fetch_max(candidate, Ordering::AcqRel);
        prev.max(candidate)
    }

    pub fn current(&self) -> i64 {
        self.inner.load(Ordering::Acquire)
    }
}
