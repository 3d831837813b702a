use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{ResultSink, SinkAck};
use crate::result::WindowResult;

/// In-process collector. With a capacity it rejects once full, until the
/// caller drains it.
pub struct MemorySink<R> {
    results: Mutex<Vec<WindowResult<R>>>,
    capacity: Option<usize>,
    reject_budget: AtomicUsize,
}

impl<R> Default for MemorySink<R> {
    fn default() -> Self {
        Self {
            results: Mutex::new(Vec::new()),
            capacity: None,
            reject_budget: AtomicUsize::new(0),
        }
    }
}

impl<R: Clone> MemorySink<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Reject the next `n` offers regardless of capacity.
    pub fn reject_next(&self, n: usize) {
        self.reject_budget.store(n, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Vec<WindowResult<R>> {
        self.results.lock().expect("memory sink lock poisoned").clone()
    }

    pub fn drain(&self) -> Vec<WindowResult<R>> {
        std::mem::take(&mut *self.results.lock().expect("memory sink lock poisoned"))
    }

    pub fn len(&self) -> usize {
        self.results.lock().expect("memory sink lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<R: Clone + Send> ResultSink<R> for MemorySink<R> {
    fn accept(&self, result: &WindowResult<R>) -> SinkAck {
        let forced = self
            .reject_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if forced {
            return SinkAck::Reject;
        }
        let mut results = self.results.lock().expect("memory sink lock poisoned");
        if self.capacity.is_some_and(|cap| results.len() >= cap) {
            return SinkAck::Reject;
        }
        results.push(result.clone());
        SinkAck::Ack
    }
}
