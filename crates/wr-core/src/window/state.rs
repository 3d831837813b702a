use super::WindowKey;

/// Lifecycle position of a window that is still held by the engine.
///
/// A closed window is not represented: closing emits the final result and
/// drops the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStatus {
    /// Accepting events, nothing emitted yet.
    Open,
    /// Accepting events, at least one early result emitted.
    EarlyEmitting,
    /// The aggregate failed for this window. It emits nothing further.
    Errored,
}

/// Per-window bookkeeping, owned by the [`WindowRegistry`](super::WindowRegistry).
#[derive(Debug, Clone)]
pub struct WindowState<A> {
    pub(crate) key: WindowKey,
    pub(crate) acc: A,
    pub(crate) status: WindowStatus,
    pub(crate) early_emissions: u32,
    /// Events folded in since the last early result (or since creation).
    pub(crate) events_since_early: u64,
    /// Wall-clock millis of the last early result, or of creation.
    pub(crate) last_early_at: i64,
}

impl<A> WindowState<A> {
    pub(crate) fn new(key: WindowKey, acc: A, now_millis: i64) -> Self {
        Self {
            key,
            acc,
            status: WindowStatus::Open,
            early_emissions: 0,
            events_since_early: 0,
            last_early_at: now_millis,
        }
    }

    pub fn key(&self) -> WindowKey {
        self.key
    }

    pub fn accumulator(&self) -> &A {
        &self.acc
    }

    pub fn status(&self) -> WindowStatus {
        self.status
    }

    /// Number of early results already sent for this window.
    pub fn early_emissions(&self) -> u32 {
        self.early_emissions
    }

    pub fn events_since_early(&self) -> u64 {
        self.events_since_early
    }

    pub(crate) fn record_event(&mut self) {
        self.events_since_early += 1;
    }

    pub(crate) fn record_early(&mut self, now_millis: i64) {
        self.status = WindowStatus::EarlyEmitting;
        self.early_emissions += 1;
        self.events_since_early = 0;
        self.last_early_at = now_millis;
    }

    pub(crate) fn mark_errored(&mut self) {
        self.status = WindowStatus::Errored;
    }

    pub fn is_errored(&self) -> bool {
        self.status == WindowStatus::Errored
    }
}
