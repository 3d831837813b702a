//! Window lifecycle engine: routes events to windows, advances the
//! watermark, emits early and final results, and isolates aggregation
//! failures per window.

mod types;

#[cfg(test)]
mod tests;

pub use types::{
    EarlyPolicy, EngineOutput, EngineSettings, FailureStage, MergeOutcome, WindowFailure,
};

use std::collections::BTreeMap;

use wr_config::{EarlyResultsConfig, WindowConfig};

use crate::aggregate::{AggregateOp, NumericAggregate};
use crate::error::CoreResult;
use crate::result::WindowResult;
use crate::watermark::WatermarkTracker;
use crate::window::{WindowAssigner, WindowKey, WindowRegistry, WindowState};

// ---------------------------------------------------------------------------
// WindowEngine -- public API
// ---------------------------------------------------------------------------

/// Single-partition window lifecycle state machine.
///
/// Each window moves `Open -> EarlyEmitting -> Closed`. Closing happens
/// exactly once, when the watermark reaches the window end: the final
/// result is produced and the state is dropped. Because the watermark never
/// moves back, a closed key can never be re-created, so no window ever
/// yields a second final result.
///
/// All methods are synchronous and never block; callers take the returned
/// [`EngineOutput`] and hand it to a sink.
pub struct WindowEngine<Op: AggregateOp> {
    op: Op,
    assigner: WindowAssigner,
    settings: EngineSettings,
    watermark: WatermarkTracker,
    windows: WindowRegistry<Op::Acc>,
    errored: BTreeMap<WindowKey, WindowState<Op::Acc>>,
    late_drops: u64,
}

impl WindowEngine<NumericAggregate> {
    /// Engine with the built-in numeric aggregate described by `window`.
    pub fn from_config(window: &WindowConfig, early: &EarlyResultsConfig) -> CoreResult<Self> {
        Ok(Self::new(
            NumericAggregate::new(window.aggregate),
            WindowAssigner::from_config(window)?,
            EngineSettings::from_config(window, early),
        ))
    }
}

impl<Op: AggregateOp> WindowEngine<Op> {
    pub fn new(op: Op, assigner: WindowAssigner, settings: EngineSettings) -> Self {
        Self {
            op,
            assigner,
            settings,
            watermark: WatermarkTracker::new(),
            windows: WindowRegistry::new(),
            errored: BTreeMap::new(),
            late_drops: 0,
        }
    }

    /// Feed one event with event time `ts`.
    ///
    /// 1. Drops the event as late if `ts < watermark - allowed_lateness`,
    ///    or if every window it belongs to is already closed.
    /// 2. Accumulates it into each open window it belongs to.
    /// 3. Advances the watermark to `ts - watermark_delay`, closing windows.
    /// 4. Under [`EarlyPolicy::Count`], emits early results for the windows
    ///    that reached the threshold.
    ///
    /// Fails only when the window bounds for `ts` are not representable.
    pub fn on_event(
        &mut self,
        ts: i64,
        event: &Op::Event,
        now_millis: i64,
    ) -> CoreResult<EngineOutput<Op::Output>> {
        let mut out = EngineOutput::default();
        let wm = self.watermark.current();

        // Lateness is judged against the watermark before this event moves it.
        if ts < wm.saturating_sub(self.settings.allowed_lateness) {
            self.drop_late(ts, &mut out);
            return Ok(out);
        }

        let keys = self.assigner.assign_windows(ts)?;
        let mut any_open = false;
        let mut touched = Vec::with_capacity(keys.len());
        for key in keys {
            if key.is_closed_at(wm) {
                continue;
            }
            any_open = true;
            if self.errored.contains_key(&key) {
                continue;
            }
            let state = self
                .windows
                .get_or_init(key, now_millis, || self.op.init());
            match self.op.accumulate(&mut state.acc, event) {
                Ok(()) => {
                    state.record_event();
                    touched.push(key);
                }
                Err(e) => self.mark_errored(key, FailureStage::Accumulate, e, &mut out),
            }
        }

        if !any_open {
            self.drop_late(ts, &mut out);
            return Ok(out);
        }

        self.advance_to(ts.saturating_sub(self.settings.watermark_delay), &mut out);

        if let EarlyPolicy::Count { every } = self.settings.early {
            for key in touched {
                let due = self
                    .windows
                    .get(&key)
                    .is_some_and(|s| s.events_since_early() >= every);
                if due {
                    self.emit_early(key, now_millis, &mut out);
                }
            }
        }
        Ok(out)
    }

    /// Apply an external watermark signal, then evaluate periodic early
    /// results. A signal below the current watermark only triggers the
    /// periodic evaluation.
    pub fn on_watermark(&mut self, ts: i64, now_millis: i64) -> EngineOutput<Op::Output> {
        let mut out = EngineOutput::default();
        self.advance_to(ts, &mut out);
        self.sweep_periodic(now_millis, &mut out);
        out
    }

    /// Wall-clock tick: evaluates periodic early results only.
    pub fn on_tick(&mut self, now_millis: i64) -> EngineOutput<Op::Output> {
        let mut out = EngineOutput::default();
        self.sweep_periodic(now_millis, &mut out);
        out
    }

    /// Merge a partial accumulator computed elsewhere into `key`.
    pub fn merge_accumulator(&mut self, key: WindowKey, acc: Op::Acc, now_millis: i64) -> MergeOutcome {
        if key.is_closed_at(self.watermark.current()) {
            self.late_drops += 1;
            log::debug!("merge into closed window {key} dropped");
            return MergeOutcome::DroppedLate;
        }
        if self.errored.contains_key(&key) {
            return MergeOutcome::SkippedErrored;
        }
        let state = self
            .windows
            .get_or_init(key, now_millis, || self.op.init());
        self.op.combine(&mut state.acc, acc);
        state.record_event();
        MergeOutcome::Merged
    }

    /// Discard every window, open or errored, without emitting anything.
    /// Returns the number of windows discarded.
    pub fn teardown(&mut self) -> usize {
        let discarded = self.windows.clear() + self.errored.len();
        self.errored.clear();
        if discarded > 0 {
            log::debug!("teardown discarded {discarded} windows");
        }
        discarded
    }

    pub fn watermark(&self) -> i64 {
        self.watermark.current()
    }

    /// Late events dropped since the engine was created.
    pub fn late_drops(&self) -> u64 {
        self.late_drops
    }

    pub fn open_windows(&self) -> usize {
        self.windows.len()
    }

    pub fn window(&self, key: &WindowKey) -> Option<&WindowState<Op::Acc>> {
        self.windows.get(key)
    }

    /// Keys of windows whose aggregate failed while still open, in key
    /// order. An errored window is retired once the watermark reaches its
    /// end; it never yields a result.
    pub fn errored_windows(&self) -> impl Iterator<Item = WindowKey> + '_ {
        self.errored.keys().copied()
    }

    /// Forget an errored window. Returns `false` if `key` is not errored.
    pub fn discard_errored(&mut self, key: &WindowKey) -> bool {
        self.errored.remove(key).is_some()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn assigner(&self) -> &WindowAssigner {
        &self.assigner
    }
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

impl<Op: AggregateOp> WindowEngine<Op> {
    fn advance_to(&mut self, candidate: i64, out: &mut EngineOutput<Op::Output>) {
        let prev = self.watermark.current();
        let wm = self.watermark.advance(candidate);
        if wm == prev {
            return;
        }
        for key in self.windows.closable(wm) {
            self.close(key, out);
        }
        // Errored windows past their end can never receive input again.
        self.errored.retain(|key, _| !key.is_closed_at(wm));
    }

    fn close(&mut self, key: WindowKey, out: &mut EngineOutput<Op::Output>) {
        let Some(state) = self.windows.remove(&key) else {
            return;
        };
        match self.op.finish(&state.acc) {
            Ok(result) => {
                log::debug!(
                    "window {key} closed after {} early results",
                    state.early_emissions()
                );
                out.results.push(WindowResult::new_final(key, result));
            }
            Err(error) => {
                log::warn!("window {key} failed in final finish: {error:#}");
                out.failures.push(WindowFailure {
                    key,
                    stage: FailureStage::FinalFinish,
                    error,
                });
            }
        }
    }

    fn sweep_periodic(&mut self, now_millis: i64, out: &mut EngineOutput<Op::Output>) {
        let EarlyPolicy::Periodic { interval_ms } = self.settings.early else {
            return;
        };
        let wm = self.watermark.current();
        let due: Vec<WindowKey> = self
            .windows
            .iter()
            .filter(|s| {
                s.events_since_early() > 0
                    && !s.key().is_closed_at(wm)
                    && now_millis.saturating_sub(s.last_early_at) >= interval_ms
            })
            .map(|s| s.key())
            .collect();
        for key in due {
            self.emit_early(key, now_millis, out);
        }
    }

    fn emit_early(&mut self, key: WindowKey, now_millis: i64, out: &mut EngineOutput<Op::Output>) {
        let Some(state) = self.windows.get_mut(&key) else {
            return;
        };
        match self.op.finish(&state.acc) {
            Ok(result) => {
                state.record_early(now_millis);
                out.results.push(WindowResult::new(key, result, true));
            }
            Err(e) => self.mark_errored(key, FailureStage::EarlyFinish, e, out),
        }
    }

    /// Move an open window to the errored set and report the failure.
    fn mark_errored(
        &mut self,
        key: WindowKey,
        stage: FailureStage,
        error: anyhow::Error,
        out: &mut EngineOutput<Op::Output>,
    ) {
        log::warn!("window {key} failed in {stage}: {error:#}");
        if let Some(mut state) = self.windows.remove(&key) {
            state.mark_errored();
            self.errored.insert(key, state);
        }
        out.failures.push(WindowFailure { key, stage, error });
    }

    fn drop_late(&mut self, ts: i64, out: &mut EngineOutput<Op::Output>) {
        self.late_drops += 1;
        out.dropped_late += 1;
        log::debug!(
            "late event at {ts} dropped (watermark {})",
            self.watermark.current()
        );
    }
}
