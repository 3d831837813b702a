use std::sync::Arc;

use tokio::time::Instant;
use wr_core::{EngineOutput, NumericAggregate, Payload, SharedWatermark, WindowEngine};

use crate::metrics::RuntimeMetrics;
use crate::outbound::{Outbound, PendingFinals};

use super::task_types::PartitionInput;

// ---------------------------------------------------------------------------
// PartitionTask -- state owned by one partition loop
// ---------------------------------------------------------------------------

/// Each `PartitionTask` owns its engine exclusively; nothing else touches
/// the window state.
pub(super) struct PartitionTask {
    pub(super) id: usize,
    engine: WindowEngine<NumericAggregate>,
    pub(super) outbound: Outbound,
    pub(super) pending: PendingFinals,
    shared: Option<SharedWatermark>,
    metrics: Arc<RuntimeMetrics>,
    started: Instant,
}

impl PartitionTask {
    pub(super) fn new(
        id: usize,
        engine: WindowEngine<NumericAggregate>,
        outbound: Outbound,
        shared: Option<SharedWatermark>,
        metrics: Arc<RuntimeMetrics>,
    ) -> Self {
        Self {
            id,
            engine,
            outbound,
            pending: PendingFinals::new(),
            shared,
            metrics,
            started: Instant::now(),
        }
    }

    /// Wall-clock millis since the task started.
    fn now(&self) -> i64 {
        self.started.elapsed().as_millis() as i64
    }

    // -- Input --------------------------------------------------------------

    pub(super) fn handle(&mut self, input: PartitionInput) {
        let now = self.now();
        match input {
            PartitionInput::Event { ts, value } => {
                self.metrics.inc_event();
                match self.engine.on_event(ts, &value, now) {
                    Ok(out) => self.publish(out),
                    Err(e) => {
                        self.metrics.inc_unassignable();
                        wr_warn!(pipe, partition = self.id, ts, error = %e, "event has no assignable window");
                    }
                }
                // Fold this partition's progress into the shared watermark.
                let own = self.engine.watermark();
                if let Some(reduced) = self.shared.as_ref().map(|s| s.advance(own))
                    && reduced > own
                {
                    let out = self.engine.on_watermark(reduced, now);
                    self.publish(out);
                }
            }
            PartitionInput::Watermark { ts } => {
                let target = match &self.shared {
                    Some(shared) => shared.advance(ts),
                    None => ts,
                };
                let out = self.engine.on_watermark(target, now);
                self.publish(out);
            }
        }
    }

    /// Periodic tick. In global mode this also picks up watermark progress
    /// made by other partitions.
    pub(super) fn tick(&mut self) {
        let now = self.now();
        let reduced = self.shared.as_ref().map(SharedWatermark::current);
        let out = match reduced {
            Some(wm) if wm > self.engine.watermark() => self.engine.on_watermark(wm, now),
            _ => self.engine.on_tick(now),
        };
        self.publish(out);
    }

    // -- Output -------------------------------------------------------------

    fn publish(&mut self, out: EngineOutput<Payload>) {
        if out.is_empty() {
            return;
        }
        if out.dropped_late > 0 {
            self.metrics.add_late_dropped(out.dropped_late);
        }
        for failure in out.failures {
            self.metrics.inc_aggregation_failure();
            wr_warn!(
                pipe,
                partition = self.id,
                window = %failure.key,
                stage = %failure.stage,
                error = %failure.error,
                "window aggregation failed"
            );
        }
        for result in out.results {
            if result.is_early() {
                self.outbound.offer_early(result);
            } else {
                self.pending.offer(&self.outbound, result);
            }
        }
    }

    // -- Shutdown -----------------------------------------------------------

    /// Discard open windows. With `drain`, first wait until every pending
    /// final is in the outbound queue.
    pub(super) async fn shutdown(mut self, drain: bool) {
        let undelivered = if drain {
            self.pending.drain(&self.outbound).await
        } else {
            let n = self.pending.len();
            if n > 0 {
                wr_error!(pipe, partition = self.id, pending = n, "partition cancelled with pending final results");
            }
            n
        };
        let discarded = self.engine.teardown();
        wr_debug!(
            pipe,
            partition = self.id,
            discarded,
            undelivered,
            late_drops = self.engine.late_drops(),
            "partition shutdown complete"
        );
    }
}
