use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Shared runtime counters.
///
/// Every counter is a lock-free atomic so partitions, the receiver and the
/// dispatcher update them without coordination.
#[derive(Debug, Default)]
pub struct RuntimeMetrics {
    connections_total: AtomicU64,
    decode_errors_total: AtomicU64,
    events_total: AtomicU64,
    watermark_signals_total: AtomicU64,
    late_dropped_total: AtomicU64,
    unassignable_total: AtomicU64,
    aggregation_failures_total: AtomicU64,
    early_emitted_total: AtomicU64,
    early_shed_total: AtomicU64,
    early_rejected_total: AtomicU64,
    finals_emitted_total: AtomicU64,
    final_retries_total: AtomicU64,
    finals_abandoned_total: AtomicU64,
}

/// Point-in-time copy of [`RuntimeMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections: u64,
    pub decode_errors: u64,
    pub events: u64,
    pub watermark_signals: u64,
    pub late_dropped: u64,
    /// Events whose window bounds are not representable.
    pub unassignable: u64,
    pub aggregation_failures: u64,
    pub early_emitted: u64,
    pub early_shed: u64,
    pub early_rejected: u64,
    pub finals_emitted: u64,
    pub final_retries: u64,
    pub finals_abandoned: u64,
}

fn bump(counter: &AtomicU64, n: u64) {
    counter.fetch_add(n, Ordering::Relaxed);
}

impl RuntimeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_connection(&self) {
        bump(&self.connections_total, 1);
    }

    pub fn inc_decode_error(&self) {
        bump(&self.decode_errors_total, 1);
    }

    pub fn inc_event(&self) {
        bump(&self.events_total, 1);
    }

    pub fn inc_watermark_signal(&self) {
        bump(&self.watermark_signals_total, 1);
    }

    pub fn add_late_dropped(&self, n: u64) {
        bump(&self.late_dropped_total, n);
    }

    pub fn inc_unassignable(&self) {
        bump(&self.unassignable_total, 1);
    }

    pub fn inc_aggregation_failure(&self) {
        bump(&self.aggregation_failures_total, 1);
    }

    pub fn inc_early_emitted(&self) {
        bump(&self.early_emitted_total, 1);
    }

    pub fn inc_early_shed(&self) {
        bump(&self.early_shed_total, 1);
    }

    pub fn inc_early_rejected(&self) {
        bump(&self.early_rejected_total, 1);
    }

    pub fn inc_final_emitted(&self) {
        bump(&self.finals_emitted_total, 1);
    }

    pub fn inc_final_retry(&self) {
        bump(&self.final_retries_total, 1);
    }

    pub fn inc_final_abandoned(&self) {
        bump(&self.finals_abandoned_total, 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            connections: load(&self.connections_total),
            decode_errors: load(&self.decode_errors_total),
            events: load(&self.events_total),
            watermark_signals: load(&self.watermark_signals_total),
            late_dropped: load(&self.late_dropped_total),
            unassignable: load(&self.unassignable_total),
            aggregation_failures: load(&self.aggregation_failures_total),
            early_emitted: load(&self.early_emitted_total),
            early_shed: load(&self.early_shed_total),
            early_rejected: load(&self.early_rejected_total),
            finals_emitted: load(&self.finals_emitted_total),
            final_retries: load(&self.final_retries_total),
            finals_abandoned: load(&self.finals_abandoned_total),
        }
    }
}

/// Log a metrics snapshot every `interval` until `cancel` fires, then log
/// one last snapshot.
#[tracing::instrument(name = "metrics", skip_all)]
pub async fn run_metrics_reporter(
    metrics: Arc<RuntimeMetrics>,
    interval: Duration,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => log_snapshot(&metrics.snapshot()),
        }
    }
    log_snapshot(&metrics.snapshot());
    Ok(())
}

fn log_snapshot(s: &MetricsSnapshot) {
    wr_info!(
        sys,
        connections = s.connections,
        decode_errors = s.decode_errors,
        events = s.events,
        watermarks = s.watermark_signals,
        late_dropped = s.late_dropped,
        unassignable = s.unassignable,
        agg_failures = s.aggregation_failures,
        early_emitted = s.early_emitted,
        early_shed = s.early_shed,
        early_rejected = s.early_rejected,
        finals = s.finals_emitted,
        final_retries = s.final_retries,
        finals_abandoned = s.finals_abandoned,
        "metrics"
    );
}
