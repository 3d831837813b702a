use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wr_config::SinkConfig;
use wr_core::{Payload, ResultSink, SinkAck};

use crate::metrics::RuntimeMetrics;
use crate::outbound::OutboundResult;

/// Exponential backoff for rejected final results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &SinkConfig) -> Self {
        Self {
            initial: config.retry_initial.as_duration(),
            max: config.retry_max.as_duration(),
        }
    }

    fn next(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max)
    }
}

/// Consume results from the outbound queue and hand them to `sink`.
///
/// A rejected early result is dropped. A rejected final result is retried
/// with backoff until the sink takes it or `abort` fires; an abandoned final
/// is logged at error level.
///
/// Shutdown is driven by channel close: once every partition has dropped
/// its [`Outbound`](crate::outbound::Outbound), `rx.recv()` returns `None`
/// and the task exits after the queue is empty.
#[tracing::instrument(name = "dispatcher", skip_all)]
pub async fn run_dispatcher(
    mut rx: mpsc::Receiver<OutboundResult>,
    sink: Arc<dyn ResultSink<Payload>>,
    retry: RetryPolicy,
    metrics: Arc<RuntimeMetrics>,
    abort: CancellationToken,
) -> anyhow::Result<()> {
    let mut delivered = 0u64;
    while let Some(result) = rx.recv().await {
        if result.is_early() {
            match sink.accept(&result) {
                SinkAck::Ack => metrics.inc_early_emitted(),
                SinkAck::Reject => {
                    metrics.inc_early_rejected();
                    wr_debug!(res, window = %result.key(), "early result rejected by sink");
                }
            }
            continue;
        }
        if deliver_final(&*sink, &result, retry, &metrics, &abort).await {
            delivered += 1;
        }
    }
    wr_info!(res, finals = delivered, "dispatcher drained");
    Ok(())
}

async fn deliver_final(
    sink: &dyn ResultSink<Payload>,
    result: &OutboundResult,
    retry: RetryPolicy,
    metrics: &RuntimeMetrics,
    abort: &CancellationToken,
) -> bool {
    let mut delay = retry.initial;
    loop {
        if sink.accept(result) == SinkAck::Ack {
            metrics.inc_final_emitted();
            return true;
        }
        metrics.inc_final_retry();
        wr_warn!(
            res,
            window = %result.key(),
            retry_in_ms = delay.as_millis() as u64,
            "final result rejected by sink"
        );
        tokio::select! {
            _ = abort.cancelled() => {
                metrics.inc_final_abandoned();
                wr_error!(res, result = %result, "dispatcher aborted, final result not delivered");
                return false;
            }
            _ = tokio::time::sleep(delay) => {}
        }
        delay = retry.next(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbound::Outbound;
    use wr_core::sink::MemorySink;
    use wr_core::{WindowKey, WindowResult};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            initial: Duration::from_millis(10),
            max: Duration::from_millis(40),
        }
    }

    fn result(start: i64, is_early: bool) -> OutboundResult {
        WindowResult::new(
            WindowKey::new(start, start + 10).unwrap(),
            Payload::Double(start as f64),
            is_early,
        )
    }

    // -- 1. backoff ---------------------------------------------------------

    #[test]
    fn backoff_doubles_up_to_max() {
        let p = policy();
        let mut d = p.initial;
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(d.as_millis());
            d = p.next(d);
        }
        assert_eq!(seen, vec![10, 20, 40, 40]);
    }

    // -- 2. delivery --------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn rejected_final_is_retried_until_accepted() {
        let metrics = Arc::new(RuntimeMetrics::new());
        let sink = Arc::new(MemorySink::<Payload>::new());
        sink.reject_next(3);
        let (out, rx) = Outbound::channel(8, metrics.clone());
        let task = tokio::spawn(run_dispatcher(
            rx,
            sink.clone(),
            policy(),
            metrics.clone(),
            CancellationToken::new(),
        ));

        out.offer_early(result(0, true));
        let mut pending = crate::outbound::PendingFinals::new();
        pending.offer(&out, result(0, false));
        drop(out);
        task.await.unwrap().unwrap();

        // The early result absorbed one rejection, the final two.
        let s = metrics.snapshot();
        assert_eq!(s.early_rejected, 1);
        assert_eq!(s.final_retries, 2);
        assert_eq!(s.finals_emitted, 1);
        assert_eq!(sink.snapshot(), vec![result(0, false)]);
    }

    #[tokio::test(start_paused = true)]
    async fn abort_abandons_rejected_final() {
        let metrics = Arc::new(RuntimeMetrics::new());
        let sink = Arc::new(MemorySink::<Payload>::new());
        sink.reject_next(usize::MAX);
        let (out, rx) = Outbound::channel(8, metrics.clone());
        let abort = CancellationToken::new();
        let task = tokio::spawn(run_dispatcher(
            rx,
            sink.clone(),
            policy(),
            metrics.clone(),
            abort.clone(),
        ));

        let mut pending = crate::outbound::PendingFinals::new();
        pending.offer(&out, result(0, false));
        drop(out);
        tokio::time::sleep(Duration::from_millis(200)).await;
        abort.cancel();
        task.await.unwrap().unwrap();

        let s = metrics.snapshot();
        assert_eq!(s.finals_abandoned, 1);
        assert_eq!(s.finals_emitted, 0);
        assert!(s.final_retries >= 3);
        assert!(sink.is_empty());
    }
}
