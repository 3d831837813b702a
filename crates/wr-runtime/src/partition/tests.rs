use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use wr_config::AggregateKind;
use wr_core::{
    EarlyPolicy, EngineSettings, InboundFrame, NumericAggregate, Payload, SharedWatermark,
    WindowAssigner, WindowEngine, WindowKey, WindowResult,
};

use super::*;
use crate::metrics::RuntimeMetrics;
use crate::outbound::{Outbound, OutboundResult};

struct Harness {
    input: mpsc::Sender<PartitionInput>,
    results: mpsc::Receiver<OutboundResult>,
    cancel: CancellationToken,
    handle: JoinHandle<anyhow::Result<()>>,
    metrics: Arc<RuntimeMetrics>,
}

fn engine(early: EarlyPolicy, allowed_lateness: i64) -> WindowEngine<NumericAggregate> {
    WindowEngine::new(
        NumericAggregate::new(AggregateKind::Sum),
        WindowAssigner::tumbling(10).unwrap(),
        EngineSettings {
            watermark_delay: 0,
            allowed_lateness,
            early,
        },
    )
}

fn spawn_partition(
    early: EarlyPolicy,
    queue_capacity: usize,
    shared: Option<SharedWatermark>,
) -> Harness {
    spawn_with_engine(engine(early, 0), queue_capacity, shared)
}

fn spawn_with_engine(
    engine: WindowEngine<NumericAggregate>,
    queue_capacity: usize,
    shared: Option<SharedWatermark>,
) -> Harness {
    let metrics = Arc::new(RuntimeMetrics::new());
    let (outbound, results) = Outbound::channel(queue_capacity, metrics.clone());
    let (input, rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(run_partition(PartitionTaskConfig {
        id: 0,
        engine,
        input: rx,
        outbound,
        shared_watermark: shared,
        tick_interval: Duration::from_millis(10),
        cancel: cancel.clone(),
        metrics: metrics.clone(),
    }));
    Harness {
        input,
        results,
        cancel,
        handle,
        metrics,
    }
}

fn event(ts: i64, value: f64) -> PartitionInput {
    PartitionInput::Event { ts, value }
}

fn window(start: i64) -> WindowKey {
    WindowKey::new(start, start + 10).unwrap()
}

async fn collect(h: Harness) -> (Vec<OutboundResult>, Arc<RuntimeMetrics>) {
    let Harness {
        input,
        mut results,
        handle,
        metrics,
        ..
    } = h;
    drop(input);
    let mut out = Vec::new();
    while let Some(r) = results.recv().await {
        out.push(r);
    }
    handle.await.unwrap().unwrap();
    (out, metrics)
}

// -- 1. final results ---------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn watermark_signal_emits_final() {
    let h = spawn_partition(EarlyPolicy::None, 8, None);
    for (ts, v) in [(1, 1.0), (2, 2.0), (3, 3.0)] {
        h.input.send(event(ts, v)).await.unwrap();
    }
    h.input
        .send(PartitionInput::Watermark { ts: 10 })
        .await
        .unwrap();
    let (out, metrics) = collect(h).await;
    assert_eq!(out, vec![WindowResult::new_final(window(0), Payload::Double(6.0))]);
    assert_eq!(metrics.snapshot().events, 3);
}

#[tokio::test(start_paused = true)]
async fn late_events_are_counted() {
    let h = spawn_partition(EarlyPolicy::None, 8, None);
    h.input.send(event(25, 1.0)).await.unwrap();
    h.input.send(event(3, 1.0)).await.unwrap();
    let (out, metrics) = collect(h).await;
    // [20, 30) is still open at shutdown and is discarded.
    assert!(out.is_empty());
    assert_eq!(metrics.snapshot().late_dropped, 1);
}

#[tokio::test(start_paused = true)]
async fn unassignable_event_is_not_an_aggregation_failure() {
    let h = spawn_partition(EarlyPolicy::None, 8, None);
    h.input.send(event(i64::MAX, 1.0)).await.unwrap();
    h.input.send(event(1, 1.0)).await.unwrap();
    h.input
        .send(PartitionInput::Watermark { ts: 10 })
        .await
        .unwrap();
    let (out, metrics) = collect(h).await;
    assert_eq!(out, vec![WindowResult::new_final(window(0), Payload::Double(1.0))]);
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.unassignable, 1);
    assert_eq!(snapshot.aggregation_failures, 0);
    assert_eq!(snapshot.late_dropped, 0);
}

// -- 2. early results ---------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn tick_drives_periodic_early_result() {
    let h = spawn_partition(EarlyPolicy::Periodic { interval_ms: 50 }, 8, None);
    h.input.send(event(1, 2.0)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.input
        .send(PartitionInput::Watermark { ts: 10 })
        .await
        .unwrap();
    let (out, _) = collect(h).await;
    assert_eq!(
        out,
        vec![
            WindowResult::new(window(0), Payload::Double(2.0), true),
            WindowResult::new_final(window(0), Payload::Double(2.0)),
        ]
    );
}

// -- 3. backpressure ----------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn full_queue_parks_finals_in_order() {
    let mut h = spawn_partition(EarlyPolicy::None, 1, None);
    for ts in [1, 11, 21, 31] {
        h.input.send(event(ts, ts as f64)).await.unwrap();
    }
    // Let the partition process everything while nobody reads.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.results.recv().await.unwrap().start(), 0);

    let (rest, metrics) = collect(h).await;
    let starts: Vec<i64> = rest.iter().map(|r| r.start()).collect();
    assert_eq!(starts, vec![10, 20]);
    assert_eq!(metrics.snapshot().early_shed, 0);
}

#[tokio::test(start_paused = true)]
async fn early_results_shed_when_queue_full() {
    let mut h = spawn_partition(EarlyPolicy::Count { every: 1 }, 1, None);
    h.input.send(event(1, 1.0)).await.unwrap();
    h.input.send(event(2, 1.0)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        h.results.recv().await.unwrap(),
        WindowResult::new(window(0), Payload::Double(1.0), true)
    );
    let (rest, metrics) = collect(h).await;
    assert!(rest.is_empty());
    assert_eq!(metrics.snapshot().early_shed, 1);
}

// -- 4. cancellation ----------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn cancel_discards_open_windows() {
    let h = spawn_partition(EarlyPolicy::None, 8, None);
    h.input.send(event(1, 1.0)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    h.cancel.cancel();
    let Harness {
        input,
        mut results,
        handle,
        ..
    } = h;
    handle.await.unwrap().unwrap();
    assert!(results.recv().await.is_none());
    drop(input);
}

// -- 5. global watermark ------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn shared_watermark_closes_lagging_partition() {
    let shared = SharedWatermark::new();
    let a = spawn_partition(EarlyPolicy::None, 8, Some(shared.clone()));
    let b = spawn_partition(EarlyPolicy::None, 8, Some(shared.clone()));
    a.input.send(event(5, 1.0)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    b.input.send(event(25, 2.0)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(shared.current(), 25);

    let (out_a, _) = collect(a).await;
    let (out_b, _) = collect(b).await;
    assert_eq!(out_a, vec![WindowResult::new_final(window(0), Payload::Double(1.0))]);
    assert!(out_b.is_empty());
}

#[tokio::test(start_paused = true)]
async fn skew_within_lateness_is_admitted_under_shared_watermark() {
    let shared = SharedWatermark::new();
    let a = spawn_with_engine(engine(EarlyPolicy::None, 5), 8, Some(shared.clone()));
    let b = spawn_with_engine(engine(EarlyPolicy::None, 5), 8, Some(shared.clone()));
    a.input.send(event(6, 1.0)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    // b has picked up watermark 6 on its tick; 5 is within the lateness bound.
    b.input.send(event(5, 2.0)).await.unwrap();
    b.input.send(event(0, 4.0)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    a.input.send(event(30, 1.0)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (out_a, _) = collect(a).await;
    let (out_b, metrics_b) = collect(b).await;
    assert_eq!(out_a, vec![WindowResult::new_final(window(0), Payload::Double(1.0))]);
    assert_eq!(out_b, vec![WindowResult::new_final(window(0), Payload::Double(2.0))]);
    // 0 is behind 6 - 5 and is dropped.
    assert_eq!(metrics_b.snapshot().late_dropped, 1);
}

// -- 6. routing ---------------------------------------------------------------

#[tokio::test]
async fn router_hashes_events_and_broadcasts_watermarks() {
    let (tx0, mut rx0) = mpsc::channel(8);
    let (tx1, mut rx1) = mpsc::channel(8);
    let router = PartitionRouter::new(vec![tx0, tx1]);
    assert_eq!(router.partitions(), 2);
    assert_eq!(router.partition_for("sensor-a"), router.partition_for("sensor-a"));

    assert!(router.route(InboundFrame::event(1, "sensor-a", 1.0)).await);
    assert!(router.route(InboundFrame::Watermark { ts: 9 }).await);

    let target = router.partition_for("sensor-a");
    let (hit, miss) = if target == 0 {
        (&mut rx0, &mut rx1)
    } else {
        (&mut rx1, &mut rx0)
    };
    assert_eq!(hit.try_recv().unwrap(), event(1, 1.0));
    assert_eq!(hit.try_recv().unwrap(), PartitionInput::Watermark { ts: 9 });
    assert_eq!(miss.try_recv().unwrap(), PartitionInput::Watermark { ts: 9 });
    assert!(miss.try_recv().is_err());
}

#[tokio::test]
async fn router_reports_stopped_partitions() {
    let (tx, rx) = mpsc::channel(1);
    drop(rx);
    let router = PartitionRouter::new(vec![tx]);
    assert!(!router.route(InboundFrame::event(1, "k", 1.0)).await);
}
