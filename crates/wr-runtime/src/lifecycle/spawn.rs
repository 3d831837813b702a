use std::net::SocketAddr;
use std::sync::Arc;

use orion_error::ErrorOweBase;
use orion_error::prelude::*;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use wr_config::PipelineConfig;
use wr_core::{Payload, ResultSink, SharedWatermark, WindowEngine};

use crate::dispatcher::{RetryPolicy, run_dispatcher};
use crate::error::{RuntimeReason, RuntimeResult};
use crate::metrics::{RuntimeMetrics, run_metrics_reporter};
use crate::outbound::{Outbound, OutboundResult};
use crate::partition::{PartitionRouter, PartitionTaskConfig, run_partition};
use crate::receiver::Receiver;

use super::types::TaskGroup;

/// Per-partition input queue depth.
const PARTITION_INPUT_CAPACITY: usize = 1024;

// ---------------------------------------------------------------------------
// Task spawn helpers -- each creates its channels and spawns its tasks
// ---------------------------------------------------------------------------

/// Spawn the periodic metrics reporter.
pub(super) fn spawn_metrics_task(
    config: &PipelineConfig,
    metrics: &Arc<RuntimeMetrics>,
    cancel: CancellationToken,
) -> TaskGroup {
    let mut group = TaskGroup::new("metrics");
    if config.metrics.enabled {
        group.push(tokio::spawn(run_metrics_reporter(
            Arc::clone(metrics),
            config.metrics.report_interval.as_duration(),
            cancel,
        )));
    }
    group
}

/// Spawn the dispatcher that feeds `sink`.
pub(super) fn spawn_dispatcher_task(
    config: &PipelineConfig,
    rx: mpsc::Receiver<OutboundResult>,
    sink: Arc<dyn ResultSink<Payload>>,
    metrics: &Arc<RuntimeMetrics>,
    abort: CancellationToken,
) -> TaskGroup {
    let retry = RetryPolicy::from_config(&config.sink);
    let mut group = TaskGroup::new("dispatcher");
    group.push(tokio::spawn(run_dispatcher(
        rx,
        sink,
        retry,
        Arc::clone(metrics),
        abort,
    )));
    group
}

/// Spawn one task per partition, each owning its own engine.
///
/// Consumes `outbound`: once every partition has exited, the outbound
/// queue closes and the dispatcher drains.
pub(super) fn spawn_partition_tasks(
    config: &PipelineConfig,
    outbound: Outbound,
    metrics: &Arc<RuntimeMetrics>,
    cancel: CancellationToken,
) -> RuntimeResult<(PartitionRouter, TaskGroup)> {
    let partitions = config.runtime.partitions;
    let shared = config.runtime.global_watermark.then(SharedWatermark::new);
    let tick_interval = config.runtime.tick_interval.as_duration();

    let mut senders = Vec::with_capacity(partitions);
    let mut group = TaskGroup::new("partitions");
    for id in 0..partitions {
        let engine = WindowEngine::from_config(&config.window, &config.early_results).err_conv()?;
        let (tx, rx) = mpsc::channel(PARTITION_INPUT_CAPACITY);
        senders.push(tx);
        let task_config = PartitionTaskConfig {
            id,
            engine,
            input: rx,
            outbound: outbound.clone(),
            shared_watermark: shared.clone(),
            tick_interval,
            cancel: cancel.child_token(),
            metrics: Arc::clone(metrics),
        };
        group.push(tokio::spawn(run_partition(task_config)));
    }
    drop(outbound);
    Ok((PartitionRouter::new(senders), group))
}

/// Bind the receiver and spawn its task.
/// Returns (listen_addr, task_group).
pub(super) async fn spawn_receiver_task(
    config: &PipelineConfig,
    router: PartitionRouter,
    metrics: &Arc<RuntimeMetrics>,
    cancel: CancellationToken,
) -> RuntimeResult<(SocketAddr, TaskGroup)> {
    let receiver = Receiver::bind(&config.server.listen, router, Arc::clone(metrics))
        .await
        .owe(RuntimeReason::Bootstrap)?;
    let listen_addr = receiver.local_addr().owe(RuntimeReason::Bootstrap)?;
    let receiver_cancel = receiver.cancel_token();
    tokio::spawn(async move {
        cancel.cancelled().await;
        receiver_cancel.cancel();
    });
    let mut group = TaskGroup::new("receiver");
    group.push(tokio::spawn(receiver.run()));
    Ok((listen_addr, group))
}
