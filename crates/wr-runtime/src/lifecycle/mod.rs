mod signal;
mod spawn;
mod types;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use orion_error::op_context;
use orion_error::prelude::*;
use tokio_util::sync::CancellationToken;

use wr_config::PipelineConfig;
use wr_core::sink::open_sink;
use wr_core::{Payload, ResultSink};

use crate::error::RuntimeResult;
use crate::metrics::{MetricsSnapshot, RuntimeMetrics};
use crate::outbound::Outbound;

pub use signal::wait_for_signal;

use spawn::{spawn_dispatcher_task, spawn_metrics_task, spawn_partition_tasks, spawn_receiver_task};
use types::TaskGroup;

// ---------------------------------------------------------------------------
// Reactor -- the top-level lifecycle handle
// ---------------------------------------------------------------------------

/// Manages the full lifecycle of the pipeline: start, run, and graceful
/// shutdown.
///
/// Task groups are stored in start order and joined in reverse (LIFO)
/// during [`wait`](Self::wait): the receiver stops first, partitions see
/// their inputs close and hand their pending final results over, then the
/// dispatcher drains the outbound queue into the sink.
pub struct Reactor {
    cancel: CancellationToken,
    /// Hard stop: cancels partitions without draining and makes the
    /// dispatcher give up on rejected final results.
    abort: CancellationToken,
    /// Stops the metrics reporter once the dispatcher has drained.
    metrics_cancel: CancellationToken,
    groups: Vec<TaskGroup>,
    listen_addr: SocketAddr,
    metrics: Arc<RuntimeMetrics>,
}

impl Reactor {
    /// Start the pipeline from a [`PipelineConfig`], opening the configured
    /// file sink relative to `base_dir`.
    #[tracing::instrument(name = "pipeline.start", skip_all, fields(listen = %config.server.listen))]
    pub async fn start(config: PipelineConfig, base_dir: &Path) -> RuntimeResult<Self> {
        let sink = open_sink(&config.sink, base_dir).err_conv()?;
        Self::start_with_sink(config, sink).await
    }

    /// Start the pipeline with an explicit result sink.
    pub async fn start_with_sink(
        config: PipelineConfig,
        sink: Arc<dyn ResultSink<Payload>>,
    ) -> RuntimeResult<Self> {
        let mut op = op_context!("pipeline-bootstrap").with_auto_log();
        op.record("listen", config.server.listen.as_str());
        op.record("partitions", config.runtime.partitions.to_string().as_str());

        let cancel = CancellationToken::new();
        let abort = CancellationToken::new();
        let metrics_cancel = CancellationToken::new();
        let metrics = Arc::new(RuntimeMetrics::new());

        // Start order: metrics → dispatcher → partitions → receiver
        let mut groups: Vec<TaskGroup> = Vec::with_capacity(4);
        groups.push(spawn_metrics_task(&config, &metrics, metrics_cancel.clone()));

        let (outbound, outbound_rx) = Outbound::channel(config.runtime.queue_capacity, Arc::clone(&metrics));
        groups.push(spawn_dispatcher_task(
            &config,
            outbound_rx,
            sink,
            &metrics,
            abort.clone(),
        ));

        let (router, partition_group) =
            spawn_partition_tasks(&config, outbound, &metrics, abort.clone())?;
        groups.push(partition_group);

        let (listen_addr, receiver_group) =
            spawn_receiver_task(&config, router, &metrics, cancel.clone()).await?;
        groups.push(receiver_group);

        wr_info!(
            sys,
            listen = %listen_addr,
            partitions = config.runtime.partitions,
            window = ?config.window.kind,
            aggregate = ?config.window.aggregate,
            early = ?config.early_results.kind,
            global_watermark = config.runtime.global_watermark,
            "pipeline started"
        );
        op.mark_suc();
        Ok(Self {
            cancel,
            abort,
            metrics_cancel,
            groups,
            listen_addr,
            metrics,
        })
    }

    /// Returns the local address the receiver is listening on.
    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    /// Current counter values.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Request graceful shutdown of all tasks.
    pub fn shutdown(&self) {
        wr_info!(sys, "initiating graceful shutdown");
        self.cancel.cancel();
    }

    /// Stop without draining: open windows and pending final results are
    /// discarded (and logged).
    pub fn abort(&self) {
        wr_warn!(sys, "aborting pipeline");
        self.cancel.cancel();
        self.abort.cancel();
    }

    /// Wait for all task groups to complete after shutdown.
    ///
    /// Groups are joined in LIFO order (reverse of start order):
    /// receiver → partitions → dispatcher → metrics.
    pub async fn wait(mut self) -> RuntimeResult<()> {
        while let Some(group) = self.groups.pop() {
            let name = group.name;
            wr_debug!(sys, task_group = name, "waiting for task group to finish");
            let outcome = group.wait().await;
            wr_debug!(sys, task_group = name, "task group finished");
            if name == "dispatcher" {
                self.metrics_cancel.cancel();
            }
            if let Err(e) = outcome {
                // Unblock the remaining groups before bailing out.
                self.abort.cancel();
                self.metrics_cancel.cancel();
                return Err(e);
            }
        }
        wr_info!(sys, "pipeline stopped");
        Ok(())
    }

    /// Returns a clone of the root cancellation token (for signal integration).
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Returns a clone of the abort token.
    pub fn abort_token(&self) -> CancellationToken {
        self.abort.clone()
    }
}
