mod task;
mod task_types;

#[cfg(test)]
mod tests;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use wr_core::InboundFrame;

pub use task_types::PartitionInput;
pub(crate) use task_types::PartitionTaskConfig;

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Run one partition until its input closes or it is cancelled.
///
/// Input close is the graceful path: pending final results are handed to
/// the dispatcher before the engine is torn down. Cancellation tears down
/// immediately.
#[tracing::instrument(name = "partition", skip_all, fields(id = config.id))]
pub(crate) async fn run_partition(config: PartitionTaskConfig) -> anyhow::Result<()> {
    let PartitionTaskConfig {
        id,
        engine,
        mut input,
        outbound,
        shared_watermark,
        tick_interval,
        cancel,
        metrics,
    } = config;
    let mut task = task::PartitionTask::new(id, engine, outbound, shared_watermark, metrics);
    let mut ticker = tokio::time::interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let drain = loop {
        task.pending.flush(&task.outbound);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break false,
            sent = task.pending.send_one(&task.outbound), if !task.pending.is_empty() => {
                if !sent {
                    wr_error!(pipe, partition = task.id, "outbound queue closed");
                    break false;
                }
            }
            msg = input.recv() => match msg {
                Some(msg) => task.handle(msg),
                None => break true,
            },
            _ = ticker.tick() => task.tick(),
        }
    };
    task.shutdown(drain).await;
    Ok(())
}

// ---------------------------------------------------------------------------
// PartitionRouter -- receiver side of the partition inputs
// ---------------------------------------------------------------------------

/// Routes decoded frames onto partitions: events by key hash, watermark
/// signals to every partition.
#[derive(Clone)]
pub struct PartitionRouter {
    senders: Vec<mpsc::Sender<PartitionInput>>,
}

impl PartitionRouter {
    pub fn new(senders: Vec<mpsc::Sender<PartitionInput>>) -> Self {
        Self { senders }
    }

    pub fn partitions(&self) -> usize {
        self.senders.len()
    }

    /// Stable partition index for `key`.
    pub fn partition_for(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.senders.len().max(1) as u64) as usize
    }

    /// Deliver `frame`, waiting for queue capacity. Returns false once the
    /// partitions have stopped.
    pub async fn route(&self, frame: InboundFrame) -> bool {
        match frame {
            InboundFrame::Event { ts, key, value } => {
                let Some(tx) = self.senders.get(self.partition_for(&key)) else {
                    return false;
                };
                tx.send(PartitionInput::Event { ts, value }).await.is_ok()
            }
            InboundFrame::Watermark { ts } => {
                let mut delivered = false;
                for tx in &self.senders {
                    delivered |= tx.send(PartitionInput::Watermark { ts }).await.is_ok();
                }
                delivered
            }
        }
    }
}
