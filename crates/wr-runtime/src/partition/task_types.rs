use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wr_core::{NumericAggregate, SharedWatermark, WindowEngine};

use crate::metrics::RuntimeMetrics;
use crate::outbound::Outbound;

/// One unit of work for a partition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PartitionInput {
    Event { ts: i64, value: f64 },
    Watermark { ts: i64 },
}

/// Everything needed to construct a partition task.
pub(crate) struct PartitionTaskConfig {
    pub id: usize,
    pub engine: WindowEngine<NumericAggregate>,
    pub input: mpsc::Receiver<PartitionInput>,
    pub outbound: Outbound,
    /// Set in global watermark mode.
    pub shared_watermark: Option<SharedWatermark>,
    pub tick_interval: Duration,
    pub cancel: CancellationToken,
    pub metrics: Arc<RuntimeMetrics>,
}
