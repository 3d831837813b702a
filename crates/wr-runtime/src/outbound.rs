//! Bounded hand-off from partitions to the dispatcher.
//!
//! Early results are best effort: when the queue is full they are shed.
//! Final results are never shed; a partition parks them in its
//! [`PendingFinals`] and re-offers them until the queue takes them.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use wr_core::{Payload, WindowResult};

use crate::metrics::RuntimeMetrics;

pub type OutboundResult = WindowResult<Payload>;

#[derive(Clone)]
pub struct Outbound {
    tx: mpsc::Sender<OutboundResult>,
    metrics: Arc<RuntimeMetrics>,
}

impl Outbound {
    pub fn channel(
        capacity: usize,
        metrics: Arc<RuntimeMetrics>,
    ) -> (Self, mpsc::Receiver<OutboundResult>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, metrics }, rx)
    }

    /// Offer an early result. Returns false if it was shed.
    pub fn offer_early(&self, result: OutboundResult) -> bool {
        match self.tx.try_send(result) {
            Ok(()) => true,
            Err(TrySendError::Full(r)) => {
                self.metrics.inc_early_shed();
                wr_debug!(pipe, window = %r.key(), "outbound queue full, early result shed");
                false
            }
            Err(TrySendError::Closed(r)) => {
                self.metrics.inc_early_shed();
                wr_warn!(pipe, window = %r.key(), "outbound queue closed, early result shed");
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Final results a partition could not enqueue yet, in emission order.
#[derive(Debug, Default)]
pub struct PendingFinals {
    queue: VecDeque<OutboundResult>,
}

impl PendingFinals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Enqueue a final result behind anything already pending, then try to
    /// move as much as fits into the outbound queue.
    pub fn offer(&mut self, outbound: &Outbound, result: OutboundResult) {
        self.queue.push_back(result);
        self.flush(outbound);
    }

    /// Move pending finals into the outbound queue without waiting.
    /// Returns the number moved.
    pub fn flush(&mut self, outbound: &Outbound) -> usize {
        let mut moved = 0;
        while let Some(result) = self.queue.pop_front() {
            match outbound.tx.try_send(result) {
                Ok(()) => moved += 1,
                Err(TrySendError::Full(r)) | Err(TrySendError::Closed(r)) => {
                    self.queue.push_front(r);
                    break;
                }
            }
        }
        moved
    }

    /// Wait until every pending final is in the outbound queue. Returns the
    /// number left behind because the dispatcher is gone.
    pub async fn drain(&mut self, outbound: &Outbound) -> usize {
        while let Some(result) = self.queue.pop_front() {
            if let Err(mpsc::error::SendError(r)) = outbound.tx.send(result).await {
                self.queue.push_front(r);
                break;
            }
        }
        let left = self.queue.len();
        for r in self.queue.drain(..) {
            wr_error!(res, result = %r, "dispatcher gone, final result not delivered");
        }
        left
    }

    /// Wait for queue capacity and send the oldest pending final.
    pub(crate) async fn send_one(&mut self, outbound: &Outbound) -> bool {
        match outbound.tx.reserve().await {
            Ok(permit) => match self.queue.pop_front() {
                Some(r) => {
                    permit.send(r);
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }
}
