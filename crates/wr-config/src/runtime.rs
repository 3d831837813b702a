use serde::{Deserialize, Serialize};

use crate::types::HumanDuration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Number of independent window partitions (one engine task each).
    pub partitions: usize,
    /// Capacity of the bounded outbound result queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Period of the wall-clock tick that drives periodic early results.
    #[serde(default = "default_tick_interval")]
    pub tick_interval: HumanDuration,
    /// When set, all partitions share one monotonic watermark.
    #[serde(default)]
    pub global_watermark: bool,
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_tick_interval() -> HumanDuration {
    "100ms".parse().expect("hardcoded duration must parse")
}
