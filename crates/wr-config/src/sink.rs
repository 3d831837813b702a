use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::HumanDuration;

/// Output encoding of the result sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// One JSON object per line.
    Jsonl,
    /// Length-prefixed binary `WindowResult` frames.
    Binary,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SinkConfig {
    pub kind: SinkKind,
    /// Output file. Relative paths are resolved against the config file's
    /// parent directory.
    pub path: PathBuf,
    /// First back-off delay when a final result is rejected.
    #[serde(default = "default_retry_initial")]
    pub retry_initial: HumanDuration,
    /// Upper bound for the doubling back-off delay.
    #[serde(default = "default_retry_max")]
    pub retry_max: HumanDuration,
}

fn default_retry_initial() -> HumanDuration {
    "10ms".parse().expect("hardcoded duration must parse")
}

fn default_retry_max() -> HumanDuration {
    "1s".parse().expect("hardcoded duration must parse")
}
