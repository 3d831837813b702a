use serde::{Deserialize, Serialize};

use crate::types::{EarlyResultKind, HumanDuration};

/// Early-result policy, deserialized from `[early_results]`.
///
/// The whole section may be omitted, which disables early results.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EarlyResultsConfig {
    pub kind: EarlyResultKind,
    /// Wall-clock period between early results of one window (`periodic`).
    #[serde(default)]
    pub interval: Option<HumanDuration>,
    /// Number of new events that triggers an early result (`count`).
    #[serde(default)]
    pub every: Option<u64>,
}

impl Default for EarlyResultsConfig {
    fn default() -> Self {
        Self {
            kind: EarlyResultKind::None,
            interval: None,
            every: None,
        }
    }
}
