use serde::{Deserialize, Serialize};

use crate::types::{AggregateKind, HumanDuration, WindowKind};

/// Upper bound on `size / slide`, the number of sliding windows a single
/// event is assigned to.
pub const MAX_WINDOWS_PER_EVENT: i64 = 10_000;

// ---------------------------------------------------------------------------
// WindowConfig -- deserialized from [window]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowConfig {
    pub kind: WindowKind,
    /// Window length.
    pub size: HumanDuration,
    /// Distance between consecutive window starts. Required for sliding
    /// windows, ignored for tumbling ones.
    #[serde(default)]
    pub slide: Option<HumanDuration>,
    pub aggregate: AggregateKind,
    /// Watermark candidate is `event_time - watermark_delay`.
    #[serde(default = "zero_duration")]
    pub watermark_delay: HumanDuration,
    /// Events older than `watermark - allowed_lateness` are dropped as late.
    #[serde(default = "zero_duration")]
    pub allowed_lateness: HumanDuration,
}

impl WindowConfig {
    /// Effective slide in milliseconds: the configured slide for sliding
    /// windows, the window size for tumbling ones.
    pub fn slide_millis(&self) -> i64 {
        match (self.kind, self.slide) {
            (WindowKind::Sliding, Some(slide)) => slide.as_millis_i64(),
            _ => self.size.as_millis_i64(),
        }
    }
}

fn zero_duration() -> HumanDuration {
    std::time::Duration::ZERO.into()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
