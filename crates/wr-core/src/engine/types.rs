use std::fmt;

use orion_error::StructError;
use wr_config::{EarlyResultKind, EarlyResultsConfig, WindowConfig};

use crate::error::{CoreError, CoreReason};
use crate::result::WindowResult;
use crate::window::WindowKey;

// ---------------------------------------------------------------------------
// EarlyPolicy
// ---------------------------------------------------------------------------

/// When an open window emits a provisional result.
///
/// Either trigger fires only for a window that has folded in at least one
/// event since its previous early result, and only while the watermark is
/// below the window end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EarlyPolicy {
    None,
    /// At most once per `interval_ms` of wall-clock time per window,
    /// evaluated on watermark advances and ticks.
    Periodic { interval_ms: i64 },
    /// After every `every` new events, evaluated as events arrive.
    Count { every: u64 },
}

impl EarlyPolicy {
    pub fn from_config(config: &EarlyResultsConfig) -> Self {
        match config.kind {
            EarlyResultKind::None => Self::None,
            EarlyResultKind::Periodic => match config.interval {
                Some(i) if i.as_millis_i64() > 0 => Self::Periodic {
                    interval_ms: i.as_millis_i64(),
                },
                _ => Self::None,
            },
            EarlyResultKind::Count => match config.every {
                Some(n) if n > 0 => Self::Count { every: n },
                _ => Self::None,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// EngineSettings
// ---------------------------------------------------------------------------

/// Event-time knobs of a [`WindowEngine`](super::WindowEngine), in millis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Watermark candidate of an event is `ts - watermark_delay`.
    pub watermark_delay: i64,
    /// Events with `ts < watermark - allowed_lateness` are dropped.
    pub allowed_lateness: i64,
    pub early: EarlyPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            watermark_delay: 0,
            allowed_lateness: 0,
            early: EarlyPolicy::None,
        }
    }
}

impl EngineSettings {
    pub fn from_config(window: &WindowConfig, early: &EarlyResultsConfig) -> Self {
        Self {
            watermark_delay: window.watermark_delay.as_millis_i64(),
            allowed_lateness: window.allowed_lateness.as_millis_i64(),
            early: EarlyPolicy::from_config(early),
        }
    }
}

// ---------------------------------------------------------------------------
// WindowFailure
// ---------------------------------------------------------------------------

/// Where in the window lifecycle the aggregate failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Accumulate,
    EarlyFinish,
    FinalFinish,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Accumulate => "accumulate",
            Self::EarlyFinish => "early finish",
            Self::FinalFinish => "final finish",
        })
    }
}

/// An aggregation failure isolated to one window. The window is marked
/// errored and emits nothing further.
#[derive(Debug)]
pub struct WindowFailure {
    pub key: WindowKey,
    pub stage: FailureStage,
    pub error: anyhow::Error,
}

impl WindowFailure {
    pub fn into_core(self) -> CoreError {
        StructError::from(CoreReason::Aggregation).with_detail(self.to_string())
    }
}

impl fmt::Display for WindowFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window {} failed in {}: {:#}", self.key, self.stage, self.error)
    }
}

// ---------------------------------------------------------------------------
// EngineOutput
// ---------------------------------------------------------------------------

/// Everything one engine call produced, in emission order.
#[derive(Debug)]
pub struct EngineOutput<R> {
    pub results: Vec<WindowResult<R>>,
    pub failures: Vec<WindowFailure>,
    /// Late events dropped by this call.
    pub dropped_late: u64,
}

impl<R> Default for EngineOutput<R> {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            failures: Vec::new(),
            dropped_late: 0,
        }
    }
}

impl<R> EngineOutput<R> {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty() && self.failures.is_empty() && self.dropped_late == 0
    }

    pub fn early_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_early()).count()
    }

    pub fn final_count(&self) -> usize {
        self.results.len() - self.early_count()
    }
}

/// Outcome of [`merge_accumulator`](super::WindowEngine::merge_accumulator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged,
    /// The window is already closed.
    DroppedLate,
    /// The window is errored and takes no further input.
    SkippedErrored,
}
