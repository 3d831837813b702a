use orion_error::StructError;
use wr_config::{MAX_WINDOWS_PER_EVENT, WindowConfig, WindowKind};

use super::WindowKey;
use crate::error::{CoreReason, CoreResult};

/// Maps an event timestamp to the windows it belongs to.
///
/// Windows are aligned to epoch 0. Negative timestamps use floor division,
/// so `-1` falls in `[-size, 0)` rather than `[0, size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowAssigner {
    Tumbling { size: i64 },
    Sliding { size: i64, slide: i64 },
}

impl WindowAssigner {
    pub fn tumbling(size: i64) -> CoreResult<Self> {
        if size <= 0 {
            return Err(assign_error(format!("window size must be > 0, got {size}")));
        }
        Ok(Self::Tumbling { size })
    }

    pub fn sliding(size: i64, slide: i64) -> CoreResult<Self> {
        if size <= 0 || slide <= 0 || slide > size {
            return Err(assign_error(format!(
                "sliding window needs 0 < slide <= size, got size {size} slide {slide}"
            )));
        }
        if size / slide > MAX_WINDOWS_PER_EVENT {
            return Err(assign_error(format!(
                "sliding window assigns {} windows per event, limit is {MAX_WINDOWS_PER_EVENT}",
                size / slide
            )));
        }
        Ok(Self::Sliding { size, slide })
    }

    pub fn from_config(config: &WindowConfig) -> CoreResult<Self> {
        let size = config.size.as_millis_i64();
        match config.kind {
            WindowKind::Tumbling => Self::tumbling(size),
            WindowKind::Sliding => Self::sliding(size, config.slide_millis()),
        }
    }

    pub fn size(&self) -> i64 {
        match *self {
            Self::Tumbling { size } | Self::Sliding { size, .. } => size,
        }
    }

    fn slide(&self) -> i64 {
        match *self {
            Self::Tumbling { size } => size,
            Self::Sliding { slide, .. } => slide,
        }
    }

    /// All windows containing `ts`, in ascending key order.
    ///
    /// Fails when a window bound is not representable as `i64`.
    pub fn assign_windows(&self, ts: i64) -> CoreResult<Vec<WindowKey>> {
        let size = self.size();
        let slide = self.slide();
        let overflow = || assign_error(format!("window bounds for timestamp {ts} overflow"));

        // Latest window start at or before ts.
        let last_start = ts.div_euclid(slide).checked_mul(slide).ok_or_else(overflow)?;

        let mut keys = Vec::with_capacity((size / slide) as usize + 1);
        let mut start = last_start;
        loop {
            let end = start.checked_add(size).ok_or_else(overflow)?;
            if end <= ts {
                break;
            }
            keys.push(WindowKey::from_ordered(start, end));
            match start.checked_sub(slide) {
                Some(prev) => start = prev,
                None => break,
            }
        }
        keys.reverse();
        Ok(keys)
    }
}

fn assign_error(detail: String) -> crate::error::CoreError {
    StructError::from(CoreReason::WindowAssign).with_detail(detail)
}
