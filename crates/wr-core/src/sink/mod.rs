mod file;
mod memory;

pub use file::{BinarySink, JsonLinesSink};
pub use memory::MemorySink;

use std::path::Path;
use std::sync::Arc;

use wr_config::{SinkConfig, SinkKind};

use crate::error::CoreResult;
use crate::result::{Payload, WindowResult};

/// Answer of a sink to one offered result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkAck {
    Ack,
    /// Not taken. The caller decides whether to drop or retry.
    Reject,
}

/// Destination for window results.
///
/// `accept` must not block for long; a sink that cannot take a result right
/// now rejects it instead.
pub trait ResultSink<R>: Send + Sync {
    fn accept(&self, result: &WindowResult<R>) -> SinkAck;
}

impl<R, T: ResultSink<R> + ?Sized> ResultSink<R> for Arc<T> {
    fn accept(&self, result: &WindowResult<R>) -> SinkAck {
        (**self).accept(result)
    }
}

impl<R, T: ResultSink<R> + ?Sized> ResultSink<R> for Box<T> {
    fn accept(&self, result: &WindowResult<R>) -> SinkAck {
        (**self).accept(result)
    }
}

/// Open the file sink described by `config`. Relative paths resolve
/// against `base_dir`; missing parent directories are created.
pub fn open_sink(config: &SinkConfig, base_dir: &Path) -> CoreResult<Arc<dyn ResultSink<Payload>>> {
    let path = base_dir.join(&config.path);
    let sink: Arc<dyn ResultSink<Payload>> = match config.kind {
        SinkKind::Jsonl => Arc::new(JsonLinesSink::open(&path)?),
        SinkKind::Binary => Arc::new(BinarySink::open(&path)?),
    };
    log::info!("result sink {:?} writing to {}", config.kind, path.display());
    Ok(sink)
}
