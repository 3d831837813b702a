pub mod aggregate;
pub mod engine;
pub mod error;
pub mod inbound;
pub mod result;
pub mod sink;
pub mod watermark;
pub mod window;

pub use aggregate::{AggregateOp, NumericAggregate};
pub use engine::{EarlyPolicy, EngineOutput, EngineSettings, WindowEngine};
pub use error::{CoreError, CoreReason, CoreResult};
pub use inbound::InboundFrame;
pub use result::{Payload, WindowResult};
pub use sink::{ResultSink, SinkAck};
pub use watermark::{SharedWatermark, WatermarkTracker};
pub use window::{WindowAssigner, WindowKey};
