#[macro_use]
mod log_macros;

pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod outbound;
pub mod partition;
pub mod receiver;
pub mod tracing_init;

pub use error::{RuntimeError, RuntimeReason, RuntimeResult};
pub use lifecycle::{Reactor, wait_for_signal};
pub use metrics::{MetricsSnapshot, RuntimeMetrics};
