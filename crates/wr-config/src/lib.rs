pub mod early;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod runtime;
pub mod server;
pub mod sink;
pub mod types;
pub mod validate;
pub mod window;

pub use early::EarlyResultsConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use metrics::MetricsConfig;
pub use pipeline::PipelineConfig;
pub use runtime::RuntimeConfig;
pub use server::ServerConfig;
pub use sink::{SinkConfig, SinkKind};
pub use types::{AggregateKind, EarlyResultKind, HumanDuration, WindowKind};
pub use window::{MAX_WINDOWS_PER_EVENT, WindowConfig};
