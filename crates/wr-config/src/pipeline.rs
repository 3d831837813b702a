use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::early::EarlyResultsConfig;
use crate::logging::LoggingConfig;
use crate::metrics::MetricsConfig;
use crate::runtime::RuntimeConfig;
use crate::server::ServerConfig;
use crate::sink::SinkConfig;
use crate::validate;
use crate::window::WindowConfig;

// ---------------------------------------------------------------------------
// PipelineConfig -- `pipeline.toml`, validated on parse
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PipelineConfig {
    pub server: ServerConfig,
    pub runtime: RuntimeConfig,
    pub window: WindowConfig,
    #[serde(default)]
    pub early_results: EarlyResultsConfig,
    pub sink: SinkConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PipelineConfig {
    /// Read and parse a `pipeline.toml` file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.as_ref().display()))?;
        content.parse()
    }
}

impl FromStr for PipelineConfig {
    type Err = anyhow::Error;

    /// Parse a TOML string into a validated [`PipelineConfig`].
    fn from_str(toml_str: &str) -> anyhow::Result<Self> {
        let config: PipelineConfig = toml::from_str(toml_str)?;
        validate::validate(&config)?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
