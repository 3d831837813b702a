use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Result;
use clap::{Parser, Subcommand};

use wr_config::{HumanDuration, PipelineConfig};
use wr_runtime::lifecycle::{Reactor, wait_for_signal};
use wr_runtime::tracing_init::init_tracing;

#[derive(Parser)]
#[command(name = "wrpipe", about = "Windowed aggregation pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the pipeline
    Run {
        /// Path to pipeline.toml config file
        #[arg(short, long)]
        config: PathBuf,
        /// Override the number of partitions
        #[arg(long)]
        partitions: Option<usize>,
        /// Enable periodic metrics snapshots in the log
        #[arg(long)]
        metrics: bool,
        /// Override metrics report interval (e.g. "2s", "30s", "1m")
        #[arg(long)]
        metrics_interval: Option<String>,
    },
    /// Parse and validate a config file, then print the effective settings
    Check {
        /// Path to pipeline.toml config file
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn load(config: &Path) -> Result<(PipelineConfig, PathBuf)> {
    let config_path = config
        .canonicalize()
        .map_err(|e| anyhow::anyhow!("config path '{}': {e}", config.display()))?;
    let pipeline = PipelineConfig::load(&config_path)?;
    let base_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow::anyhow!("config path '{}' has no parent", config_path.display()))?;
    Ok((pipeline, base_dir))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            partitions,
            metrics,
            metrics_interval,
        } => {
            let (mut pipeline, base_dir) = load(&config)?;
            if let Some(n) = partitions {
                anyhow::ensure!(n > 0, "--partitions must be > 0");
                pipeline.runtime.partitions = n;
            }
            if metrics || metrics_interval.is_some() {
                pipeline.metrics.enabled = true;
            }
            if let Some(interval) = metrics_interval {
                pipeline.metrics.report_interval = HumanDuration::from_str(&interval)
                    .map_err(|e| anyhow::anyhow!("invalid --metrics-interval '{interval}': {e}"))?;
            }

            let _guard = init_tracing(&pipeline.logging, &base_dir)?;

            let reactor = Reactor::start(pipeline, &base_dir)
                .await
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            tracing::info!(domain = "sys", listen = %reactor.listen_addr(), "wrpipe started");

            wait_for_signal(reactor.cancel_token()).await;
            reactor.shutdown();
            // A second signal stops without draining.
            tokio::spawn(wait_for_signal(reactor.abort_token()));
            reactor.wait().await.map_err(|e| anyhow::anyhow!("{e}"))?;
        }
        Commands::Check { config } => {
            let (pipeline, base_dir) = load(&config)?;
            println!("listen      {}", pipeline.server.listen);
            println!(
                "runtime     partitions={} queue={} tick={} global_watermark={}",
                pipeline.runtime.partitions,
                pipeline.runtime.queue_capacity,
                pipeline.runtime.tick_interval,
                pipeline.runtime.global_watermark,
            );
            println!(
                "window      {:?} size={} aggregate={:?} delay={} lateness={}",
                pipeline.window.kind,
                pipeline.window.size,
                pipeline.window.aggregate,
                pipeline.window.watermark_delay,
                pipeline.window.allowed_lateness,
            );
            println!("early       {:?}", pipeline.early_results.kind);
            println!(
                "sink        {:?} {}",
                pipeline.sink.kind,
                base_dir.join(&pipeline.sink.path).display()
            );
        }
    }

    Ok(())
}
