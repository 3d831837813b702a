use crate::pipeline::PipelineConfig;
use crate::types::{EarlyResultKind, WindowKind};
use crate::window::MAX_WINDOWS_PER_EVENT;

/// Internal validation, called automatically during `PipelineConfig::from_str` / `load`.
pub(crate) fn validate(config: &PipelineConfig) -> anyhow::Result<()> {
    // server.listen must start with tcp://
    if !config.server.listen.starts_with("tcp://") {
        anyhow::bail!(
            "server.listen must start with \"tcp://\", got {:?}",
            config.server.listen,
        );
    }

    if config.runtime.partitions == 0 {
        anyhow::bail!("runtime.partitions must be > 0");
    }
    if config.runtime.queue_capacity == 0 {
        anyhow::bail!("runtime.queue_capacity must be > 0");
    }
    if config.runtime.tick_interval.as_duration().is_zero() {
        anyhow::bail!("runtime.tick_interval must be > 0");
    }

    let window = &config.window;
    let size = window.size.as_millis_i64();
    if size <= 0 {
        anyhow::bail!("window.size must be at least 1ms");
    }
    if window.kind == WindowKind::Sliding {
        let slide = window
            .slide
            .ok_or_else(|| anyhow::anyhow!("window.kind \"sliding\" requires window.slide"))?
            .as_millis_i64();
        if slide <= 0 || slide > size {
            anyhow::bail!(
                "window.slide ({}) must be in (0, window.size ({})]",
                window.slide.map(|s| s.to_string()).unwrap_or_default(),
                window.size,
            );
        }
        if size / slide > MAX_WINDOWS_PER_EVENT {
            anyhow::bail!(
                "window.size / window.slide must be <= {MAX_WINDOWS_PER_EVENT} (windows per event), got {}",
                size / slide,
            );
        }
    }

    let early = &config.early_results;
    match early.kind {
        EarlyResultKind::None => {}
        EarlyResultKind::Periodic => match early.interval {
            Some(i) if !i.as_duration().is_zero() => {}
            _ => anyhow::bail!("early_results.kind \"periodic\" requires interval > 0"),
        },
        EarlyResultKind::Count => match early.every {
            Some(n) if n > 0 => {}
            _ => anyhow::bail!("early_results.kind \"count\" requires every > 0"),
        },
    }

    if config.sink.retry_initial.as_duration().is_zero() {
        anyhow::bail!("sink.retry_initial must be > 0");
    }
    if config.sink.retry_initial.as_duration() > config.sink.retry_max.as_duration() {
        anyhow::bail!(
            "sink.retry_initial ({}) exceeds sink.retry_max ({})",
            config.sink.retry_initial,
            config.sink.retry_max,
        );
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
