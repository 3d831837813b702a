use tokio_util::sync::CancellationToken;

/// Wait for Ctrl-C (SIGINT) or SIGTERM, then cancel `cancel`.
pub async fn wait_for_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        wr_info!(sys, signal = "SIGINT", "received signal, initiating graceful shutdown");
                    }
                    _ = sigterm.recv() => {
                        wr_info!(sys, signal = "SIGTERM", "received signal, initiating graceful shutdown");
                    }
                }
            }
            Err(e) => {
                wr_warn!(sys, error = %e, "SIGTERM handler unavailable, listening for Ctrl-C only");
                wait_for_ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    wait_for_ctrl_c().await;
    cancel.cancel();
}

async fn wait_for_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => wr_info!(sys, signal = "SIGINT", "received signal, initiating graceful shutdown"),
        Err(e) => {
            wr_error!(sys, error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}
