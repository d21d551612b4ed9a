use tokio::select;
use tokio_util::sync::CancellationToken;

/// Detects signals sent to the process. This works with limited success.
///
/// On Windows detached processes can't detect signals sent to them, so this should be enhanced in
/// the future to support another way of sending signals.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        select! {
            _ = tokio::signal::ctrl_c() => {
                cancelation.cancel();
            },
            _ = terminate.recv() => {
                cancelation.cancel();
            },
        };
    }
    #[cfg(not(unix))]
    {
        select! {
            _ = tokio::signal::ctrl_c() => {
                cancelation.cancel();
            },
        };
    }
}

/// Toggles pause on SIGUSR1 until shutdown, so tracking can be frozen without
/// stopping the daemon.
#[cfg(unix)]
pub async fn watch_pause_toggle(
    tracker: std::sync::Arc<super::tracker::SessionTracker>,
    cancelation: CancellationToken,
) {
    use tracing::{error, info};

    let mut usr1 = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::user_defined1())
    {
        Ok(v) => v,
        Err(e) => {
            error!("Failed to install SIGUSR1 handler, pause toggle disabled {e:?}");
            return;
        }
    };

    loop {
        select! {
            _ = cancelation.cancelled() => return,
            signal = usr1.recv() => {
                if signal.is_none() {
                    return;
                }
                let paused = tracker.toggle_pause(chrono::Utc::now());
                info!("Pause toggled, paused = {paused}");
            }
        }
    }
}
