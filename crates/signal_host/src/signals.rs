//! OS signal handling for stopping the frame loop.
//!
//! Not to be confused with engine signals: this waits for SIGINT/SIGTERM
//! (Ctrl+C on Windows) so the host can release its proxies before exiting.

use tokio::signal;
use tracing::info;

/// Waits for a termination signal.
///
/// Used by `Application::run` as the shutdown future racing the frame loop.
///
/// # Platform Support
///
/// * **Unix platforms**: Handles SIGINT and SIGTERM signals
/// * **Windows**: Handles Ctrl+C signal
///
/// # Returns
///
/// `Ok(())` once a signal is received, or an error if the signal handlers
/// could not be installed.
pub async fn wait_for_shutdown() -> Result<(), std::io::Error> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => (),
            _ = sigterm.recv() => ()
        }
    }

    #[cfg(windows)]
    signal::ctrl_c().await?;

    info!("📡 Received shutdown signal - stopping frame loop");
    Ok(())
}
