//! Process-level stop requests for long-running commands.

use tracing::debug;

/// Resolve once the process is asked to stop: `Ctrl+C` anywhere, or
/// `SIGTERM` on Unix.
///
/// ```no_run
/// # async fn example() -> std::io::Result<()> {
/// leadflow::shutdown_requested().await?;
/// # Ok(())
/// # }
/// ```
pub async fn shutdown_requested() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut term = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res?,
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    debug!("shutdown requested");
    Ok(())
}
