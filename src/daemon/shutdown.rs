use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Cancels `shutdown` when the process receives an interrupt, which lets the
/// tracker flush its open session before exiting.
///
/// Detached windows processes never see console signals; `worklens stop`
/// terminates the daemon there instead.
pub async fn detect_shutdown(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Interrupt handler unavailable: {e}");
        return;
    }
    shutdown.cancel();
}
