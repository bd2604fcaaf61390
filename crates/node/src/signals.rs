//! SIGINT/SIGTERM handling: the first signal cancels the shared token so the
//! supervisor begins an orderly shutdown; a second signal before that
//! finishes forces an immediate exit (§5/§6 of the design docs).

use tokio_util::sync::CancellationToken;

/// Process exit code used both for an orderly termination-signal shutdown
/// and for a fatal startup error — the design docs assign both the same
/// code.
pub const EXIT_TERMINATED: i32 = 1;
/// Process exit code used when a second termination signal arrives before
/// cleanup has finished.
pub const EXIT_FORCED: i32 = 255;

/// Spawns a background task that cancels `token` on the first SIGINT/SIGTERM
/// and calls `std::process::exit(EXIT_FORCED)` on a second one. Runs for the
/// lifetime of the process; the handle is not meant to be awaited.
pub fn spawn_signal_watcher(token: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::warn!(
            target: "node",
            event = "shutdown_signal",
            "termination signal received; shutting down",
        );
        token.cancel();

        wait_for_signal().await;
        tracing::error!(
            target: "node",
            event = "forced_shutdown",
            "second termination signal received; forcing exit",
        );
        std::process::exit(EXIT_FORCED);
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    #[allow(clippy::expect_used)]
    let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
