//! A lightweight HTTP server exposing `/health` and `/metrics`.

use std::net::SocketAddr;

use axum::routing::get;
use axum::Router;
use tokio::sync::watch;

use crate::metrics::render;

async fn health_handler() -> &'static str {
    "Running"
}

async fn metrics_handler() -> String {
    render()
}

/// Serves `/health` and `/metrics` on `addr` until `shutdown` is signalled.
pub async fn serve(addr: SocketAddr, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(target: "telemetry", event = "http_listen", %addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await?;
    Ok(())
}
