#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! Observability infrastructure for the provider daemon: structured logging
//! initialization, a Prometheus `/metrics` + `/health` server, and the
//! indexer-health log-suppression helper used by the reconciler.

/// Health/metrics HTTP server (`/health`, `/metrics`).
pub mod http;
/// Indexer-health log suppression: log a transition at most once.
pub mod indexer_health;
/// The initialization routine for global structured logging.
pub mod init;
/// Prometheus metric registrations used across the daemon.
pub mod metrics;

pub use indexer_health::IndexerHealthTracker;
pub use init::init_tracing;
