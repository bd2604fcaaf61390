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

//! Agreement reconciliation, resource watching, and balance enforcement.
//!
//! This crate is the daemon's core control loop (C7-C9 of the design docs):
//! the event-driven reconciler that replays on-chain agreement events into
//! local [`Resource`](providerd_types::domain::Resource) rows, the
//! per-resource watcher that polls a deploying backend until it reports
//! `Running`, and the balance sweeper that force-closes drained agreements.
//! None of the three loops ever panics or exits the process on a background
//! failure; each logs and continues, per §7 of the design docs.

/// Human-facing resource name generation, used when a backend's `create`
/// does not return one.
pub mod names;
/// The event-driven agreement reconciler (C7).
pub mod reconciler;
/// The periodic balance-enforcement sweep (C9).
pub mod sweeper;
/// The per-resource deploy-poll watcher (C8).
pub mod watcher;

pub use reconciler::{Reconciler, ReconcilerConfig};
pub use sweeper::run_balance_sweeper;
pub use watcher::{WatcherRegistry, WatcherSupervisor};
