//! Indexer-health log suppression (§4.9 of the design docs).
//!
//! When the indexer becomes unreachable, the supervisor must log "indexer
//! not healthy" exactly once per outage rather than once per failed call —
//! loops that poll every few seconds would otherwise flood the log. A
//! subsequent successful call logs "indexer healthy" exactly once.

use std::sync::atomic::{AtomicBool, Ordering};

/// Tracks whether the last-known indexer health state has already been
/// logged, so transitions are reported exactly once.
#[derive(Default)]
pub struct IndexerHealthTracker {
    unhealthy: AtomicBool,
}

impl IndexerHealthTracker {
    /// Creates a tracker assuming the indexer starts out healthy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an observed health state, logging a transition at most once.
    pub fn observe(&self, healthy: bool) {
        let was_unhealthy = self.unhealthy.swap(!healthy, Ordering::SeqCst);
        if healthy && was_unhealthy {
            tracing::info!(target: "reconciler", event = "indexer_healthy", "indexer healthy");
        } else if !healthy && !was_unhealthy {
            tracing::warn!(target: "reconciler", event = "indexer_unhealthy", "indexer not healthy");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logs_transition_once_per_state_change() {
        let tracker = IndexerHealthTracker::new();
        // Repeated unhealthy observations: state already unhealthy after the
        // first swap, so no way to assert on log output here, but the
        // internal flag should settle and not flip-flop.
        tracker.observe(false);
        tracker.observe(false);
        tracker.observe(true);
        tracker.observe(true);
        assert!(!tracker.unhealthy.load(Ordering::SeqCst));
    }
}
