//! The Balance Sweeper (C9): periodically force-closes agreements whose
//! balance has been drained to zero.
//!
//! Overlapping ticks are dropped (§4.8: "serialized") via an atomic guard
//! rather than a queue, since a dropped tick is made up by the next one.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use providerd_facades::chain::ChainClient;
use providerd_facades::indexer::{AgreementQuery, IndexerClient};
use providerd_runtime::ProviderRuntime;
use providerd_types::domain::AgreementStatus;
use tokio_util::sync::CancellationToken;

/// Every address a runtime answers agreements for: the physical provider
/// plus each validated virtual child.
fn served_addresses(runtime: &ProviderRuntime) -> Vec<providerd_types::Address> {
    std::iter::once(runtime.provider.owner_address.clone())
        .chain(runtime.virtual_children.iter().map(|c| c.owner_address.clone()))
        .collect()
}

/// Runs one sweep: lists every active agreement for every configured
/// provider (physical and virtual), and force-closes any with a zero
/// balance. An agreement surfaced under more than one provider's listing
/// (a known benign overlap, §9 of the design docs) is only closed once per
/// sweep thanks to the `seen` set.
pub async fn sweep_once(runtimes: &[Arc<ProviderRuntime>], indexer: &dyn IndexerClient, chain: &dyn ChainClient) {
    let mut seen = HashSet::new();
    let mut closed = 0usize;

    for runtime in runtimes {
        for address in served_addresses(runtime) {
            let query = AgreementQuery {
                protocol_address: Some(runtime.protocol_address.clone()),
                provider_address: Some(address),
                status: Some(AgreementStatus::Active),
                id: None,
                auto_paginate: true,
            };
            let agreements = match indexer.get_agreements(query).await {
                Ok(agreements) => agreements,
                Err(err) => {
                    tracing::warn!(
                        target: "reconciler",
                        event = "sweep_list_failed",
                        protocol = %runtime.protocol_address,
                        error = %err,
                        "balance sweep could not list agreements for provider",
                    );
                    continue;
                }
            };

            for agreement in agreements {
                if !seen.insert(agreement.id) {
                    continue;
                }
                if !agreement.balance_is_zero() {
                    continue;
                }
                match chain.close_agreement(agreement.id).await {
                    Ok(()) => closed += 1,
                    Err(err) => {
                        tracing::warn!(
                            target: "reconciler",
                            event = "sweep_close_failed",
                            agreement_id = agreement.id,
                            error = %err,
                            "balance sweep failed to close drained agreement",
                        );
                    }
                }
            }
        }
    }

    if closed > 0 {
        tracing::info!(
            target: "reconciler",
            event = "sweep_complete",
            closed,
        );
    }
}

/// Runs the balance sweeper forever: one sweep at startup, then one per
/// `interval`, until `cancellation` fires. A tick that is still running when
/// the next would start is simply skipped (§4.8).
pub async fn run_balance_sweeper(
    runtimes: Arc<Vec<Arc<ProviderRuntime>>>,
    indexer: Arc<dyn IndexerClient>,
    chain: Arc<dyn ChainClient>,
    interval: Duration,
    cancellation: CancellationToken,
) {
    let busy = Arc::new(AtomicBool::new(false));
    loop {
        if cancellation.is_cancelled() {
            return;
        }

        if !busy.swap(true, Ordering::SeqCst) {
            let runtimes = runtimes.clone();
            let indexer = indexer.clone();
            let chain = chain.clone();
            let busy = busy.clone();
            tokio::spawn(async move {
                sweep_once(&runtimes, indexer.as_ref(), chain.as_ref()).await;
                busy.store(false, Ordering::SeqCst);
            });
        } else {
            tracing::debug!(
                target: "reconciler",
                event = "sweep_tick_skipped",
                "previous balance-sweep tick still running; skipping",
            );
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancellation.cancelled() => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use providerd_testkit::fixtures::{addr, zero_balance_agreement, ProviderBuilder};
    use providerd_testkit::{FakeChainClient, FakeIndexerClient};

    fn runtime(provider_id: u64, owner: providerd_types::Address) -> Arc<ProviderRuntime> {
        Arc::new(ProviderRuntime {
            provider: ProviderBuilder::new(provider_id, owner).build(),
            protocol_address: addr(9),
            virtual_children: vec![],
            backend: Arc::new(providerd_testkit::EchoBackend::new()),
        })
    }

    #[tokio::test]
    async fn closes_zero_balance_agreement_once() {
        let indexer = FakeIndexerClient::new();
        indexer.push_agreement(zero_balance_agreement(1, addr(1), addr(2), 1));
        let chain = FakeChainClient::new();

        let runtimes = vec![runtime(1, addr(2))];
        sweep_once(&runtimes, &indexer, &chain).await;

        assert_eq!(chain.closed_agreements(), vec![1]);
    }

    #[tokio::test]
    async fn does_not_close_funded_agreement() {
        let indexer = FakeIndexerClient::new();
        indexer.push_agreement(providerd_testkit::fixtures::agreement(1, addr(1), addr(2), 1));
        let chain = FakeChainClient::new();

        let runtimes = vec![runtime(1, addr(2))];
        sweep_once(&runtimes, &indexer, &chain).await;

        assert!(chain.closed_agreements().is_empty());
    }

    #[tokio::test]
    async fn dedupes_agreement_surfaced_under_two_listings() {
        // Two runtime entries that both resolve to the same served address
        // (e.g. a misconfigured second tag pointing at the same provider):
        // the agreement is listed twice but closed only once.
        let indexer = FakeIndexerClient::new();
        indexer.push_agreement(zero_balance_agreement(1, addr(1), addr(2), 1));
        let chain = FakeChainClient::new();

        let runtimes = vec![runtime(1, addr(2)), runtime(1, addr(2))];
        sweep_once(&runtimes, &indexer, &chain).await;
        assert_eq!(chain.closed_agreements(), vec![1]);
    }
}
