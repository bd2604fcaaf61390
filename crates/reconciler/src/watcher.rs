//! The Resource Watcher (C8): a cooperative per-resource task that polls a
//! not-yet-`Running` backend until it reports `Running`, or until the
//! resource disappears/closes out from under it.

use std::sync::Arc;
use std::time::Duration;

use providerd_facades::ChainClient;
use providerd_runtime::ProviderRuntime;
use providerd_store::Store;
use providerd_types::domain::DeploymentStatus;
use providerd_types::Address;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Poll interval between `get_details` calls for a deploying resource (§4.7).
/// A fixed cadence; the design docs note jitter/back-off as a production
/// follow-up, not required here.
pub const WATCH_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Runs the watch loop for one resource until it is `Running`, disappears,
/// is closed, or `cancellation` fires.
///
/// Each iteration reloads the resource from the store rather than trusting
/// stale state, since the reconciler may close the agreement out from under
/// a running watcher.
pub async fn watch_resource(
    agreement_id: u64,
    protocol_address: Address,
    runtime: Arc<ProviderRuntime>,
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn Store>,
    cancellation: CancellationToken,
) {
    loop {
        if cancellation.is_cancelled() {
            return;
        }

        let resource = match store
            .get_resource_unchecked(agreement_id, &protocol_address)
            .await
        {
            Ok(Some(resource)) if resource.is_active => resource,
            Ok(_) => return,
            Err(err) => {
                tracing::warn!(
                    target: "reconciler",
                    event = "watcher_store_error",
                    agreement_id,
                    error = %err,
                    "watcher failed to reload resource; retrying after store error",
                );
                sleep_cancellable(cancellation.clone()).await;
                continue;
            }
        };

        if resource.deployment_status == DeploymentStatus::Running {
            return;
        }

        let agreement = chain.get_agreement(agreement_id).await;
        let offer = chain.get_offer(resource.offer_id).await;

        match (agreement, offer) {
            (Ok(Some(agreement)), Ok(Some(offer))) => {
                match runtime.backend.get_details(&agreement, &offer, &resource).await {
                    Ok(details) if details.status == DeploymentStatus::Running => {
                        let mut updated = resource;
                        updated.deployment_status = DeploymentStatus::Running;
                        updated.details = details.details;
                        if let Err(err) = store.update_resource(updated).await {
                            tracing::warn!(
                                target: "reconciler",
                                event = "watcher_update_failed",
                                agreement_id,
                                error = %err,
                            );
                        }
                        providerd_telemetry::metrics::install_metrics();
                        providerd_telemetry::metrics::record_event_applied("WatcherRunning");
                        return;
                    }
                    Ok(_) => {
                        // still deploying; poll again after the interval.
                    }
                    Err(err) => {
                        tracing::warn!(
                            target: "reconciler",
                            event = "watcher_get_details_failed",
                            agreement_id,
                            error = %err,
                            "backend get_details failed; retrying",
                        );
                    }
                }
            }
            _ => {
                tracing::warn!(
                    target: "reconciler",
                    event = "watcher_chain_lookup_failed",
                    agreement_id,
                    "could not reload agreement/offer from chain; retrying",
                );
            }
        }

        sleep_cancellable(cancellation.clone()).await;
    }
}

async fn sleep_cancellable(cancellation: CancellationToken) {
    tokio::select! {
        _ = tokio::time::sleep(WATCH_POLL_INTERVAL) => {}
        _ = cancellation.cancelled() => {}
    }
}

/// Tracks every in-flight resource watcher task so the supervisor can await
/// them all at shutdown (§4.7's "cleanup barrier").
#[derive(Default)]
pub struct WatcherRegistry {
    handles: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl WatcherRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a spawned watcher's handle.
    pub async fn track(&self, handle: JoinHandle<()>) {
        self.handles.lock().await.push(handle);
    }

    /// Awaits every tracked handle, dropping ones that already finished.
    /// Called once, at shutdown.
    pub async fn join_all(&self) {
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock().await);
        for handle in handles {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    tracing::warn!(
                        target: "reconciler",
                        event = "watcher_join_error",
                        error = %err,
                    );
                }
            }
        }
    }
}

/// Spawns a resource watcher and registers its handle for the shutdown
/// cleanup barrier.
pub struct WatcherSupervisor {
    registry: Arc<WatcherRegistry>,
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn Store>,
    cancellation: CancellationToken,
}

impl WatcherSupervisor {
    /// Builds a supervisor sharing `cancellation` with the rest of the
    /// daemon, so watchers stop as part of the same shutdown signal.
    pub fn new(
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn Store>,
        cancellation: CancellationToken,
    ) -> Self {
        WatcherSupervisor {
            registry: Arc::new(WatcherRegistry::new()),
            chain,
            store,
            cancellation,
        }
    }

    /// Shared registry, for the supervisor to await at shutdown.
    pub fn registry(&self) -> Arc<WatcherRegistry> {
        self.registry.clone()
    }

    /// Spawns a watcher for `agreement_id` under `protocol_address`, served
    /// by `runtime`'s backend.
    pub async fn spawn(
        &self,
        agreement_id: u64,
        protocol_address: Address,
        runtime: Arc<ProviderRuntime>,
    ) {
        let chain = self.chain.clone();
        let store = self.store.clone();
        let cancellation = self.cancellation.clone();
        let handle = tokio::spawn(async move {
            watch_resource(agreement_id, protocol_address, runtime, chain, store, cancellation).await;
        });
        self.registry.track(handle).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use providerd_store::memory::MemoryStore;
    use providerd_testkit::fixtures::{addr, agreement, offer, protocol, resource, ProviderBuilder};
    use providerd_testkit::{EchoBackend, FakeChainClient};

    fn test_runtime(backend: Arc<dyn providerd_runtime::ServiceBackend>) -> Arc<ProviderRuntime> {
        Arc::new(ProviderRuntime {
            provider: ProviderBuilder::new(1, addr(2)).build(),
            protocol_address: addr(9),
            virtual_children: vec![],
            backend,
        })
    }

    #[tokio::test]
    async fn watcher_exits_once_resource_is_running() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let chain: Arc<dyn ChainClient> = Arc::new(
            FakeChainClient::new()
                .with_agreement(agreement(1, addr(1), addr(2), 1))
                .with_offer(1, offer(1, addr(2))),
        );
        store.upsert_protocol(protocol(addr(9))).await.unwrap();
        let mut r = resource(1, addr(9), addr(1), 1, 1);
        r.deployment_status = DeploymentStatus::Deploying;
        store.insert_resource(r).await.unwrap();

        let backend: Arc<dyn providerd_runtime::ServiceBackend> = Arc::new(EchoBackend::deploying_for(1));
        let runtime = test_runtime(backend);
        let cancellation = CancellationToken::new();

        watch_resource(1, addr(9), runtime, chain, store.clone(), cancellation).await;

        let updated = store.get_resource_unchecked(1, &addr(9)).await.unwrap().unwrap();
        assert_eq!(updated.deployment_status, DeploymentStatus::Running);
    }

    #[tokio::test]
    async fn watcher_exits_immediately_if_resource_already_closed() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let chain: Arc<dyn ChainClient> = Arc::new(FakeChainClient::new());
        let mut r = resource(1, addr(9), addr(1), 1, 1);
        r.is_active = false;
        store.insert_resource(r).await.unwrap();

        let backend: Arc<dyn providerd_runtime::ServiceBackend> = Arc::new(EchoBackend::new());
        let runtime = test_runtime(backend.clone());
        let cancellation = CancellationToken::new();

        watch_resource(1, addr(9), runtime, chain, store, cancellation).await;
        let echo = backend.as_any().downcast_ref::<EchoBackend>().unwrap();
        assert_eq!(echo.get_details_calls(), 0);
    }

    #[tokio::test]
    async fn registry_joins_completed_handles() {
        let registry = WatcherRegistry::new();
        let handle = tokio::spawn(async {});
        registry.track(handle).await;
        registry.join_all().await;
    }
}
