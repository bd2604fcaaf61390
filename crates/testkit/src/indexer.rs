//! A scripted [`IndexerClient`] fake: a fixed event log and agreement
//! snapshot list, with a toggleable health flag for degradation tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use providerd_facades::indexer::{AgreementQuery, EventQuery, IndexerClient};
use providerd_types::domain::Agreement;
use providerd_types::error::TransportError;
use providerd_types::event::ChainEvent;

#[derive(Default)]
struct State {
    events: Vec<ChainEvent>,
    agreements: Vec<Agreement>,
    fail_next_events: bool,
}

/// A scripted indexer: seed it with [`FakeIndexerClient::push_event`] /
/// [`FakeIndexerClient::push_agreement`], then drive it like the real thing.
/// `set_healthy(false)` simulates an outage for degradation-discipline tests.
#[derive(Default)]
pub struct FakeIndexerClient {
    state: Mutex<State>,
    healthy: AtomicBool,
}

impl FakeIndexerClient {
    /// Creates an empty, healthy fake.
    pub fn new() -> Self {
        FakeIndexerClient {
            state: Mutex::new(State::default()),
            healthy: AtomicBool::new(true),
        }
    }

    #[allow(clippy::unwrap_used)]
    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Appends an event to the log (order of insertion need not be
    /// block-ascending — tests exercise the reconciler's own sort).
    pub fn push_event(&self, event: ChainEvent) {
        self.lock().events.push(event);
    }

    /// Appends an agreement snapshot.
    pub fn push_agreement(&self, agreement: Agreement) {
        self.lock().agreements.push(agreement);
    }

    /// Sets the health flag `is_healthy` reports.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Makes the next `get_events` call fail with a transport error.
    pub fn fail_next_events(&self) {
        self.lock().fail_next_events = true;
    }

    /// The highest block number among pushed events, or 0 if none.
    pub fn latest_block(&self) -> u64 {
        self.lock().events.iter().map(|e| e.block_number).max().unwrap_or(0)
    }
}

#[async_trait]
impl IndexerClient for FakeIndexerClient {
    async fn get_agreements(
        &self,
        query: AgreementQuery,
    ) -> Result<Vec<Agreement>, TransportError> {
        let state = self.lock();
        Ok(state
            .agreements
            .iter()
            .filter(|a| {
                query
                    .provider_address
                    .as_ref()
                    .map(|p| p == &a.provider_address)
                    .unwrap_or(true)
            })
            .filter(|a| query.status.map(|s| s == a.status).unwrap_or(true))
            .filter(|a| query.id.map(|id| id == a.id).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn get_events(&self, query: EventQuery) -> Result<Vec<ChainEvent>, TransportError> {
        {
            let mut state = self.lock();
            if state.fail_next_events {
                state.fail_next_events = false;
                return Err(TransportError::Http {
                    endpoint: "indexer/events".to_string(),
                    message: "scripted failure".to_string(),
                });
            }
        }
        let state = self.lock();
        let mut matched: Vec<ChainEvent> = state
            .events
            .iter()
            .filter(|e| e.contract_address == query.contract_address)
            .filter(|e| e.kind == query.event_name)
            .filter(|e| e.block_number >= query.from_block && e.block_number <= query.to_block)
            .cloned()
            .collect();
        // Descending so a `limit: 1` query (used to discover the indexer's
        // current head) returns the highest-numbered match; callers that want
        // application order re-sort ascending themselves (see
        // `providerd_types::event::sort_events_for_application`).
        matched.sort_by_key(|e| std::cmp::Reverse(e.sort_key()));
        matched.truncate(query.limit.max(1) as usize);
        Ok(matched)
    }

    async fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}
