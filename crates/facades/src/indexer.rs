//! `IndexerClient`: ordered event and agreement queries against the indexer.

use async_trait::async_trait;
use providerd_types::address::Address;
use providerd_types::domain::{Agreement, AgreementStatus};
use providerd_types::error::TransportError;
use providerd_types::event::{ChainEvent, ChainEventKind};

/// Filters for `IndexerClient::get_agreements`.
#[derive(Debug, Clone, Default)]
pub struct AgreementQuery {
    /// Restrict to a single protocol.
    pub protocol_address: Option<Address>,
    /// Restrict to a single provider.
    pub provider_address: Option<Address>,
    /// Restrict to a single status.
    pub status: Option<AgreementStatus>,
    /// Restrict to a single agreement id.
    pub id: Option<u64>,
    /// Follow pagination until the indexer reports no more pages.
    pub auto_paginate: bool,
}

/// Filters for `IndexerClient::get_events`.
#[derive(Debug, Clone)]
pub struct EventQuery {
    /// Restrict to a single protocol's events.
    pub contract_address: Address,
    /// Which event kind to fetch.
    pub event_name: ChainEventKind,
    /// Inclusive lower block bound.
    pub from_block: u64,
    /// Inclusive upper block bound.
    pub to_block: u64,
    /// Only fetch events the indexer itself marks as fully processed.
    pub processed: bool,
    /// Maximum events per page.
    pub limit: u32,
    /// Follow pagination until the indexer reports no more pages.
    pub auto_paginate: bool,
}

/// Queries against the indexer: ordered events and agreement snapshots.
///
/// The indexer's page ordering is not assumed to be block-ascending;
/// `providerd_types::event::sort_events_for_application` is the only
/// sanctioned way callers re-order a page.
#[async_trait]
pub trait IndexerClient: Send + Sync {
    /// Lists agreements matching `query`.
    async fn get_agreements(
        &self,
        query: AgreementQuery,
    ) -> Result<Vec<Agreement>, TransportError>;

    /// Fetches events matching `query`. Order within the returned page is
    /// indexer-defined; callers must sort before applying.
    async fn get_events(&self, query: EventQuery) -> Result<Vec<ChainEvent>, TransportError>;

    /// `true` if the indexer currently considers itself caught up and
    /// reachable. Used to decide whether a transport failure is a blip or a
    /// sustained outage (§4.9: log "indexer not healthy" at most once per
    /// outage).
    async fn is_healthy(&self) -> bool;
}
