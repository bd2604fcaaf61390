//! Chain events observed through the indexer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::address::Address;

/// The well-known event names the reconciler dispatches on.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ChainEventKind {
    /// A new agreement was created.
    AgreementCreated,
    /// An agreement was closed.
    AgreementClosed,
}

/// One event returned by the indexer's events endpoint.
///
/// `log_index` is an optional secondary ordering key: the indexer's page
/// ordering is not guaranteed to be stable within a single block, so the
/// reconciler sorts by `(block_number, log_index)` when `log_index` is
/// present, falling back to indexer return order otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainEvent {
    /// Which kind of event this is.
    pub kind: ChainEventKind,
    /// The protocol contract this event was emitted from.
    pub contract_address: Address,
    /// Block number the event was included in.
    pub block_number: u64,
    /// Secondary ordering key within a block, if the indexer provides one.
    pub log_index: Option<u64>,
    /// Decoded event arguments (agreement id, provider address, etc).
    pub args: Value,
}

impl ChainEvent {
    /// The `agreementId` argument, if present and numeric.
    pub fn agreement_id(&self) -> Option<u64> {
        self.args.get("agreementId").and_then(Value::as_u64)
    }

    /// The `providerAddress` argument, if present and well-formed.
    pub fn provider_address(&self) -> Option<Address> {
        self.args
            .get("providerAddress")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
    }

    /// Sort key used to order a fetched page into application order.
    pub fn sort_key(&self) -> (u64, u64) {
        (self.block_number, self.log_index.unwrap_or(0))
    }
}

/// Sorts a batch of events into the order they must be applied in.
///
/// This is the only place event ordering is decided; the reconciler never
/// re-sorts events itself.
pub fn sort_events_for_application(mut events: Vec<ChainEvent>) -> Vec<ChainEvent> {
    events.sort_by_key(|e| e.sort_key());
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(kind: ChainEventKind, block: u64, log_index: Option<u64>) -> ChainEvent {
        ChainEvent {
            kind,
            contract_address: "0x0000000000000000000000000000000000000001"
                .parse()
                .unwrap(),
            block_number: block,
            log_index,
            args: json!({}),
        }
    }

    #[test]
    fn sorts_ascending_by_block_then_log_index() {
        let events = vec![
            event(ChainEventKind::AgreementClosed, 10, Some(0)),
            event(ChainEventKind::AgreementCreated, 10, Some(1)),
            event(ChainEventKind::AgreementCreated, 5, None),
        ];
        let sorted = sort_events_for_application(events);
        assert_eq!(sorted[0].block_number, 5);
        assert_eq!(sorted[1].block_number, 10);
        assert_eq!(sorted[1].kind, ChainEventKind::AgreementClosed);
        assert_eq!(sorted[2].kind, ChainEventKind::AgreementCreated);
    }
}
