//! `ChainClient`: typed reads of on-chain provider/offer/agreement records,
//! plus the one write the daemon performs itself (`close_agreement`).

use async_trait::async_trait;
use providerd_types::domain::{Agreement, Offer, Protocol, Provider};
use providerd_types::error::TransportError;
use providerd_types::{Address, Cid};

/// Parameters for registering a new offer on behalf of a virtual provider.
#[derive(Debug, Clone)]
pub struct RegisterOfferRequest {
    /// Owning provider's address.
    pub provider_owner_address: Address,
    /// CID of the offer's details blob.
    pub details_link: Cid,
    /// Per-second fee, as a decimal string.
    pub fee_per_second: String,
    /// Initial stock to register.
    pub stock_amount: u64,
}

/// Reads (and the one write) the daemon performs against the blockchain.
///
/// Implementations live outside this workspace (§1 of the design docs); this
/// trait is the daemon's only point of contact with them. Addresses are
/// 20-byte and compared case-insensitively via `providerd_types::Address`.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Looks up a provider or owner actor by address.
    async fn get_actor(&self, address: &Address) -> Result<Option<Provider>, TransportError>;

    /// Lists the protocols a provider is registered under.
    async fn get_registered_protocols_of(
        &self,
        provider_id: u64,
    ) -> Result<Vec<Protocol>, TransportError>;

    /// Looks up an offer by id.
    async fn get_offer(&self, offer_id: u64) -> Result<Option<Offer>, TransportError>;

    /// Looks up an agreement by id.
    async fn get_agreement(&self, agreement_id: u64) -> Result<Option<Agreement>, TransportError>;

    /// Lists every offer owned by a provider.
    async fn get_all_provider_offers(
        &self,
        provider_id: u64,
    ) -> Result<Vec<Offer>, TransportError>;

    /// Closes an agreement on-chain. Idempotent from the daemon's
    /// perspective: closing an already-closed agreement is not an error.
    async fn close_agreement(&self, agreement_id: u64) -> Result<(), TransportError>;

    /// Registers a new offer for a virtual provider, returning its assigned id.
    async fn register_offer(&self, request: RegisterOfferRequest) -> Result<u64, TransportError>;

    /// Computes the content identifier the chain would assign to `content`.
    ///
    /// Exposed so callers can pre-validate a submitted detail blob's CID
    /// against the on-chain `detailsLink` before writing it to the registry.
    fn generate_cid(&self, content: &[u8]) -> Cid {
        Cid::of(content)
    }
}
