//! The transactional persistence interface.

use async_trait::async_trait;
use providerd_types::address::Address;
use providerd_types::detail::{Cid, DetailBlob};
use providerd_types::domain::{Protocol, Provider, Resource, VirtualProviderOfferConfiguration};
use providerd_types::error::DomainError;

/// Transactional persistence of the daemon's local state.
///
/// All address lookups are case-insensitive (callers pass
/// `providerd_types::Address`, which normalizes on construction, so
/// implementations only need equality on the normalized form).
#[async_trait]
pub trait Store: Send + Sync {
    // -- protocols -----------------------------------------------------

    /// Fetches a protocol by address, if known.
    async fn get_protocol(&self, address: &Address) -> Result<Option<Protocol>, DomainError>;

    /// Inserts a protocol if absent; idempotent.
    async fn upsert_protocol(&self, protocol: Protocol) -> Result<(), DomainError>;

    // -- providers -------------------------------------------------------

    /// Fetches a provider by its on-chain owner address.
    async fn get_provider_by_address(
        &self,
        address: &Address,
    ) -> Result<Option<Provider>, DomainError>;

    /// Fetches a provider by its local numeric id.
    async fn get_provider_by_id(&self, id: u64) -> Result<Option<Provider>, DomainError>;

    /// Lists every virtual child registered under `gateway_provider_id`.
    async fn list_virtual_children(
        &self,
        gateway_provider_id: u64,
    ) -> Result<Vec<Provider>, DomainError>;

    /// Inserts or replaces a provider row.
    async fn upsert_provider(&self, provider: Provider) -> Result<(), DomainError>;

    // -- resources ---------------------------------------------------------

    /// Fetches a resource by id, filtered to the given protocol and owner.
    ///
    /// Filtering by owner at the query layer (rather than after the fact) is
    /// how unauthorized lookups are rejected without leaking existence.
    async fn get_resource(
        &self,
        id: u64,
        protocol_address: &Address,
        owner_address: &Address,
    ) -> Result<Option<Resource>, DomainError>;

    /// Fetches a resource by id and protocol regardless of owner, for
    /// internal reconciler/watcher use.
    async fn get_resource_unchecked(
        &self,
        id: u64,
        protocol_address: &Address,
    ) -> Result<Option<Resource>, DomainError>;

    /// Lists every active resource owned by `owner_address`.
    async fn list_resources_by_owner(
        &self,
        owner_address: &Address,
    ) -> Result<Vec<Resource>, DomainError>;

    /// Inserts a new resource row. Returns an error if one already exists
    /// for `(id, protocol_address)` — callers check existence first as part
    /// of the reconciler's idempotent-create guard.
    async fn insert_resource(&self, resource: Resource) -> Result<(), DomainError>;

    /// Updates an existing resource. A reference to an unknown protocol logs
    /// a warning and silently drops the update rather than erroring, so a
    /// stray write never corrupts an unrelated protocol's rows.
    async fn update_resource(&self, resource: Resource) -> Result<(), DomainError>;

    /// Marks a resource inactive, closed, and detail-wiped.
    async fn delete_resource(&self, id: u64, protocol_address: &Address) -> Result<(), DomainError>;

    // -- detail blobs --------------------------------------------------------

    /// Fetches a detail blob by CID.
    async fn get_detail(&self, cid: &Cid) -> Result<Option<DetailBlob>, DomainError>;

    /// Fetches several detail blobs by CID; missing CIDs are simply absent
    /// from the result rather than erroring.
    async fn get_details(&self, cids: &[Cid]) -> Result<Vec<DetailBlob>, DomainError>;

    /// Inserts a detail blob if its CID is not already present; idempotent.
    async fn upsert_detail(&self, blob: DetailBlob) -> Result<(), DomainError>;

    /// Single transaction: deletes every stored blob whose CID is not in
    /// `blobs`, then upserts `blobs`. After this call the store's CID set
    /// equals the given set exactly.
    async fn sync_detail_files(&self, blobs: Vec<DetailBlob>) -> Result<(), DomainError>;

    // -- config -------------------------------------------------------------

    /// Reads a daemon-scoped config value.
    async fn get_config(&self, key: &str) -> Result<Option<String>, DomainError>;

    /// Writes a daemon-scoped config value.
    async fn set_config(&self, key: &str, value: String) -> Result<(), DomainError>;

    // -- virtual-provider offer configuration --------------------------------

    /// Reads a virtual-provider offer's configuration.
    async fn get_vprov_offer_configuration(
        &self,
        offer_id: u64,
        protocol_address: &Address,
    ) -> Result<Option<VirtualProviderOfferConfiguration>, DomainError>;

    /// Writes (inserts or replaces) a virtual-provider offer's configuration.
    async fn set_vprov_offer_configuration(
        &self,
        config: VirtualProviderOfferConfiguration,
    ) -> Result<(), DomainError>;
}

/// Well-known config key under which the reconciler persists its cursor.
pub const LAST_PROCESSED_BLOCK_KEY: &str = "LAST_PROCESSED_BLOCK";
