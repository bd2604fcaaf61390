//! `ProviderRuntime`: startup validation and the virtual-provider roster.

use std::sync::Arc;

use providerd_facades::ChainClient;
use providerd_store::Store;
use providerd_types::address::Address;
use providerd_types::domain::{Agreement, Provider, Resource};
use providerd_types::error::NotFoundError;
use thiserror::Error;

use crate::backend::ServiceBackend;

/// Failures that can occur while validating or assembling a provider's
/// runtime at startup. Fatal for the provider being validated; siblings are
/// unaffected (§4.3 item 2 of the design docs).
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The configured owner address has no corresponding on-chain actor.
    #[error("owner {0} is not a registered on-chain actor")]
    UnknownOwner(Address),
    /// The provider's `detailsLink` does not resolve in the Detail Registry.
    #[error("details for provider {0} not found in the detail registry")]
    MissingProviderDetails(Address),
    /// The provider's details blob does not validate against the provider
    /// schema (a required string `name`).
    #[error("details for provider {0} do not validate against the provider schema")]
    InvalidProviderDetails(Address),
    /// An offer's `detailsLink` does not resolve in the Detail Registry.
    #[error("details for offer {0} not found in the detail registry")]
    MissingOfferDetails(u64),
    /// The provider is not registered under any protocol and none was configured.
    #[error("provider {0} has no registered protocols and none was configured")]
    NoProtocol(Address),
    /// A virtual child's operator/endpoint does not match its gateway.
    #[error("virtual provider {child} does not share operator/endpoint with gateway {gateway}")]
    EndpointMismatch {
        /// The virtual child's address.
        child: Address,
        /// The gateway's address.
        gateway: Address,
    },
}

/// Validates a provider-details blob against the provider schema of §4.3
/// item 1: an object carrying a required string `name`.
fn validate_provider_details(content: &[u8]) -> bool {
    match serde_json::from_slice::<serde_json::Value>(content) {
        Ok(serde_json::Value::Object(object)) => matches!(object.get("name"), Some(serde_json::Value::String(_))),
        _ => false,
    }
}

/// One physical provider's fully validated runtime: its chain-resolved
/// identity, its protocol, and the virtual children it fronts.
pub struct ProviderRuntime {
    /// The physical (or standalone) provider this runtime serves.
    pub provider: Provider,
    /// The protocol address this runtime operates under.
    pub protocol_address: Address,
    /// Virtual children that passed validation; failed children are logged
    /// and skipped rather than failing the whole runtime.
    pub virtual_children: Vec<Provider>,
    /// The concrete service lifecycle implementation.
    pub backend: Arc<dyn ServiceBackend>,
}

impl ProviderRuntime {
    /// Every provider id this runtime answers requests for: the physical
    /// provider plus each validated virtual child.
    pub fn served_provider_ids(&self) -> Vec<u64> {
        std::iter::once(self.provider.id)
            .chain(self.virtual_children.iter().map(|c| c.id))
            .collect()
    }

    /// `true` if `id` is served by this runtime (physical or virtual).
    pub fn serves(&self, id: u64) -> bool {
        self.provider.id == id || self.virtual_children.iter().any(|c| c.id == id)
    }

    /// Resolves the actor (physical provider or virtual child) responsible
    /// for an event emitted by `event_provider_address`, per §4.4 step 3 of
    /// the design docs: the provider itself if addresses match, else the
    /// matching virtual child.
    pub fn resolve_actor(&self, event_provider_address: &Address) -> Option<&Provider> {
        if &self.provider.owner_address == event_provider_address {
            return Some(&self.provider);
        }
        self.virtual_children
            .iter()
            .find(|c| &c.owner_address == event_provider_address)
    }

    /// Loads and authorizes a resource for a request handler: the public
    /// contract a `ServiceBackend`'s own routes are built against.
    ///
    /// Resolves `id` scoped to `requester` (so an unowned resource is
    /// indistinguishable from a missing one), then confirms it is active and
    /// that its provider is one this runtime serves — a gateway's own
    /// handler cannot be tricked into answering for a resource belonging to
    /// an unrelated provider sharing the same protocol.
    pub async fn authorize_and_load_resource(
        &self,
        store: &dyn Store,
        chain: &dyn ChainClient,
        id: u64,
        protocol_address: &Address,
        requester: &Address,
    ) -> Result<(Resource, Agreement), NotFoundError> {
        let resource = store
            .get_resource(id, protocol_address, requester)
            .await
            .ok()
            .flatten()
            .ok_or(NotFoundError::Resource { id })?;

        if !resource.is_active || !self.serves(resource.provider_id) {
            return Err(NotFoundError::Resource { id });
        }

        let agreement = chain
            .get_agreement(id)
            .await
            .ok()
            .flatten()
            .ok_or(NotFoundError::Resource { id })?;

        Ok((resource, agreement))
    }
}

/// Validates and builds a [`ProviderRuntime`] for `owner_address`, per §4.3
/// items 1-2 of the design docs.
///
/// `configured_protocol` overrides protocol selection; when absent, the
/// provider's first registered protocol is used and a warning is logged.
pub async fn build_runtime(
    owner_address: &Address,
    configured_protocol: Option<Address>,
    chain: &dyn ChainClient,
    store: &dyn Store,
    backend: Arc<dyn ServiceBackend>,
) -> Result<ProviderRuntime, RuntimeError> {
    let provider = chain
        .get_actor(owner_address)
        .await
        .ok()
        .flatten()
        .ok_or_else(|| RuntimeError::UnknownOwner(owner_address.clone()))?;

    let details = store
        .get_detail(&provider.details_link)
        .await
        .ok()
        .flatten()
        .ok_or_else(|| RuntimeError::MissingProviderDetails(owner_address.clone()))?;
    if !validate_provider_details(&details.content) {
        return Err(RuntimeError::InvalidProviderDetails(owner_address.clone()));
    }

    let protocol_address = match configured_protocol {
        Some(p) => p,
        None => {
            let protocols = chain
                .get_registered_protocols_of(provider.id)
                .await
                .unwrap_or_default();
            let first = protocols
                .into_iter()
                .next()
                .ok_or_else(|| RuntimeError::NoProtocol(owner_address.clone()))?;
            tracing::warn!(
                target: "runtime",
                event = "protocol_inferred",
                provider = %owner_address,
                protocol = %first.address,
                "no protocol configured; using provider's first registered protocol",
            );
            first.address
        }
    };

    let offers = chain
        .get_all_provider_offers(provider.id)
        .await
        .unwrap_or_default();
    for offer in &offers {
        if store.get_detail(&offer.details_link).await.ok().flatten().is_none() {
            return Err(RuntimeError::MissingOfferDetails(offer.id));
        }
    }

    let virtual_children = validate_virtual_children(&provider, chain, store).await;

    Ok(ProviderRuntime {
        provider,
        protocol_address,
        virtual_children,
        backend,
    })
}

/// Loads and validates a gateway's virtual-provider roster (§4.3 item 2).
/// Children that fail validation are logged and dropped; the gateway
/// continues to operate with whatever children remain.
async fn validate_virtual_children(
    gateway: &Provider,
    chain: &dyn ChainClient,
    store: &dyn Store,
) -> Vec<Provider> {
    let candidates = store
        .list_virtual_children(gateway.id)
        .await
        .unwrap_or_default();

    let mut valid = Vec::new();
    for child in candidates {
        match validate_one_child(gateway, &child, chain, store).await {
            Ok(()) => valid.push(child),
            Err(err) => {
                tracing::warn!(
                    target: "runtime",
                    event = "vprov_validation_failed",
                    gateway = %gateway.owner_address,
                    child = %child.owner_address,
                    error = %err,
                    "skipping virtual provider that failed startup validation",
                );
            }
        }
    }
    valid
}

async fn validate_one_child(
    gateway: &Provider,
    child: &Provider,
    chain: &dyn ChainClient,
    store: &dyn Store,
) -> Result<(), RuntimeError> {
    let on_chain = chain
        .get_actor(&child.owner_address)
        .await
        .ok()
        .flatten()
        .ok_or_else(|| RuntimeError::UnknownOwner(child.owner_address.clone()))?;

    let details = store
        .get_detail(&on_chain.details_link)
        .await
        .ok()
        .flatten()
        .ok_or_else(|| RuntimeError::MissingProviderDetails(child.owner_address.clone()))?;
    if !validate_provider_details(&details.content) {
        return Err(RuntimeError::InvalidProviderDetails(child.owner_address.clone()));
    }

    if on_chain.operator_address != gateway.operator_address || on_chain.endpoint != gateway.endpoint {
        return Err(RuntimeError::EndpointMismatch {
            child: child.owner_address.clone(),
            gateway: gateway.owner_address.clone(),
        });
    }

    let offers = chain
        .get_all_provider_offers(on_chain.id)
        .await
        .unwrap_or_default();
    for offer in &offers {
        if store.get_detail(&offer.details_link).await.ok().flatten().is_none() {
            return Err(RuntimeError::MissingOfferDetails(offer.id));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use providerd_store::memory::MemoryStore;
    use providerd_types::domain::{AgreementStatus, DeploymentStatus, Offer, Protocol};
    use providerd_types::error::TransportError;
    use std::any::Any;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    fn addr(n: u8) -> Address {
        #[allow(clippy::unwrap_used)]
        format!("0x{:040x}", n).parse().unwrap()
    }

    #[derive(Default)]
    struct StubChain {
        agreements: Mutex<std::collections::HashMap<u64, Agreement>>,
    }

    #[async_trait]
    impl ChainClient for StubChain {
        async fn get_actor(&self, _address: &Address) -> Result<Option<Provider>, TransportError> {
            Ok(None)
        }
        async fn get_registered_protocols_of(&self, _id: u64) -> Result<Vec<Protocol>, TransportError> {
            Ok(vec![])
        }
        async fn get_offer(&self, _id: u64) -> Result<Option<Offer>, TransportError> {
            Ok(None)
        }
        async fn get_agreement(&self, id: u64) -> Result<Option<Agreement>, TransportError> {
            #[allow(clippy::unwrap_used)]
            Ok(self.agreements.lock().unwrap().get(&id).cloned())
        }
        async fn get_all_provider_offers(&self, _id: u64) -> Result<Vec<Offer>, TransportError> {
            Ok(vec![])
        }
        async fn close_agreement(&self, _id: u64) -> Result<(), TransportError> {
            Ok(())
        }
        async fn register_offer(
            &self,
            _request: providerd_facades::chain::RegisterOfferRequest,
        ) -> Result<u64, TransportError> {
            Ok(1)
        }
    }

    struct NoopBackend;

    #[async_trait]
    impl ServiceBackend for NoopBackend {
        async fn create(
            &self,
            _agreement: &Agreement,
            _offer: &Offer,
        ) -> Result<crate::backend::ResourceDetails, providerd_types::error::BackendError> {
            unreachable!()
        }
        async fn get_details(
            &self,
            _agreement: &Agreement,
            _offer: &Offer,
            _resource: &Resource,
        ) -> Result<crate::backend::ResourceDetails, providerd_types::error::BackendError> {
            unreachable!()
        }
        async fn delete(
            &self,
            _agreement: &Agreement,
            _offer: &Offer,
            _resource: &Resource,
        ) -> Result<(), providerd_types::error::BackendError> {
            unreachable!()
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn runtime_for(provider_id: u64, virtual_children: Vec<Provider>) -> ProviderRuntime {
        ProviderRuntime {
            provider: Provider {
                id: provider_id,
                owner_address: addr(1),
                operator_address: addr(1),
                endpoint: "https://provider.example".into(),
                details_link: providerd_types::Cid::of(b"p"),
                is_virtual: false,
                gateway_provider_id: None,
            },
            protocol_address: addr(9),
            virtual_children,
            backend: Arc::new(NoopBackend),
        }
    }

    fn resource(id: u64, provider_id: u64, owner: Address, active: bool) -> Resource {
        Resource {
            id,
            protocol_address: addr(9),
            name: "r".into(),
            owner_address: owner,
            offer_id: 1,
            provider_id,
            deployment_status: DeploymentStatus::Running,
            details: BTreeMap::new(),
            is_active: active,
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn authorizes_resource_served_by_runtime() {
        let store = MemoryStore::new();
        let chain = StubChain::default();
        #[allow(clippy::unwrap_used)]
        chain.agreements.lock().unwrap().insert(
            1,
            Agreement {
                id: 1,
                user_address: addr(2),
                provider_address: addr(1),
                offer_id: 1,
                balance: "10".into(),
                status: AgreementStatus::Active,
                created_at: 0,
            },
        );
        store.insert_resource(resource(1, 1, addr(2), true)).await.unwrap();

        let runtime = runtime_for(1, vec![]);
        let (resource, agreement) = runtime
            .authorize_and_load_resource(&store, &chain, 1, &addr(9), &addr(2))
            .await
            .unwrap();
        assert_eq!(resource.id, 1);
        assert_eq!(agreement.id, 1);
    }

    #[tokio::test]
    async fn rejects_resource_owned_by_unrelated_provider() {
        let store = MemoryStore::new();
        let chain = StubChain::default();
        store.insert_resource(resource(1, 99, addr(2), true)).await.unwrap();

        let runtime = runtime_for(1, vec![]);
        let err = runtime
            .authorize_and_load_resource(&store, &chain, 1, &addr(9), &addr(2))
            .await
            .unwrap_err();
        assert!(matches!(err, NotFoundError::Resource { id: 1 }));
    }

    #[tokio::test]
    async fn rejects_inactive_resource() {
        let store = MemoryStore::new();
        let chain = StubChain::default();
        store.insert_resource(resource(1, 1, addr(2), false)).await.unwrap();

        let runtime = runtime_for(1, vec![]);
        let err = runtime
            .authorize_and_load_resource(&store, &chain, 1, &addr(9), &addr(2))
            .await
            .unwrap_err();
        assert!(matches!(err, NotFoundError::Resource { id: 1 }));
    }
}
