//! An in-memory [`Store`] used by tests and local development.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use providerd_types::address::Address;
use providerd_types::detail::{Cid, DetailBlob};
use providerd_types::domain::{Protocol, Provider, Resource, VirtualProviderOfferConfiguration};
use providerd_types::error::DomainError;

use crate::store::Store;

#[derive(Default)]
struct Tables {
    protocols: HashMap<Address, Protocol>,
    providers_by_address: HashMap<Address, Provider>,
    providers_by_id: HashMap<u64, Address>,
    resources: HashMap<(u64, Address), Resource>,
    details: HashMap<Cid, DetailBlob>,
    config: HashMap<String, String>,
    vprov_offer_configs: HashMap<(u64, Address), VirtualProviderOfferConfiguration>,
}

/// A `Mutex`-guarded in-memory implementation of [`Store`].
///
/// Not for production use (§12 of the design docs); exists so
/// `providerd-reconciler`, `providerd-router` and `providerd-runtime` are
/// independently testable without a database.
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore {
            tables: Mutex::new(Tables::default()),
        }
    }
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        #[allow(clippy::unwrap_used)]
        self.tables.lock().unwrap()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_protocol(&self, address: &Address) -> Result<Option<Protocol>, DomainError> {
        Ok(self.lock().protocols.get(address).cloned())
    }

    async fn upsert_protocol(&self, protocol: Protocol) -> Result<(), DomainError> {
        self.lock()
            .protocols
            .insert(protocol.address.clone(), protocol);
        Ok(())
    }

    async fn get_provider_by_address(
        &self,
        address: &Address,
    ) -> Result<Option<Provider>, DomainError> {
        Ok(self.lock().providers_by_address.get(address).cloned())
    }

    async fn get_provider_by_id(&self, id: u64) -> Result<Option<Provider>, DomainError> {
        let tables = self.lock();
        Ok(tables
            .providers_by_id
            .get(&id)
            .and_then(|addr| tables.providers_by_address.get(addr))
            .cloned())
    }

    async fn list_virtual_children(
        &self,
        gateway_provider_id: u64,
    ) -> Result<Vec<Provider>, DomainError> {
        Ok(self
            .lock()
            .providers_by_address
            .values()
            .filter(|p| p.gateway_provider_id == Some(gateway_provider_id))
            .cloned()
            .collect())
    }

    async fn upsert_provider(&self, provider: Provider) -> Result<(), DomainError> {
        let mut tables = self.lock();
        tables.providers_by_id.insert(provider.id, provider.owner_address.clone());
        tables
            .providers_by_address
            .insert(provider.owner_address.clone(), provider);
        Ok(())
    }

    async fn get_resource(
        &self,
        id: u64,
        protocol_address: &Address,
        owner_address: &Address,
    ) -> Result<Option<Resource>, DomainError> {
        let tables = self.lock();
        Ok(tables
            .resources
            .get(&(id, protocol_address.clone()))
            .filter(|r| &r.owner_address == owner_address)
            .cloned())
    }

    async fn get_resource_unchecked(
        &self,
        id: u64,
        protocol_address: &Address,
    ) -> Result<Option<Resource>, DomainError> {
        Ok(self
            .lock()
            .resources
            .get(&(id, protocol_address.clone()))
            .cloned())
    }

    async fn list_resources_by_owner(
        &self,
        owner_address: &Address,
    ) -> Result<Vec<Resource>, DomainError> {
        Ok(self
            .lock()
            .resources
            .values()
            .filter(|r| &r.owner_address == owner_address && r.is_active)
            .cloned()
            .collect())
    }

    async fn insert_resource(&self, resource: Resource) -> Result<(), DomainError> {
        let mut tables = self.lock();
        let key = (resource.id, resource.protocol_address.clone());
        if tables.resources.contains_key(&key) {
            return Err(DomainError::Inconsistent(format!(
                "resource {} already exists for protocol {}",
                resource.id, resource.protocol_address
            )));
        }
        tables.resources.insert(key, resource);
        Ok(())
    }

    async fn update_resource(&self, resource: Resource) -> Result<(), DomainError> {
        let mut tables = self.lock();
        let key = (resource.id, resource.protocol_address.clone());
        if !tables.protocols.contains_key(&resource.protocol_address) {
            tracing::warn!(
                target: "store",
                event = "update_unknown_protocol",
                protocol = %resource.protocol_address,
                resource_id = resource.id,
                "dropping update for resource under unknown protocol",
            );
            return Ok(());
        }
        tables.resources.insert(key, resource);
        Ok(())
    }

    async fn delete_resource(&self, id: u64, protocol_address: &Address) -> Result<(), DomainError> {
        let mut tables = self.lock();
        if let Some(resource) = tables.resources.get_mut(&(id, protocol_address.clone())) {
            resource.close();
        }
        Ok(())
    }

    async fn get_detail(&self, cid: &Cid) -> Result<Option<DetailBlob>, DomainError> {
        Ok(self.lock().details.get(cid).cloned())
    }

    async fn get_details(&self, cids: &[Cid]) -> Result<Vec<DetailBlob>, DomainError> {
        let tables = self.lock();
        Ok(cids.iter().filter_map(|c| tables.details.get(c).cloned()).collect())
    }

    async fn upsert_detail(&self, blob: DetailBlob) -> Result<(), DomainError> {
        let mut tables = self.lock();
        tables.details.entry(blob.cid.clone()).or_insert(blob);
        Ok(())
    }

    async fn sync_detail_files(&self, blobs: Vec<DetailBlob>) -> Result<(), DomainError> {
        let mut tables = self.lock();
        let incoming: std::collections::HashSet<Cid> =
            blobs.iter().map(|b| b.cid.clone()).collect();
        tables.details.retain(|cid, _| incoming.contains(cid));
        for blob in blobs {
            tables.details.entry(blob.cid.clone()).or_insert(blob);
        }
        Ok(())
    }

    async fn get_config(&self, key: &str) -> Result<Option<String>, DomainError> {
        Ok(self.lock().config.get(key).cloned())
    }

    async fn set_config(&self, key: &str, value: String) -> Result<(), DomainError> {
        self.lock().config.insert(key.to_string(), value);
        Ok(())
    }

    async fn get_vprov_offer_configuration(
        &self,
        offer_id: u64,
        protocol_address: &Address,
    ) -> Result<Option<VirtualProviderOfferConfiguration>, DomainError> {
        Ok(self
            .lock()
            .vprov_offer_configs
            .get(&(offer_id, protocol_address.clone()))
            .cloned())
    }

    async fn set_vprov_offer_configuration(
        &self,
        config: VirtualProviderOfferConfiguration,
    ) -> Result<(), DomainError> {
        self.lock().vprov_offer_configs.insert(
            (config.offer_id, config.protocol_address.clone()),
            config,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use providerd_types::domain::{DeploymentStatus, Resource};
    use std::collections::BTreeMap;

    fn addr(n: u8) -> Address {
        format!("0x{:040x}", n).parse().unwrap()
    }

    fn resource(id: u64, protocol: Address, owner: Address) -> Resource {
        Resource {
            id,
            protocol_address: protocol,
            name: "r".into(),
            owner_address: owner,
            offer_id: 1,
            provider_id: 1,
            deployment_status: DeploymentStatus::Deploying,
            details: BTreeMap::new(),
            is_active: true,
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn insert_resource_rejects_duplicate() {
        let store = MemoryStore::new();
        let protocol = addr(1);
        let owner = addr(2);
        store.insert_resource(resource(1, protocol.clone(), owner.clone())).await.unwrap();
        let err = store.insert_resource(resource(1, protocol, owner)).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn get_resource_filters_by_owner() {
        let store = MemoryStore::new();
        let protocol = addr(1);
        let owner = addr(2);
        let other = addr(3);
        store.insert_resource(resource(1, protocol.clone(), owner.clone())).await.unwrap();
        assert!(store.get_resource(1, &protocol, &other).await.unwrap().is_none());
        assert!(store.get_resource(1, &protocol, &owner).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn sync_detail_files_deletes_missing_and_keeps_present() {
        let store = MemoryStore::new();
        let kept = DetailBlob::new(b"kept".to_vec());
        let removed = DetailBlob::new(b"removed".to_vec());
        store.upsert_detail(kept.clone()).await.unwrap();
        store.upsert_detail(removed.clone()).await.unwrap();
        store.sync_detail_files(vec![kept.clone()]).await.unwrap();
        assert!(store.get_detail(&kept.cid).await.unwrap().is_some());
        assert!(store.get_detail(&removed.cid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_resource_drops_write_for_unknown_protocol() {
        let store = MemoryStore::new();
        let protocol = addr(1);
        let owner = addr(2);
        let r = resource(1, protocol.clone(), owner);
        // no upsert_protocol call: protocol is unknown to the store.
        store.update_resource(r).await.unwrap();
        assert!(store.get_resource_unchecked(1, &protocol).await.unwrap().is_none());
    }
}
