//! A bundled reference [`Environment`] backed entirely by
//! [`providerd_testkit`]'s in-memory fakes, for running the daemon with no
//! real chain, indexer, or database behind it.
//!
//! Mirrors the teacher's split between a production boot binary
//! (`guardian.rs`) and a local-development one (`ioi-local.rs`): the same
//! boot sequence runs either way, only the collaborators it's handed
//! differ.

use std::sync::Arc;

use async_trait::async_trait;
use providerd_config::ProviderConfig;
use providerd_facades::{ChainClient, IndexerClient};
use providerd_runtime::ServiceBackend;
use providerd_store::memory::MemoryStore;
use providerd_store::Store;
use providerd_testkit::{EchoBackend, FakeChainClient, FakeIndexerClient};
use providerd_types::Address;
use sha2::{Digest, Sha256};

use crate::environment::{Environment, EnvironmentError};

/// The bundled development environment: an in-memory store and scripted
/// chain/indexer fakes, with no real external collaborators wired in.
///
/// Not for production use (§12 of the design docs). Callers that want
/// pre-seeded on-chain actors/offers/agreements should hold onto their own
/// `Arc<FakeChainClient>`/`Arc<FakeIndexerClient>` and seed them with the
/// `with_*`/`push_*` builders before handing this environment to the
/// supervisor — [`Environment::chain_client`]/[`Environment::indexer_client`]
/// return the same instances back as trait objects.
pub struct DevEnvironment {
    chain: Arc<FakeChainClient>,
    indexer: Arc<FakeIndexerClient>,
    store: Arc<MemoryStore>,
}

impl DevEnvironment {
    /// Builds an empty development environment.
    pub fn new() -> Self {
        DevEnvironment {
            chain: Arc::new(FakeChainClient::new()),
            indexer: Arc::new(FakeIndexerClient::new()),
            store: Arc::new(MemoryStore::new()),
        }
    }

    /// The underlying fake chain client, for seeding fixtures before boot.
    pub fn fake_chain(&self) -> Arc<FakeChainClient> {
        self.chain.clone()
    }

    /// The underlying fake indexer client, for seeding fixtures before boot.
    pub fn fake_indexer(&self) -> Arc<FakeIndexerClient> {
        self.indexer.clone()
    }
}

impl Default for DevEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Environment for DevEnvironment {
    fn chain_client(&self) -> Arc<dyn ChainClient> {
        self.chain.clone()
    }

    fn indexer_client(&self) -> Arc<dyn IndexerClient> {
        self.indexer.clone()
    }

    fn store(&self) -> Arc<dyn Store> {
        self.store.clone()
    }

    async fn backend_for(
        &self,
        _config: &ProviderConfig,
    ) -> Result<Arc<dyn ServiceBackend>, EnvironmentError> {
        Ok(Arc::new(EchoBackend::new()))
    }

    /// Hashes the private key into a 20-byte address. This is **not** key
    /// derivation — no secp256k1 public-key recovery happens here. Real key
    /// handling belongs to the blockchain client library, an external
    /// collaborator this workspace never implements (§1); this placeholder
    /// only needs to map the same key to the same address deterministically
    /// so dev-mode startup validation has something stable to look up.
    fn derive_address(&self, tag: &str, private_key_hex: &str) -> Result<Address, EnvironmentError> {
        let mut hasher = Sha256::new();
        hasher.update(private_key_hex.as_bytes());
        let digest = hasher.finalize();
        let address = format!("0x{}", hex::encode(&digest[..20]));
        address.parse().map_err(|_: providerd_types::error::ValidationError| {
            EnvironmentError::KeyDerivation {
                tag: tag.to_string(),
                reason: "hashed digest did not parse as an address".to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_address_is_deterministic() {
        let env = DevEnvironment::new();
        let a = env.derive_address("alpha", "0xdeadbeef").unwrap();
        let b = env.derive_address("alpha", "0xdeadbeef").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn derive_address_differs_across_keys() {
        let env = DevEnvironment::new();
        let a = env.derive_address("alpha", "0xdeadbeef").unwrap();
        let b = env.derive_address("alpha", "0xfeedface").unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn backend_for_builds_an_echo_backend() {
        let env = DevEnvironment::new();
        let config = ProviderConfig {
            tag: "alpha".into(),
            provider_private_key: "0x1".into(),
            billing_private_key: "0x2".into(),
            operator_private_key: "0x3".into(),
            operator_pipe_port: 4000,
            protocol_address: None,
            is_gateway: false,
        };
        let backend = env.backend_for(&config).await.unwrap();
        assert!(backend.as_any().downcast_ref::<EchoBackend>().is_some());
    }
}
