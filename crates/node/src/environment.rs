//! The `Environment` seam: everything the boot sequence needs from outside
//! this workspace, behind one trait.
//!
//! `ChainClient`, `IndexerClient`, and a concrete relational `Store` are all
//! external collaborators this workspace never ships a production
//! implementation of (§1 of the design docs). `Environment` is where a real
//! deployment plugs those in without touching [`crate::supervisor`]; the
//! bundled [`crate::dev::DevEnvironment`] wires in-memory fakes instead, the
//! same way the teacher's local-dev binary stands in for its production
//! node wiring.

use std::sync::Arc;

use async_trait::async_trait;
use providerd_config::ProviderConfig;
use providerd_facades::{ChainClient, IndexerClient};
use providerd_runtime::ServiceBackend;
use providerd_store::Store;
use providerd_types::Address;
use thiserror::Error;

/// Failures assembling one of an `Environment`'s collaborators.
#[derive(Error, Debug)]
pub enum EnvironmentError {
    /// Could not derive an on-chain address for a configured provider tag.
    #[error("could not derive an address for provider '{tag}': {reason}")]
    KeyDerivation {
        /// The provider tag the key was configured under.
        tag: String,
        /// Why derivation failed.
        reason: String,
    },
    /// Could not build a service backend for a configured provider tag.
    #[error("could not build a backend for provider '{tag}': {reason}")]
    BackendConstruction {
        /// The provider tag the backend was being built for.
        tag: String,
        /// Why construction failed.
        reason: String,
    },
}

/// Everything the supervisor needs from the outside world, bundled behind
/// one trait: the chain and indexer facades, local persistence, and a
/// service backend per configured provider tag.
///
/// One `Environment` is built once at process startup and shared by every
/// provider runtime and background loop; it outlives any single runtime.
#[async_trait]
pub trait Environment: Send + Sync {
    /// The chain facade every provider runtime shares.
    fn chain_client(&self) -> Arc<dyn ChainClient>;

    /// The indexer facade every provider runtime shares.
    fn indexer_client(&self) -> Arc<dyn IndexerClient>;

    /// Local persistence shared by every provider runtime.
    fn store(&self) -> Arc<dyn Store>;

    /// Builds the service backend for a configured provider tag. Called
    /// once per tag during the boot sequence, before startup validation.
    async fn backend_for(
        &self,
        config: &ProviderConfig,
    ) -> Result<Arc<dyn ServiceBackend>, EnvironmentError>;

    /// Derives the on-chain address controlled by `private_key_hex`, so the
    /// boot sequence can look the provider up on-chain before it has a
    /// validated `Provider` row to read an address from.
    fn derive_address(
        &self,
        tag: &str,
        private_key_hex: &str,
    ) -> Result<Address, EnvironmentError>;
}
