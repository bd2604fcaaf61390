//! Fakes and fixtures for exercising the provider daemon's components without
//! a live chain, indexer, or service backend.

#![deny(missing_docs)]

pub mod backend;
pub mod chain;
pub mod fixtures;
pub mod indexer;

pub use backend::EchoBackend;
pub use chain::FakeChainClient;
pub use indexer::FakeIndexerClient;
