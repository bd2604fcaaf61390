#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! Chain and indexer client facades.
//!
//! These traits are the daemon's only point of contact with the two
//! external collaborators it never implements itself: the blockchain client
//! library and the indexer REST service. Production wiring supplies real
//! implementations (e.g. over `reqwest`, following the retry/backoff idiom
//! in [`retry`]); tests use `providerd-testkit`'s scripted fakes.

/// `ChainClient`: typed reads of on-chain provider/offer/agreement records.
pub mod chain;
/// `IndexerClient`: ordered event and agreement queries against the indexer.
pub mod indexer;
/// Shared HTTP retry/backoff helpers for facade implementations.
pub mod retry;

pub use chain::ChainClient;
pub use indexer::IndexerClient;
