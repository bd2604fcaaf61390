#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # Provider Daemon Types
//!
//! Foundational data structures shared across every crate in the provider
//! daemon: the marketplace domain model (`Protocol`, `Provider`, `Offer`,
//! `Agreement`, `Resource`), the content-addressed detail blob, address
//! normalization, and the error taxonomy.
//!
//! As the base crate, `providerd-types` has minimal dependencies and is a
//! dependency for almost every other crate in the workspace. This prevents
//! circular dependencies and provides one canonical definition for types
//! that cross crate boundaries.

/// A top-level, crate-wide `Result` alias with a default error type.
pub type Result<T, E = crate::error::DomainError> = std::result::Result<T, E>;

/// Case-insensitive on-chain addresses.
pub mod address;
/// Content-addressed detail blobs (CID -> bytes).
pub mod detail;
/// The marketplace domain model: protocols, providers, offers, agreements, resources.
pub mod domain;
/// The unified set of error types used across the daemon.
pub mod error;
/// Chain/indexer event types consumed by the reconciler.
pub mod event;

pub use address::Address;
pub use detail::{Cid, DetailBlob};
