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

//! The `Store` trait: transactional persistence of protocols, providers,
//! resources, detail blobs, configuration, and virtual-provider per-offer
//! configuration.
//!
//! A relational store is an external collaborator (never shipped here); this
//! crate defines the trait plus [`memory::MemoryStore`], an in-memory
//! reference implementation used by tests and `providerd-testkit` so the
//! rest of the daemon is exercised without a database.

/// In-memory reference implementation of [`Store`].
pub mod memory;
/// The `Store` trait itself.
pub mod store;

pub use store::Store;
