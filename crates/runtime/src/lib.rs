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

//! The Provider Runtime: identity, virtual-provider roster, startup
//! validation, and the `ServiceBackend` contract a concrete service plugs
//! into.
//!
//! Mirrors the capability-trait idiom this workspace uses elsewhere for
//! optional service extensions: a base trait ([`ServiceBackend`]) with
//! default-`None` downcasts ([`ServiceBackend::as_gateway_config_provider`],
//! [`ServiceBackend::as_request_router_extender`]) instead of multiple
//! inheritance.

/// The `ServiceBackend` contract and its optional capability traits.
pub mod backend;
/// `ProviderRuntime`: startup validation and the virtual-provider roster.
pub mod runtime;

pub use backend::{
    GatewayConfigProvider, ProviderRequestHandler, RequestRouterExtender, ResourceDetails,
    ServiceBackend,
};
pub use runtime::{ProviderRuntime, RuntimeError};
