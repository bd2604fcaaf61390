//! The `ServiceBackend` contract: the lifecycle a concrete service plugs in.

use std::any::Any;
use std::collections::BTreeMap;

use async_trait::async_trait;
use providerd_types::domain::{Agreement, DeploymentStatus, Offer, Resource};
use providerd_types::error::BackendError;
use serde_json::Value;

/// The output of a lifecycle call: a status and a free-form details map.
///
/// `name` becomes the resource's display name on creation only; later calls
/// only update `status`/`details`.
#[derive(Debug, Clone)]
pub struct ResourceDetails {
    /// Display name, used only by `create`'s return value.
    pub name: Option<String>,
    /// Reported deployment status.
    pub status: DeploymentStatus,
    /// Backend-defined details (merged into the resource's `details` map).
    pub details: BTreeMap<String, Value>,
}

impl ResourceDetails {
    /// Convenience constructor for a backend that is immediately running.
    pub fn running(details: BTreeMap<String, Value>) -> Self {
        ResourceDetails {
            name: None,
            status: DeploymentStatus::Running,
            details,
        }
    }

    /// Convenience constructor for a backend still deploying.
    pub fn deploying(details: BTreeMap<String, Value>) -> Self {
        ResourceDetails {
            name: None,
            status: DeploymentStatus::Deploying,
            details,
        }
    }
}

/// The schema a `GatewayConfigProvider` declares for its per-offer
/// configuration fields.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConfigurationField {
    /// An example value, shown to operators.
    pub example: Value,
    /// A short format hint (e.g. `"url"`, `"decimal"`).
    pub format: String,
    /// Human-readable description.
    pub description: String,
    /// Whether the field must be present.
    pub required: bool,
    /// Default value when not required and absent.
    pub default: Option<Value>,
}

/// A gateway-capable backend's per-offer configuration surface.
///
/// Discovered via [`ServiceBackend::as_gateway_config_provider`]; a backend
/// that does not support virtual-provider configuration simply returns
/// `None` from that method instead of implementing this trait.
#[async_trait]
pub trait GatewayConfigProvider: Send + Sync {
    /// The configuration schema shown by `GET /virtual-provider-configurations`.
    fn configuration_schema(&self) -> BTreeMap<String, ConfigurationField>;

    /// Reads an offer's current configuration.
    async fn get_configuration(&self, offer_id: u64) -> Result<Value, BackendError>;

    /// Replaces an offer's configuration.
    async fn set_configuration(&self, offer_id: u64, value: Value) -> Result<(), BackendError>;
}

/// A route registered by a backend's [`RequestRouterExtender::init`].
pub struct ProviderRoute {
    /// HTTP-ish method this route answers to.
    pub method: RouteMethod,
    /// Path this route is registered under, relative to the provider's
    /// request namespace.
    pub path: String,
}

/// The method a provider-scoped route is registered under.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RouteMethod {
    /// Read-only query.
    Get,
    /// Create or invoke an action.
    Post,
    /// Partial update.
    Patch,
    /// Remove or tear down.
    Delete,
}

/// Sink a backend's [`RequestRouterExtender::init`] uses to declare its
/// provider-scoped routes. A concrete implementation lives in
/// `providerd-router`; this trait only describes the registration surface a
/// backend sees.
pub trait RouteRegistrar {
    /// Registers a provider-scoped route.
    fn register_provider_route(&mut self, route: ProviderRoute);
}

/// A backend that wants to register its own provider-scoped request routes.
///
/// Discovered via [`ServiceBackend::as_request_router_extender`]; invoked
/// once at startup, per §4.3 item 5 of the design docs.
pub trait RequestRouterExtender: Send + Sync {
    /// Registers this backend's provider-scoped routes.
    fn init(&self, registrar: &mut dyn RouteRegistrar);
}

/// Dispatches one inbound call against a route the backend declared through
/// [`RequestRouterExtender::init`]. The router has already authorized the
/// caller and loaded the resource/agreement pair (`authorizeAndLoadResource`,
/// §4.3) before invoking this.
#[async_trait]
pub trait ProviderRequestHandler: Send + Sync {
    /// Handles one call to `route`, returning the JSON body to send back.
    async fn handle(
        &self,
        route: &ProviderRoute,
        agreement: &Agreement,
        offer: &Offer,
        resource: &Resource,
        body: Value,
    ) -> Result<Value, BackendError>;
}

/// The lifecycle contract a concrete service implements.
///
/// Base trait plus optional capability downcasts — the same shape this
/// workspace uses for pluggable services elsewhere: a handful of mandatory
/// methods, and capability traits discovered through `as_*` methods that
/// default to `None` so a minimal backend implements only what it needs.
#[async_trait]
pub trait ServiceBackend: Send + Sync {
    /// Produces the initial details for a newly observed agreement. Called
    /// at most once per agreement — the reconciler only invokes this when no
    /// local resource row exists yet.
    async fn create(
        &self,
        agreement: &Agreement,
        offer: &Offer,
    ) -> Result<ResourceDetails, BackendError>;

    /// Polls a not-yet-`Running` resource for updated status/details.
    async fn get_details(
        &self,
        agreement: &Agreement,
        offer: &Offer,
        resource: &Resource,
    ) -> Result<ResourceDetails, BackendError>;

    /// Tears down a resource. Called when the backing agreement closes.
    async fn delete(
        &self,
        agreement: &Agreement,
        offer: &Offer,
        resource: &Resource,
    ) -> Result<(), BackendError>;

    /// Returns `self` as `Any` so capability traits can be downcast from a
    /// `dyn ServiceBackend` trait object.
    fn as_any(&self) -> &dyn Any;

    /// Gateway-configuration capability, if this backend supports it.
    fn as_gateway_config_provider(&self) -> Option<&dyn GatewayConfigProvider> {
        None
    }

    /// Extra-routes capability, if this backend registers its own routes.
    fn as_request_router_extender(&self) -> Option<&dyn RequestRouterExtender> {
        None
    }

    /// Dispatch capability backing the routes declared through
    /// [`ServiceBackend::as_request_router_extender`]. A backend that
    /// declares routes without implementing this never receives calls for
    /// them; the router answers with `NOT_FOUND` instead.
    fn as_provider_request_handler(&self) -> Option<&dyn ProviderRequestHandler> {
        None
    }
}
