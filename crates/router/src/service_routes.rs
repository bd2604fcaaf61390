//! Bridges a backend's declared provider-scoped routes (§4.3 item 5) into
//! the route table's actual dispatch.
//!
//! A backend's [`RequestRouterExtender::init`] only *declares* which
//! `(method, path)` pairs it wants to answer; this module turns that
//! declaration into a live handler — authorizing the caller and loading the
//! resource/agreement pair through
//! [`ProviderRuntime::authorize_and_load_resource`] before handing off to the
//! backend's [`ProviderRequestHandler`].

use std::sync::Arc;

use providerd_facades::ChainClient;
use providerd_runtime::backend::{ProviderRoute, RouteMethod, RouteRegistrar};
use providerd_runtime::ProviderRuntime;
use providerd_store::Store;
use providerd_types::error::ErrorCode;

use crate::envelope::{Method, PipeError, PipeRequest, PipeResponse};
use crate::table::RouteTable;

fn map_route_method(method: RouteMethod) -> Method {
    match method {
        RouteMethod::Get => Method::Get,
        RouteMethod::Post => Method::Post,
        RouteMethod::Patch => Method::Patch,
        RouteMethod::Delete => Method::Delete,
    }
}

struct CollectingRegistrar {
    routes: Vec<ProviderRoute>,
}

impl RouteRegistrar for CollectingRegistrar {
    fn register_provider_route(&mut self, route: ProviderRoute) {
        self.routes.push(route);
    }
}

/// Registers `runtime`'s backend-declared provider routes into `table`,
/// under the runtime's own provider id and every validated virtual child's
/// id (§4.5: a vPROV's requests route to its gateway's handler).
///
/// No-ops if the backend does not implement `RequestRouterExtender` — a
/// backend that only implements the base lifecycle is fully functional
/// without any provider-scoped routes.
pub fn register_service_routes(
    table: &RouteTable,
    runtime: Arc<ProviderRuntime>,
    store: Arc<dyn Store>,
    chain: Arc<dyn ChainClient>,
) {
    let Some(extender) = runtime.backend.as_request_router_extender() else {
        return;
    };
    let mut registrar = CollectingRegistrar { routes: Vec::new() };
    extender.init(&mut registrar);

    let provider_ids = runtime.served_provider_ids();
    for route in registrar.routes {
        let method = map_route_method(route.method);
        let path = route.path.clone();
        let runtime = runtime.clone();
        let store = store.clone();
        let chain = chain.clone();
        let handler_fn: crate::table::HandlerFn = Arc::new(move |req: PipeRequest| {
            let runtime = runtime.clone();
            let store = store.clone();
            let chain = chain.clone();
            let route = ProviderRoute {
                method: route.method,
                path: route.path.clone(),
            };
            Box::pin(async move { dispatch_service_route(runtime, store, chain, route, req).await })
        });

        for provider_id in &provider_ids {
            table.register_provider_route(method, *provider_id, &path, handler_fn.clone());
        }
    }
}

async fn dispatch_service_route(
    runtime: Arc<ProviderRuntime>,
    store: Arc<dyn Store>,
    chain: Arc<dyn ChainClient>,
    route: ProviderRoute,
    req: PipeRequest,
) -> Result<PipeResponse, PipeError> {
    let id = req
        .path_params
        .get("id")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| PipeError::bad_request("id path parameter is required"))?;

    let (resource, agreement) = runtime
        .authorize_and_load_resource(store.as_ref(), chain.as_ref(), id, &runtime.protocol_address, &req.requester)
        .await
        .map_err(|err| PipeError {
            code: 404,
            message: format!("{} ({})", err, err.code()),
        })?;

    let offer = chain
        .get_offer(resource.offer_id)
        .await
        .map_err(|err| PipeError::internal(err.to_string()))?
        .ok_or_else(|| PipeError::not_found("no such offer"))?;

    let handler = runtime
        .backend
        .as_provider_request_handler()
        .ok_or_else(|| PipeError::internal("backend declared a route without a request handler"))?;

    let body = handler
        .handle(&route, &agreement, &offer, &resource, req.body.clone())
        .await
        .map_err(|err| PipeError::internal(err.to_string()))?;

    Ok(PipeResponse::ok(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use providerd_runtime::backend::{ProviderRequestHandler, ServiceBackend};
    use providerd_store::memory::MemoryStore;
    use providerd_testkit::fixtures::{addr, agreement, offer, resource, ProviderBuilder};
    use providerd_testkit::{EchoBackend, FakeChainClient};
    use serde_json::json;

    struct EchoHandler(EchoBackend);

    #[async_trait::async_trait]
    impl ServiceBackend for EchoHandler {
        async fn create(
            &self,
            agreement: &providerd_types::domain::Agreement,
            offer: &providerd_types::domain::Offer,
        ) -> Result<providerd_runtime::ResourceDetails, providerd_types::error::BackendError> {
            self.0.create(agreement, offer).await
        }
        async fn get_details(
            &self,
            agreement: &providerd_types::domain::Agreement,
            offer: &providerd_types::domain::Offer,
            resource: &providerd_types::domain::Resource,
        ) -> Result<providerd_runtime::ResourceDetails, providerd_types::error::BackendError> {
            self.0.get_details(agreement, offer, resource).await
        }
        async fn delete(
            &self,
            agreement: &providerd_types::domain::Agreement,
            offer: &providerd_types::domain::Offer,
            resource: &providerd_types::domain::Resource,
        ) -> Result<(), providerd_types::error::BackendError> {
            self.0.delete(agreement, offer, resource).await
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
        fn as_request_router_extender(
            &self,
        ) -> Option<&dyn providerd_runtime::backend::RequestRouterExtender> {
            Some(self)
        }
        fn as_provider_request_handler(&self) -> Option<&dyn ProviderRequestHandler> {
            Some(self)
        }
    }

    impl providerd_runtime::backend::RequestRouterExtender for EchoHandler {
        fn init(&self, registrar: &mut dyn RouteRegistrar) {
            registrar.register_provider_route(ProviderRoute {
                method: RouteMethod::Get,
                path: "/ping/:id".into(),
            });
        }
    }

    #[async_trait::async_trait]
    impl ProviderRequestHandler for EchoHandler {
        async fn handle(
            &self,
            _route: &ProviderRoute,
            _agreement: &providerd_types::domain::Agreement,
            _offer: &providerd_types::domain::Offer,
            resource: &providerd_types::domain::Resource,
            _body: serde_json::Value,
        ) -> Result<serde_json::Value, providerd_types::error::BackendError> {
            Ok(json!({ "resourceId": resource.id, "pong": true }))
        }
    }

    #[tokio::test]
    async fn declared_route_dispatches_to_backend_handler() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let chain: Arc<dyn ChainClient> = Arc::new(
            FakeChainClient::new()
                .with_agreement(agreement(1, addr(2), addr(1), 1))
                .with_offer(1, offer(1, addr(1))),
        );
        store.insert_resource(resource(1, addr(9), addr(2), 1, 1)).await.unwrap();

        let runtime = Arc::new(ProviderRuntime {
            provider: ProviderBuilder::new(1, addr(1)).build(),
            protocol_address: addr(9),
            virtual_children: vec![],
            backend: Arc::new(EchoHandler(EchoBackend::new())),
        });

        let table = RouteTable::new();
        register_service_routes(&table, runtime, store, chain);

        let req = PipeRequest {
            id: "1".into(),
            requester: addr(2),
            path: "/ping/:id".into(),
            path_params: json!({ "id": 1 }),
            params: json!({ "providerId": 1 }),
            body: json!({}),
        };
        let resp = table.dispatch(Method::Get, req).await;
        assert_eq!(resp.code, 200);
        assert_eq!(resp.body["resourceId"], 1);
    }

    #[tokio::test]
    async fn backend_without_extender_registers_nothing() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let chain: Arc<dyn ChainClient> = Arc::new(FakeChainClient::new());
        let runtime = Arc::new(ProviderRuntime {
            provider: ProviderBuilder::new(1, addr(1)).build(),
            protocol_address: addr(9),
            virtual_children: vec![],
            backend: Arc::new(EchoBackend::new()),
        });

        let table = RouteTable::new();
        register_service_routes(&table, runtime, store, chain);

        let req = PipeRequest {
            id: "1".into(),
            requester: addr(2),
            path: "/ping/:id".into(),
            path_params: json!({ "id": 1 }),
            params: json!({ "providerId": 1 }),
            body: json!({}),
        };
        let resp = table.dispatch(Method::Get, req).await;
        assert_eq!(resp.code, 404);
    }
}
