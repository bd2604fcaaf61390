//! The route table: operator-level routes plus per-provider sub-dispatch.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::DashMap;

use crate::envelope::{Method, PipeError, PipeRequest, PipeResponse};

/// A boxed async handler function.
pub type HandlerFn = Arc<
    dyn Fn(PipeRequest) -> Pin<Box<dyn Future<Output = Result<PipeResponse, PipeError>> + Send>>
        + Send
        + Sync,
>;

/// Operator routes plus provider-scoped sub-dispatch, shared by both
/// transports for one operator identity.
///
/// Registration happens once at startup (§5: "write-once after"); lookups
/// happen on every request. The provider table uses `DashMap` for read-mostly
/// concurrent access, mirroring this workspace's `IpLimiter` rate-limiter
/// convention.
#[derive(Default)]
pub struct RouteTable {
    operator_routes: HashMap<(Method, String), HandlerFn>,
    provider_routes: DashMap<(Method, u64, String), HandlerFn>,
}

impl RouteTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an operator-level route (`/spec`, `/details`, `/resources`,
    /// vPROV management).
    pub fn register_operator_route(&mut self, method: Method, path: &str, handler: HandlerFn) {
        self.operator_routes.insert((method, path.to_string()), handler);
    }

    /// Registers a provider-scoped route under `provider_id`. Callers
    /// register the same handler under a gateway's id and each of its
    /// virtual children's ids so requests addressed to any vPROV route to
    /// the gateway's handler (§4.5).
    pub fn register_provider_route(
        &self,
        method: Method,
        provider_id: u64,
        path: &str,
        handler: HandlerFn,
    ) {
        self.provider_routes
            .insert((method, provider_id, path.to_string()), handler);
    }

    /// Dispatches a request: tries the operator table first, then the
    /// provider table (reading `providerId` from the request).
    pub async fn dispatch(&self, method: Method, req: PipeRequest) -> PipeResponse {
        let result = self.dispatch_inner(method, req).await;
        match result {
            Ok(response) => response,
            Err(err) => err.into_response(),
        }
    }

    async fn dispatch_inner(
        &self,
        method: Method,
        req: PipeRequest,
    ) -> Result<PipeResponse, PipeError> {
        if let Some(handler) = self.operator_routes.get(&(method, req.path.clone())) {
            return handler(req).await;
        }

        let provider_id = req.provider_id()?;
        let key = (method, provider_id, req.path.clone());
        let handler = self
            .provider_routes
            .get(&key)
            .ok_or_else(|| PipeError::not_found(format!("no route for {}", req.path)))?
            .clone();
        handler(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn req(path: &str, provider_id: Option<u64>) -> PipeRequest {
        PipeRequest {
            id: "1".into(),
            requester: "0x1111111111111111111111111111111111111111".parse().unwrap(),
            path: path.into(),
            path_params: json!({}),
            params: provider_id
                .map(|p| json!({ "providerId": p }))
                .unwrap_or_else(|| json!({})),
            body: json!({}),
        }
    }

    fn ok_handler() -> HandlerFn {
        Arc::new(|_req| Box::pin(async { Ok(PipeResponse::ok(json!({"ok": true}))) }))
    }

    #[tokio::test]
    async fn operator_route_takes_priority() {
        let mut table = RouteTable::new();
        table.register_operator_route(Method::Get, "/spec", ok_handler());
        let resp = table.dispatch(Method::Get, req("/spec", None)).await;
        assert_eq!(resp.code, 200);
    }

    #[tokio::test]
    async fn provider_route_requires_provider_id() {
        let table = RouteTable::new();
        table.register_provider_route(Method::Get, 1, "/custom", ok_handler());
        let resp = table.dispatch(Method::Get, req("/custom", None)).await;
        assert_eq!(resp.code, 400);
    }

    #[tokio::test]
    async fn vprov_routes_to_gateway_handler() {
        let table = RouteTable::new();
        let handler = ok_handler();
        table.register_provider_route(Method::Get, 1, "/custom", handler.clone());
        table.register_provider_route(Method::Get, 2, "/custom", handler);
        let resp = table.dispatch(Method::Get, req("/custom", Some(2))).await;
        assert_eq!(resp.code, 200);
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let table = RouteTable::new();
        let resp = table.dispatch(Method::Get, req("/custom", Some(1))).await;
        assert_eq!(resp.code, 404);
    }
}
