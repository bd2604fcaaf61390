//! Operator-level route handlers: `/spec`, `/details`, `/resources`, and the
//! virtual-provider-management surface of §4.6.

use std::path::PathBuf;
use std::sync::Arc;

use providerd_facades::chain::{ChainClient, RegisterOfferRequest};
use providerd_registry::{vprov_details_filename, vprov_offer_details_filename, write_back};
use providerd_runtime::backend::ServiceBackend;
use providerd_runtime::GatewayConfigProvider;
use providerd_store::Store;
use providerd_types::address::Address;
use providerd_types::detail::{Cid, DetailBlob};
use providerd_types::domain::{Provider, VirtualProviderOfferConfiguration};
use serde_json::{json, Value};

use crate::envelope::{Method, PipeError, PipeRequest, PipeResponse};
use crate::table::RouteTable;

/// Shared state every operator-level handler closes over.
///
/// One `HandlerContext` is built at startup per gateway (or per standalone
/// daemon with no virtual-provider surface) and cloned into each registered
/// closure; all fields are cheap to clone (`Arc`/`PathBuf`).
#[derive(Clone)]
pub struct HandlerContext {
    /// Chain facade, used to validate on-chain state during vPROV registration.
    pub chain: Arc<dyn ChainClient>,
    /// Local persistence.
    pub store: Arc<dyn Store>,
    /// Directory `GET /spec` serves `spec.{yaml,json}`/`oas.{yaml,json}` from.
    pub spec_dir: PathBuf,
    /// Directory detail files are written back to after vPROV registration.
    pub details_dir: PathBuf,
    /// The gateway provider this context fronts, and its backend — `None` for
    /// a daemon with no virtual-provider surface (vPROV routes 404/disable).
    pub gateway: Option<GatewayContext>,
}

/// The gateway-specific state backing the §4.6 virtual-provider routes.
#[derive(Clone)]
pub struct GatewayContext {
    /// The physical gateway provider.
    pub provider: Provider,
    /// The protocol this gateway (and its virtual children) registers under.
    pub protocol_address: Address,
    /// The gateway's service backend, whose `GatewayConfigProvider` capability
    /// (if any) backs the configuration routes.
    pub backend: Arc<dyn ServiceBackend>,
}

/// `GET /spec`: serves the first of `spec.yaml`, `spec.json`, `oas.yaml`,
/// `oas.json` found under `spec_dir`.
pub async fn get_spec(ctx: HandlerContext, _req: PipeRequest) -> Result<PipeResponse, PipeError> {
    for name in ["spec.yaml", "spec.json", "oas.yaml", "oas.json"] {
        let path = ctx.spec_dir.join(name);
        if let Ok(content) = tokio::fs::read_to_string(&path).await {
            return Ok(PipeResponse::ok(json!({ "filename": name, "content": content })));
        }
    }
    Err(PipeError::not_found("no spec file available"))
}

/// `GET /details`: body/params `cids: Vec<String>`, returns the matching raw
/// blob contents.
pub async fn get_details(ctx: HandlerContext, req: PipeRequest) -> Result<PipeResponse, PipeError> {
    let raw_cids = req
        .body
        .get("cids")
        .or_else(|| req.params.get("cids"))
        .and_then(Value::as_array)
        .ok_or_else(|| PipeError::bad_request("cids is required"))?;

    let cids: Vec<Cid> = raw_cids
        .iter()
        .filter_map(Value::as_str)
        .map(|s| Cid::from(s.to_string()))
        .collect();

    let blobs = ctx
        .store
        .get_details(&cids)
        .await
        .map_err(|err| PipeError::internal(err.to_string()))?;

    if blobs.is_empty() {
        return Err(PipeError::not_found("no matching details"));
    }

    let body: Vec<Value> = blobs
        .into_iter()
        .map(|blob| json!({ "cid": blob.cid.to_string(), "content": String::from_utf8_lossy(&blob.content) }))
        .collect();
    Ok(PipeResponse::ok(json!(body)))
}

/// `GET /resources`: all resources owned by `req.requester`, or a single
/// resource if `id`/`pt` are both present. Strips `_`-prefixed detail keys.
pub async fn get_resources(ctx: HandlerContext, req: PipeRequest) -> Result<PipeResponse, PipeError> {
    let id = req.params.get("id").and_then(Value::as_u64);
    let protocol_address = req
        .params
        .get("pt")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<Address>().ok());

    let resources = match (id, protocol_address) {
        (Some(id), Some(pt)) => {
            let resource = ctx
                .store
                .get_resource(id, &pt, &req.requester)
                .await
                .map_err(|err| PipeError::internal(err.to_string()))?
                .ok_or_else(|| PipeError::not_found("no such resource"))?;
            vec![resource]
        }
        _ => ctx
            .store
            .list_resources_by_owner(&req.requester)
            .await
            .map_err(|err| PipeError::internal(err.to_string()))?,
    };

    let body: Vec<Value> = resources
        .into_iter()
        .map(|r| {
            let public = r.public_details();
            json!({
                "id": r.id,
                "protocolAddress": r.protocol_address.to_string(),
                "name": r.name,
                "offerId": r.offer_id,
                "providerId": r.provider_id,
                "deploymentStatus": r.deployment_status,
                "details": public,
                "isActive": r.is_active,
                "createdAt": r.created_at,
            })
        })
        .collect();
    Ok(PipeResponse::ok(json!(body)))
}

/// Confirms `requester` is a registered virtual child of `gateway`. Per
/// §4.6, every vPROV endpoint but registration itself requires this.
async fn require_virtual_child(
    ctx: &HandlerContext,
    gateway: &GatewayContext,
    requester: &Address,
) -> Result<(), PipeError> {
    let provider = ctx
        .store
        .get_provider_by_address(requester)
        .await
        .map_err(|err| PipeError::internal(err.to_string()))?
        .ok_or_else(|| PipeError::not_authorized("requester is not a known virtual child"))?;
    if provider.is_virtual && provider.gateway_provider_id == Some(gateway.provider.id) {
        Ok(())
    } else {
        Err(PipeError::not_authorized("requester is not a known virtual child"))
    }
}

/// `POST /virtual-providers` body.
#[derive(serde::Deserialize)]
struct RegisterVirtualProviderBody {
    details_file: String,
}

/// `POST /virtual-providers`: registers the caller as a virtual child of this
/// gateway, per §4.6.
pub async fn register_virtual_provider(
    ctx: HandlerContext,
    req: PipeRequest,
) -> Result<PipeResponse, PipeError> {
    let gateway = ctx
        .gateway
        .as_ref()
        .ok_or_else(|| PipeError::internal("this daemon has no virtual-provider surface"))?;

    if ctx
        .store
        .get_provider_by_address(&req.requester)
        .await
        .map_err(|err| PipeError::internal(err.to_string()))?
        .is_some()
    {
        return Err(PipeError::bad_request("a provider already exists for this address"));
    }

    let body: RegisterVirtualProviderBody = serde_json::from_value(req.body.clone())
        .map_err(|err| PipeError::bad_request(format!("invalid body: {}", err)))?;

    validate_provider_schema(&body.details_file)?;

    let on_chain = ctx
        .chain
        .get_actor(&req.requester)
        .await
        .map_err(|err| PipeError::internal(err.to_string()))?
        .ok_or_else(|| PipeError::not_authorized("requester is not a registered on-chain provider"))?;

    if on_chain.operator_address != gateway.provider.operator_address
        || on_chain.endpoint != gateway.provider.endpoint
    {
        return Err(PipeError::bad_request(
            "provider operator/endpoint does not match this gateway",
        ));
    }

    let content = body.details_file.as_bytes();
    let cid = ctx.chain.generate_cid(content);
    if on_chain.details_link != cid {
        return Err(PipeError::not_found(
            "submitted details do not match the on-chain details link",
        ));
    }

    let filename = vprov_details_filename(&req.requester, &cid);
    write_back(&ctx.details_dir, &filename, content)
        .map_err(|err| PipeError::internal(err.to_string()))?;

    ctx.store
        .upsert_detail(DetailBlob::new(content.to_vec()))
        .await
        .map_err(|err| PipeError::internal(err.to_string()))?;

    let provider = Provider {
        id: on_chain.id,
        owner_address: req.requester.clone(),
        operator_address: on_chain.operator_address,
        endpoint: on_chain.endpoint,
        details_link: cid,
        is_virtual: true,
        gateway_provider_id: Some(gateway.provider.id),
    };
    ctx.store
        .upsert_provider(provider.clone())
        .await
        .map_err(|err| PipeError::internal(err.to_string()))?;

    Ok(PipeResponse::ok(json!({ "providerId": provider.id })))
}

/// `POST /virtual-providers/offers` body.
#[derive(serde::Deserialize)]
struct RegisterOfferBody {
    details_file: String,
    fee: String,
    configuration: Value,
    #[serde(default)]
    stock_amount: Option<u64>,
    #[serde(default)]
    existing_offer_id: Option<u64>,
}

/// `POST /virtual-providers/offers`: registers (or reuses) an offer for the
/// caller's virtual provider, per §4.6.
pub async fn register_virtual_provider_offer(
    ctx: HandlerContext,
    req: PipeRequest,
) -> Result<PipeResponse, PipeError> {
    let gateway = ctx
        .gateway
        .as_ref()
        .ok_or_else(|| PipeError::internal("this daemon has no virtual-provider surface"))?;
    require_virtual_child(&ctx, gateway, &req.requester).await?;

    #[allow(clippy::unwrap_used)]
    let vprov = ctx
        .store
        .get_provider_by_address(&req.requester)
        .await
        .map_err(|err| PipeError::internal(err.to_string()))?
        .unwrap();

    let body: RegisterOfferBody = serde_json::from_value(req.body.clone())
        .map_err(|err| PipeError::bad_request(format!("invalid body: {}", err)))?;

    let content = body.details_file.as_bytes();
    let cid = ctx.chain.generate_cid(content);
    ctx.store
        .upsert_detail(DetailBlob::new(content.to_vec()))
        .await
        .map_err(|err| PipeError::internal(err.to_string()))?;

    let offer_id = match body.existing_offer_id {
        Some(id) => {
            ctx.chain
                .get_offer(id)
                .await
                .map_err(|err| PipeError::internal(err.to_string()))?
                .ok_or_else(|| PipeError::bad_request("existing_offer_id does not exist on-chain"))?;
            id
        }
        None => ctx
            .chain
            .register_offer(RegisterOfferRequest {
                provider_owner_address: vprov.owner_address.clone(),
                details_link: cid.clone(),
                fee_per_second: body.fee,
                stock_amount: body.stock_amount.unwrap_or(1000),
            })
            .await
            .map_err(|err| PipeError::internal(err.to_string()))?,
    };

    let filename = vprov_offer_details_filename(&vprov.owner_address, offer_id, &gateway.protocol_address, &cid);
    write_back(&ctx.details_dir, &filename, content)
        .map_err(|err| PipeError::internal(err.to_string()))?;

    ctx.store
        .set_vprov_offer_configuration(VirtualProviderOfferConfiguration {
            offer_id,
            protocol_address: gateway.protocol_address.clone(),
            configuration: body.configuration,
        })
        .await
        .map_err(|err| PipeError::internal(err.to_string()))?;

    Ok(PipeResponse::ok(json!({ "offerId": offer_id })))
}

/// `GET /virtual-provider-configurations`: the gateway backend's declared
/// configuration schema.
pub async fn get_configuration_schema(
    ctx: HandlerContext,
    req: PipeRequest,
) -> Result<PipeResponse, PipeError> {
    let gateway = ctx
        .gateway
        .as_ref()
        .ok_or_else(|| PipeError::internal("this daemon has no virtual-provider surface"))?;
    require_virtual_child(&ctx, gateway, &req.requester).await?;

    let provider = gateway
        .backend
        .as_gateway_config_provider()
        .ok_or_else(|| PipeError::internal("backend does not support virtual-provider configuration"))?;

    let schema = provider.configuration_schema();
    Ok(PipeResponse::ok(
        serde_json::to_value(schema).map_err(|err| PipeError::internal(err.to_string()))?,
    ))
}

fn offer_id_from_path(req: &PipeRequest) -> Result<u64, PipeError> {
    req.path_params
        .get("offer_id")
        .and_then(Value::as_u64)
        .ok_or_else(|| PipeError::bad_request("offer_id path parameter is required"))
}

/// `GET /virtual-provider-configurations/:offer_id`: reads one offer's
/// configuration, after confirming on-chain ownership by the requester.
pub async fn get_offer_configuration(
    ctx: HandlerContext,
    req: PipeRequest,
) -> Result<PipeResponse, PipeError> {
    let gateway = ctx
        .gateway
        .as_ref()
        .ok_or_else(|| PipeError::internal("this daemon has no virtual-provider surface"))?;
    let offer_id = offer_id_from_path(&req)?;
    authorize_offer_owner(&ctx, gateway, &req.requester, offer_id).await?;

    let provider = gateway
        .backend
        .as_gateway_config_provider()
        .ok_or_else(|| PipeError::internal("backend does not support virtual-provider configuration"))?;
    let value = provider
        .get_configuration(offer_id)
        .await
        .map_err(|err| PipeError::internal(err.to_string()))?;
    Ok(PipeResponse::ok(value))
}

/// `PATCH /virtual-provider-configurations/:offer_id`: replaces one offer's
/// configuration, after confirming on-chain ownership by the requester.
pub async fn set_offer_configuration(
    ctx: HandlerContext,
    req: PipeRequest,
) -> Result<PipeResponse, PipeError> {
    let gateway = ctx
        .gateway
        .as_ref()
        .ok_or_else(|| PipeError::internal("this daemon has no virtual-provider surface"))?;
    let offer_id = offer_id_from_path(&req)?;
    authorize_offer_owner(&ctx, gateway, &req.requester, offer_id).await?;

    let provider = gateway
        .backend
        .as_gateway_config_provider()
        .ok_or_else(|| PipeError::internal("backend does not support virtual-provider configuration"))?;
    provider
        .set_configuration(offer_id, req.body.clone())
        .await
        .map_err(|err| PipeError::internal(err.to_string()))?;
    Ok(PipeResponse::ok(json!({ "ok": true })))
}

async fn authorize_offer_owner(
    ctx: &HandlerContext,
    _gateway: &GatewayContext,
    requester: &Address,
    offer_id: u64,
) -> Result<(), PipeError> {
    let offer = ctx
        .chain
        .get_offer(offer_id)
        .await
        .map_err(|err| PipeError::internal(err.to_string()))?
        .ok_or_else(|| PipeError::not_found("no such offer"))?;
    if &offer.owner_address != requester {
        return Err(PipeError::not_authorized("offer is not owned by requester"));
    }
    Ok(())
}

/// Validates a submitted provider-details payload against the provider
/// schema of §4.3 item 1 / §4.6: an object carrying a required string
/// `name`, with `description`/`homepage` optional. A full JSON-Schema
/// validator is not wired up; this is the bounded shape the spec names.
fn validate_provider_schema(raw: &str) -> Result<(), PipeError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|err| PipeError::bad_request(format!("details_file is not valid JSON: {}", err)))?;
    let object = value
        .as_object()
        .ok_or_else(|| PipeError::bad_request("details_file must be a JSON object"))?;
    match object.get("name") {
        Some(Value::String(_)) => Ok(()),
        _ => Err(PipeError::bad_request("details_file is missing a string \"name\" field")),
    }
}

/// Registers every operator-level route of §4.5/§4.6 into `table`, closing
/// each handler over its own clone of `ctx`.
pub fn register_operator_routes(table: &mut RouteTable, ctx: HandlerContext) {
    macro_rules! route {
        ($method:expr, $path:expr, $handler:expr) => {{
            let ctx = ctx.clone();
            table.register_operator_route(
                $method,
                $path,
                Arc::new(move |req| {
                    let ctx = ctx.clone();
                    Box::pin($handler(ctx, req))
                }),
            );
        }};
    }

    route!(Method::Get, "/spec", get_spec);
    route!(Method::Get, "/details", get_details);
    route!(Method::Get, "/resources", get_resources);
    route!(Method::Post, "/virtual-providers", register_virtual_provider);
    route!(
        Method::Post,
        "/virtual-providers/offers",
        register_virtual_provider_offer
    );
    route!(
        Method::Get,
        "/virtual-provider-configurations",
        get_configuration_schema
    );
    route!(
        Method::Get,
        "/virtual-provider-configurations/:offer_id",
        get_offer_configuration
    );
    route!(
        Method::Patch,
        "/virtual-provider-configurations/:offer_id",
        set_offer_configuration
    );
}
