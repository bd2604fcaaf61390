//! The HTTP `Transport`: one axum listener, built the way the teacher's
//! `http-rpc-gateway` builds its gateway — rate limiting, body-size limit,
//! timeout, load-shed, panic-catching, tracing, graceful shutdown.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::body::Body;
use axum::error_handling::HandleErrorLayer;
use axum::extract::{ConnectInfo, State};
use axum::http::{Method as HttpMethod, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::any;
use axum::Router;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use prometheus::{
    exponential_buckets, register_histogram_vec, register_int_counter_vec, HistogramVec,
    IntCounterVec,
};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower::limit::ConcurrencyLimitLayer;
use tower::load_shed::LoadShedLayer;
use tower::timeout::TimeoutLayer;
use tower::{BoxError, ServiceBuilder};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::envelope::{Method, PipeError, PipeRequest};
use crate::table::RouteTable;
use crate::transport::Transport;

static HTTP_REQUESTS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static HTTP_REQUEST_LATENCY: OnceCell<HistogramVec> = OnceCell::new();

fn install_http_metrics() {
    if HTTP_REQUESTS_TOTAL.get().is_some() {
        return;
    }

    #[allow(clippy::expect_used)]
    let requests_total = register_int_counter_vec!(
        "providerd_http_requests_total",
        "Total HTTP requests handled by the operator pipe",
        &["path", "status"]
    )
    .expect("register providerd_http_requests_total");
    let _ = HTTP_REQUESTS_TOTAL.set(requests_total);

    #[allow(clippy::expect_used)]
    let buckets = exponential_buckets(0.001, 2.0, 15).expect("exponential_buckets");
    #[allow(clippy::expect_used)]
    let request_latency = register_histogram_vec!(
        "providerd_http_request_duration_seconds",
        "Latency of operator pipe requests (seconds)",
        &["path"],
        buckets
    )
    .expect("register providerd_http_request_duration_seconds");
    let _ = HTTP_REQUEST_LATENCY.set(request_latency);
}

macro_rules! get_metric {
    ($m:ident) => {
        $m.get()
    };
}

/// Request-rate limiting by client IP, identical in shape to the teacher's
/// `IpLimiter`: a token bucket per address, refilled continuously.
#[derive(Clone)]
struct IpLimiter {
    buckets: Arc<DashMap<IpAddr, Bucket>>,
    rps: f64,
    burst: f64,
}

#[derive(Clone)]
struct Bucket {
    tokens: f64,
    last: Instant,
}

impl IpLimiter {
    fn new(rps: u32, burst: u32) -> Self {
        IpLimiter {
            buckets: Arc::new(DashMap::new()),
            rps: rps as f64,
            burst: burst as f64,
        }
    }

    fn client_ip<B>(req: &Request<B>) -> IpAddr {
        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|c| c.0.ip())
            .unwrap_or_else(|| IpAddr::from([127, 0, 0, 1]))
    }

    fn allow<B>(&self, req: &Request<B>) -> bool {
        let ip = Self::client_ip(req);
        let now = Instant::now();
        let mut entry = self.buckets.entry(ip).or_insert_with(|| Bucket {
            tokens: self.burst,
            last: now,
        });
        let elapsed = now.duration_since(entry.last).as_secs_f64();
        entry.tokens = (entry.tokens + elapsed * self.rps).min(self.burst);
        entry.last = now;
        if entry.tokens >= 1.0 {
            entry.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

async fn rate_limit_middleware(
    State(limiter): State<IpLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if limiter.allow(&req) {
        next.run(req).await
    } else {
        (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded").into_response()
    }
}

async fn map_middleware_error(err: BoxError) -> impl IntoResponse {
    if err.is::<tower::timeout::error::Elapsed>() {
        (
            StatusCode::REQUEST_TIMEOUT,
            Json(serde_json::json!({ "error": "request timed out" })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": err.to_string() })),
        )
    }
}

/// Configuration for one operator HTTP listener.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Address to bind, e.g. `0.0.0.0:4000`.
    pub listen_addr: SocketAddr,
    /// Allowed requests per second, per client IP.
    pub rate_limit_rps: u32,
    /// Token bucket burst size.
    pub rate_limit_burst: u32,
    /// Maximum accepted request body size, in bytes.
    pub body_limit_bytes: usize,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

/// The envelope posted as the HTTP request body. `path`/`params`/`path_params`
/// are supplied here rather than read off the URL, since one physical HTTP
/// endpoint fronts the whole operator pipe (the router's own `(method, path)`
/// table does the real dispatch) — `path` need not match the URL the request
/// arrived on.
#[derive(Debug, Deserialize)]
struct HttpEnvelope {
    id: String,
    requester: String,
    path: String,
    #[serde(default)]
    params: Value,
    #[serde(default)]
    path_params: Value,
    #[serde(default)]
    body: Value,
}

fn map_method(method: &HttpMethod) -> Result<Method, PipeError> {
    match *method {
        HttpMethod::GET => Ok(Method::Get),
        HttpMethod::POST => Ok(Method::Post),
        HttpMethod::PATCH => Ok(Method::Patch),
        HttpMethod::DELETE => Ok(Method::Delete),
        _ => Err(PipeError::bad_request("unsupported HTTP method")),
    }
}

#[derive(Clone)]
struct AppState {
    routes: Arc<RouteTable>,
}

async fn pipe_handler(State(state): State<AppState>, req: Request<Body>) -> Response {
    let started = Instant::now();
    let method = req.method().clone();
    let (result, path_label) = handle(&state, req).await;
    let status = result.code;

    if let (Some(total), Some(latency)) = (
        get_metric!(HTTP_REQUESTS_TOTAL),
        get_metric!(HTTP_REQUEST_LATENCY),
    ) {
        total
            .with_label_values(&[&path_label, &status.to_string()])
            .inc();
        latency
            .with_label_values(&[&path_label])
            .observe(started.elapsed().as_secs_f64());
    }
    tracing::debug!(
        target: "router",
        event = "request_complete",
        method = %method,
        path = %path_label,
        status,
    );

    #[allow(clippy::unwrap_used)]
    let status_code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status_code, Json(result.body)).into_response()
}

async fn handle(state: &AppState, req: Request<Body>) -> (crate::envelope::PipeResponse, String) {
    let method = req.method().clone();
    let body_bytes = match axum::body::to_bytes(req.into_body(), usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            return (
                PipeError::bad_request(format!("failed to read body: {}", err)).into_response(),
                "unknown".to_string(),
            )
        }
    };

    let envelope: HttpEnvelope = match serde_json::from_slice(&body_bytes) {
        Ok(envelope) => envelope,
        Err(err) => {
            return (
                PipeError::bad_request(format!("invalid request envelope: {}", err)).into_response(),
                "unknown".to_string(),
            )
        }
    };
    let path_label = envelope.path.clone();

    let requester = match envelope.requester.parse() {
        Ok(addr) => addr,
        Err(_) => {
            return (
                PipeError::bad_request("requester is not a valid address").into_response(),
                path_label,
            )
        }
    };

    let pipe_method = match map_method(&method) {
        Ok(m) => m,
        Err(err) => return (err.into_response(), path_label),
    };

    let pipe_req = PipeRequest {
        id: envelope.id,
        requester,
        path: envelope.path,
        path_params: envelope.path_params,
        params: envelope.params,
        body: envelope.body,
    };

    tracing::debug!(
        target: "router",
        event = "request_start",
        request_id = %pipe_req.id,
        path = %path_label,
    );

    let response = state.routes.dispatch(pipe_method, pipe_req).await;
    (response, path_label)
}

/// The HTTP listener serving the operator pipe.
pub struct HttpTransport {
    config: HttpTransportConfig,
}

impl HttpTransport {
    /// Builds a new HTTP transport bound to `config.listen_addr` once served.
    pub fn new(config: HttpTransportConfig) -> Self {
        HttpTransport { config }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn serve(&self, routes: Arc<RouteTable>, cancellation: CancellationToken) -> anyhow::Result<()> {
        install_http_metrics();

        let state = AppState { routes };

        let limiter = IpLimiter::new(self.config.rate_limit_rps, self.config.rate_limit_burst);

        let app = Router::new()
            .fallback(any(pipe_handler))
            .with_state(state)
            .layer(middleware::from_fn_with_state(
                limiter.clone(),
                rate_limit_middleware,
            ))
            .layer(
                ServiceBuilder::new()
                    .layer(HandleErrorLayer::new(map_middleware_error))
                    .layer(LoadShedLayer::new())
                    .layer(ConcurrencyLimitLayer::new(256))
                    .layer(TimeoutLayer::new(self.config.request_timeout)),
            )
            .layer(CatchPanicLayer::new())
            .layer(TraceLayer::new_for_http())
            .layer(RequestBodyLimitLayer::new(self.config.body_limit_bytes));

        let listener = tokio::net::TcpListener::bind(self.config.listen_addr).await?;
        tracing::info!(
            target: "router",
            event = "http_listening",
            addr = %self.config.listen_addr,
        );

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let cancel_task = {
            let cancellation = cancellation.clone();
            tokio::spawn(async move {
                cancellation.cancelled().await;
                let _ = shutdown_tx.send(true);
            })
        };

        let server = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown_rx.changed().await.ok();
            tracing::info!(target: "router", event = "http_shutdown", "shutting down gracefully");
        });

        if let Err(err) = server.await {
            tracing::error!(target: "router", error = %err, "http server error");
        }
        cancel_task.abort();
        Ok(())
    }
}
