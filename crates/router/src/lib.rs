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

//! The Request Router (C5): two transports sharing one route table, with
//! provider-scoped sub-dispatch and operator-level marketplace routes.

/// The request/response/error envelope shared by both transports.
pub mod envelope;
/// Operator-level route handlers (`/spec`, `/details`, `/resources`, vPROV
/// management).
pub mod handlers;
/// The HTTP transport: an axum `Router` with the teacher's layering
/// conventions (rate limiting, body-size limit, timeout, load-shed,
/// panic-catching, tracing), graceful shutdown via `watch`.
pub mod http_transport;
/// Bridges a backend's declared provider-scoped routes into live dispatch.
pub mod service_routes;
/// The route table: operator routes plus per-provider sub-dispatch.
pub mod table;
/// The `Transport` trait both listeners implement.
pub mod transport;

pub use envelope::{Method, PipeError, PipeRequest, PipeResponse};
pub use service_routes::register_service_routes;
pub use table::{HandlerFn, RouteTable};
pub use transport::Transport;
