//! The `Transport` trait: the one abstraction both the HTTP listener and a
//! future signed-messaging listener implement.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::table::RouteTable;

/// A listener that authenticates inbound requests and dispatches them
/// through a shared [`RouteTable`].
///
/// The HTTP transport (`http_transport`) is the only implementation shipped
/// in this workspace; a signed-messaging transport is this trait's other
/// intended implementer (§6 of the design docs), left as an extension point
/// since no concrete message bus is specified. `routes` is handed in as an
/// `Arc` — registration happens once at startup and every transport (and, in
/// a multi-provider daemon, every listener) shares the same table.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Runs the listener until `cancellation` fires.
    async fn serve(&self, routes: Arc<RouteTable>, cancellation: CancellationToken) -> anyhow::Result<()>;
}
