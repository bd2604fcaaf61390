//! The Lifecycle Supervisor (C10): assembles every configured provider's
//! runtime, wires the shared route tables and background loops, and runs
//! them until the shared [`CancellationToken`] fires.
//!
//! A provider tag that fails startup validation is logged and skipped rather
//! than aborting the whole daemon (§4.3 item 2); the daemon only fails to
//! start if *no* tag validates at all, since a daemon serving zero providers
//! has nothing useful left to do.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use providerd_config::DaemonConfig;
use providerd_reconciler::{run_balance_sweeper, Reconciler, ReconcilerConfig, WatcherSupervisor};
use providerd_registry::sync_from_directory;
use providerd_router::handlers::{register_operator_routes, GatewayContext, HandlerContext};
use providerd_router::http_transport::{HttpTransport, HttpTransportConfig};
use providerd_router::{register_service_routes, RouteTable, Transport};
use providerd_runtime::runtime::build_runtime;
use providerd_runtime::ProviderRuntime;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::environment::Environment;

const DEFAULT_BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One provider tag that passed startup validation, alongside the port and
/// gateway flag its configuration declared (kept around for per-port
/// operator-route registration below).
struct Validated {
    port: u16,
    is_gateway: bool,
    runtime: Arc<ProviderRuntime>,
}

/// Runs the full boot sequence: detail sync, per-provider validation, route
/// table and transport construction, then every background loop, until
/// `cancellation` fires. Returns `Ok(())` only after an orderly shutdown;
/// an `Err` means startup itself failed and the process should exit.
pub async fn run(
    config: DaemonConfig,
    data_dir: PathBuf,
    environment: Arc<dyn Environment>,
    cancellation: CancellationToken,
) -> anyhow::Result<()> {
    let chain = environment.chain_client();
    let indexer = environment.indexer_client();
    let store = environment.store();

    let details_dir = data_dir.join("details");
    sync_from_directory(store.as_ref(), &details_dir).await?;

    let mut validated = Vec::new();
    for (tag, provider_config) in &config.providers {
        match validate_provider(provider_config, environment.as_ref(), chain.as_ref(), store.as_ref()).await {
            Ok(runtime) => validated.push(Validated {
                port: provider_config.operator_pipe_port,
                is_gateway: provider_config.is_gateway,
                runtime: Arc::new(runtime),
            }),
            Err(err) => {
                tracing::error!(
                    target: "node",
                    event = "provider_validation_failed",
                    tag,
                    error = %err,
                    "skipping provider that failed startup validation",
                );
            }
        }
    }

    if validated.is_empty() {
        anyhow::bail!("no configured provider passed startup validation");
    }

    let runtimes: Vec<Arc<ProviderRuntime>> = validated.iter().map(|v| v.runtime.clone()).collect();

    let mut by_port: HashMap<u16, Vec<&Validated>> = HashMap::new();
    for entry in &validated {
        by_port.entry(entry.port).or_default().push(entry);
    }

    let mut transport_handles = Vec::new();
    for (port, entries) in &by_port {
        let table = build_route_table(entries, &data_dir, &details_dir, chain.clone(), store.clone());
        let table = Arc::new(table);

        let rps = requests_per_second(config.rate_limit, config.rate_limit_window);
        let transport = HttpTransport::new(HttpTransportConfig {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], *port)),
            rate_limit_rps: rps,
            rate_limit_burst: config.rate_limit.max(1),
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        });

        let table_for_serve = table.clone();
        let cancellation = cancellation.clone();
        transport_handles.push(tokio::spawn(async move {
            if let Err(err) = transport.serve(table_for_serve, cancellation).await {
                tracing::error!(target: "node", event = "transport_failed", error = %err);
            }
        }));
    }

    let watchers = Arc::new(WatcherSupervisor::new(chain.clone(), store.clone(), cancellation.clone()));
    let reconciler = Reconciler::new(ReconcilerConfig {
        chain: chain.clone(),
        indexer: indexer.clone(),
        store: store.clone(),
        runtimes: runtimes.clone(),
        block_window: config.block_process_range,
        check_interval: config.agreement_check_interval,
        watchers: watchers.clone(),
    })
    .await;
    let reconciler_handle = {
        let cancellation = cancellation.clone();
        tokio::spawn(async move { reconciler.run(cancellation).await })
    };

    let sweeper_handle = {
        let runtimes = Arc::new(runtimes.clone());
        let indexer = indexer.clone();
        let chain = chain.clone();
        let interval = config.agreement_balance_check_interval;
        let cancellation = cancellation.clone();
        tokio::spawn(async move {
            run_balance_sweeper(runtimes, indexer, chain, interval, cancellation).await;
        })
    };

    let (telemetry_shutdown_tx, telemetry_shutdown_rx) = watch::channel(false);
    let telemetry_addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let telemetry_handle = tokio::spawn(async move {
        if let Err(err) = providerd_telemetry::http::serve(telemetry_addr, telemetry_shutdown_rx).await {
            tracing::error!(target: "node", event = "telemetry_server_failed", error = %err);
        }
    });

    tracing::info!(
        target: "node",
        event = "daemon_ready",
        providers = validated.len(),
        ports = by_port.len(),
        "provider daemon ready",
    );

    cancellation.cancelled().await;
    let _ = telemetry_shutdown_tx.send(true);

    tracing::info!(target: "node", event = "shutdown_begin", "cancellation received; awaiting background tasks");

    let (_, _, _, _) = tokio::join!(
        watchers.registry().join_all(),
        join_all(transport_handles),
        reconciler_handle,
        sweeper_handle,
    );
    let _ = telemetry_handle.await;

    tracing::info!(target: "node", event = "shutdown_complete");
    Ok(())
}

async fn join_all(handles: Vec<tokio::task::JoinHandle<()>>) {
    for handle in handles {
        let _ = handle.await;
    }
}

async fn validate_provider(
    provider_config: &providerd_config::ProviderConfig,
    environment: &dyn Environment,
    chain: &dyn providerd_facades::ChainClient,
    store: &dyn providerd_store::Store,
) -> anyhow::Result<ProviderRuntime> {
    let owner_address =
        environment.derive_address(&provider_config.tag, &provider_config.provider_private_key)?;

    let backend = environment.backend_for(provider_config).await?;

    let runtime = build_runtime(
        &owner_address,
        provider_config.protocol_address.clone(),
        chain,
        store,
        backend,
    )
    .await?;

    Ok(runtime)
}

/// Builds one port's route table: operator routes registered once using the
/// port's primary entry (the gateway, if one shares the port; otherwise the
/// first validated tag), plus every sharing runtime's backend-declared
/// provider routes (§4.5's per-port sharing rules).
fn build_route_table(
    entries: &[&Validated],
    data_dir: &std::path::Path,
    details_dir: &std::path::Path,
    chain: Arc<dyn providerd_facades::ChainClient>,
    store: Arc<dyn providerd_store::Store>,
) -> RouteTable {
    let mut table = RouteTable::new();

    #[allow(clippy::expect_used)]
    let primary = entries
        .iter()
        .find(|e| e.is_gateway)
        .or_else(|| entries.first())
        .expect("build_route_table is never called with an empty entry list");

    let gateway = if primary.is_gateway {
        Some(GatewayContext {
            provider: primary.runtime.provider.clone(),
            protocol_address: primary.runtime.protocol_address.clone(),
            backend: primary.runtime.backend.clone(),
        })
    } else {
        None
    };

    let ctx = HandlerContext {
        chain: chain.clone(),
        store: store.clone(),
        spec_dir: data_dir.to_path_buf(),
        details_dir: details_dir.to_path_buf(),
        gateway,
    };
    register_operator_routes(&mut table, ctx);

    for entry in entries {
        register_service_routes(&table, entry.runtime.clone(), store.clone(), chain.clone());
    }

    table
}

fn requests_per_second(rate_limit: u32, window: Duration) -> u32 {
    let seconds = window.as_secs_f64().max(0.001);
    ((rate_limit as f64) / seconds).ceil().max(1.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_per_second_divides_by_window() {
        assert_eq!(requests_per_second(20, Duration::from_secs(1)), 20);
        assert_eq!(requests_per_second(100, Duration::from_secs(10)), 10);
        assert_eq!(requests_per_second(1, Duration::from_secs(60)), 1);
    }
}
