//! Entry point: parses configuration, initializes logging, and runs the
//! supervisor until a termination signal or a fatal startup error.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use providerd_config::Cli;
use providerd_node::{signals, supervisor, DevEnvironment, Environment};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match providerd_config::load_with_overlay(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("fatal: failed to load configuration: {err}");
            std::process::exit(signals::EXIT_TERMINATED);
        }
    };

    if let Err(err) = providerd_telemetry::init_tracing(&config.log_level) {
        eprintln!("fatal: failed to initialize logging: {err}");
        std::process::exit(signals::EXIT_TERMINATED);
    }

    tracing::info!(
        target: "node",
        event = "startup",
        node_env = %config.node_env,
        providers = config.providers.len(),
        "starting provider daemon",
    );

    let environment: Arc<dyn Environment> = Arc::new(DevEnvironment::new());
    let cancellation = CancellationToken::new();
    signals::spawn_signal_watcher(cancellation.clone());

    let data_dir = PathBuf::from(&cli.data_dir);
    match supervisor::run(config, data_dir, environment, cancellation).await {
        Ok(()) => std::process::exit(signals::EXIT_TERMINATED),
        Err(err) => {
            tracing::error!(target: "node", event = "fatal_startup_error", error = %err);
            std::process::exit(signals::EXIT_TERMINATED);
        }
    }
}
