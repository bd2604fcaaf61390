//! Global structured-logging initialization.

use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Maps the daemon's `LOG_LEVEL` vocabulary (`error`/`warning`/`info`/`debug`)
/// onto the `tracing`/`EnvFilter` directive it corresponds to. Unrecognized
/// values fall back to `info` rather than failing startup over a typo.
fn directive_for(log_level: &str) -> &'static str {
    match log_level {
        "error" => "error",
        "warning" => "warn",
        "info" => "info",
        "debug" => "debug",
        _ => "info",
    }
}

/// Initializes the global `tracing` subscriber: JSON output on stderr, UTC
/// RFC3339 timestamps, and a filter defaulting to `default_level` (the
/// configured `LOG_LEVEL`) unless `RUST_LOG` is set, in which case it wins —
/// the same override precedence the teacher's binaries give `RUST_LOG`. Also
/// bridges the `log` crate so dependencies using it are captured.
pub fn init_tracing(default_level: &str) -> Result<(), anyhow::Error> {
    let fmt_layer = fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339());
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directive_for(default_level)));
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing_log::LogTracer::init()?;
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
