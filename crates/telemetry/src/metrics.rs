//! Prometheus metrics registered once at startup and updated throughout the
//! daemon's request and reconciliation loops.

use once_cell::sync::OnceCell;
use prometheus::{HistogramVec, IntCounterVec, IntGauge, Registry};

static REGISTRY: OnceCell<Registry> = OnceCell::new();
static REQUEST_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static REQUEST_LATENCY: OnceCell<HistogramVec> = OnceCell::new();
static RECONCILER_EVENTS_APPLIED: OnceCell<IntCounterVec> = OnceCell::new();
static RECONCILER_CURSOR: OnceCell<IntGauge> = OnceCell::new();

macro_rules! get_metric {
    ($cell:expr) => {{
        #[allow(clippy::expect_used)]
        {
            $cell.get().expect("install_metrics was not called")
        }
    }};
}

/// Registers every metric this crate owns. Call once at startup, before any
/// handler or loop records a sample.
///
/// Panics only on a malformed static metric descriptor, i.e. a programming
/// error caught the first time this runs in any environment, not a runtime
/// condition.
#[allow(clippy::expect_used)]
pub fn install_metrics() -> Registry {
    let registry = Registry::new();

    let request_total = IntCounterVec::new(
        prometheus::Opts::new("providerd_requests_total", "Total router requests handled"),
        &["method", "path", "status"],
    )
    .expect("static metric descriptor");
    let request_latency = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "providerd_request_duration_seconds",
            "Router request handling latency",
        ),
        &["method", "path"],
    )
    .expect("static metric descriptor");
    let events_applied = IntCounterVec::new(
        prometheus::Opts::new(
            "providerd_reconciler_events_applied_total",
            "Chain events applied by the reconciler",
        ),
        &["kind"],
    )
    .expect("static metric descriptor");
    let cursor = IntGauge::new(
        "providerd_reconciler_cursor_block",
        "Last block number the reconciler has fully applied",
    )
    .expect("static metric descriptor");

    registry
        .register(Box::new(request_total.clone()))
        .expect("register request_total");
    registry
        .register(Box::new(request_latency.clone()))
        .expect("register request_latency");
    registry
        .register(Box::new(events_applied.clone()))
        .expect("register events_applied");
    registry
        .register(Box::new(cursor.clone()))
        .expect("register cursor");

    let _ = REQUEST_TOTAL.set(request_total);
    let _ = REQUEST_LATENCY.set(request_latency);
    let _ = RECONCILER_EVENTS_APPLIED.set(events_applied);
    let _ = RECONCILER_CURSOR.set(cursor);
    let _ = REGISTRY.set(registry.clone());
    registry
}

/// Records one handled router request.
pub fn record_request(method: &str, path: &str, status: u16) {
    get_metric!(REQUEST_TOTAL)
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
}

/// Starts a latency timer for a request; the returned guard records on drop.
pub fn request_timer(method: &str, path: &str) -> prometheus::HistogramTimer {
    get_metric!(REQUEST_LATENCY)
        .with_label_values(&[method, path])
        .start_timer()
}

/// Records one event applied by the reconciler.
pub fn record_event_applied(kind: &str) {
    get_metric!(RECONCILER_EVENTS_APPLIED)
        .with_label_values(&[kind])
        .inc();
}

/// Updates the reconciler's last-applied-block gauge.
pub fn set_cursor(block: u64) {
    get_metric!(RECONCILER_CURSOR).set(block as i64);
}

/// Renders all registered metrics in Prometheus text exposition format.
#[allow(clippy::expect_used)]
pub fn render() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let families = REGISTRY
        .get()
        .map(|r| r.gather())
        .unwrap_or_default();
    let mut buf = Vec::new();
    encoder.encode(&families, &mut buf).expect("encoding prometheus metrics");
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_then_record_does_not_panic() {
        install_metrics();
        record_request("GET", "/resources", 200);
        record_event_applied("AgreementCreated");
        set_cursor(42);
        let rendered = render();
        assert!(rendered.contains("providerd_requests_total"));
    }
}
