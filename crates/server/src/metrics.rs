//! Prometheus metrics for observability.
//!
//! Server-side metrics cover HTTP traffic plus inventory gauges that are
//! refreshed from the engine on every scrape. Workflow counters live in
//! `laundry_core::metrics` and are registered here too.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

use laundry_core::workflow::{MachineFilter, MachineStatus, QueueFilter, QueueStatus, QueueType};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

static NUMERIC_SEGMENT: Lazy<regex_lite::Regex> =
    Lazy::new(|| regex_lite::Regex::new(r"/\d+(/|$)").unwrap());

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "laundry_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("laundry_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "laundry_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Inventory Metrics (collected on scrape)
// =============================================================================

/// Machines by current status.
pub static MACHINES_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("laundry_machines_by_status", "Current machine count by status"),
        &["status"],
    )
    .unwrap()
});

/// Queues by type and current status.
pub static QUEUES_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("laundry_queues_by_status", "Current queue count by type and status"),
        &["queue_type", "status"],
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Inventory
    registry
        .register(Box::new(MACHINES_BY_STATUS.clone()))
        .unwrap();
    registry
        .register(Box::new(QUEUES_BY_STATUS.clone()))
        .unwrap();

    // Workflow counters
    for metric in laundry_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Refresh inventory gauges from the engine.
///
/// Called before encoding so the scrape reflects the database right now.
/// Read failures leave the previous values in place.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let workflow = state.workflow();

    if let Ok(machines) = workflow.list_machines(&MachineFilter::new()) {
        for status in MachineStatus::ALL {
            let count = machines.iter().filter(|m| m.status == status).count();
            MACHINES_BY_STATUS
                .with_label_values(&[status.as_str()])
                .set(count as i64);
        }
    }

    for queue_type in QueueType::ALL {
        for status in QueueStatus::ALL {
            let filter = QueueFilter::new().with_type(queue_type).with_status(status);
            if let Ok(count) = workflow.count_queues(&filter) {
                QUEUES_BY_STATUS
                    .with_label_values(&[queue_type.as_str(), status.as_str()])
                    .set(count);
            }
        }
    }
}

/// Normalize a path for metric labels (replace numeric ids with `{id}`).
pub fn normalize_path(path: &str) -> String {
    // Applied twice since adjacent ids share a slash
    let once = NUMERIC_SEGMENT.replace_all(path, "/{id}$1");
    NUMERIC_SEGMENT.replace_all(&once, "/{id}$1").into_owned()
}
