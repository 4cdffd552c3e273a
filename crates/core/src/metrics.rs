//! Prometheus metrics for the workflow engine.
//!
//! Counters are bumped after the owning transaction commits, so a rolled back
//! operation never shows up here. Machine conflicts are the exception: they
//! count rejected requests.

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, Opts};

// =============================================================================
// Queue lifecycle
// =============================================================================

/// Queue status transitions by queue type and target status.
pub static QUEUE_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "laundry_queue_transitions_total",
            "Total queue status transitions",
        ),
        &["queue_type", "to"],
    )
    .unwrap()
});

// =============================================================================
// Process state machine
// =============================================================================

/// Process status transitions by target status.
pub static PROCESS_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "laundry_process_transitions_total",
            "Total laundry process status transitions",
        ),
        &["to"], // "received", "washing", "drying", "completed"
    )
    .unwrap()
});

// =============================================================================
// Cascade
// =============================================================================

/// Queues opened automatically, by rule.
pub static CASCADE_QUEUES_CREATED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "laundry_cascade_queues_created_total",
            "Total queues opened by cascade rules",
        ),
        &["rule"], // "process_created", "pickup_done", "process_completed"
    )
    .unwrap()
});

// =============================================================================
// Machines
// =============================================================================

/// Assignment requests rejected because a machine was held by another process.
pub static MACHINE_CONFLICTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "laundry_machine_conflicts_total",
        "Total machine assignments rejected because the machine was in use",
    )
    .unwrap()
});

/// Machines returned to the available pool.
pub static MACHINES_RELEASED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "laundry_machines_released_total",
        "Total machines released back to available",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(QUEUE_TRANSITIONS.clone()),
        Box::new(PROCESS_TRANSITIONS.clone()),
        Box::new(CASCADE_QUEUES_CREATED.clone()),
        Box::new(MACHINE_CONFLICTS.clone()),
        Box::new(MACHINES_RELEASED.clone()),
    ]
}
