//! Order fulfillment workflow engine.
//!
//! Queues move orders between the customer and the shop, laundry processes
//! track the wash/dry stages, machines are allocated to processes, and cascade
//! rules open the next queue when a stage finishes.

pub mod allocator;
pub mod cascade;
mod error;
mod locale;
pub mod process;
pub mod queue;
mod sqlite;
mod store;
mod types;

pub use allocator::AllocationPlan;
pub use cascade::{CascadeRule, CascadeSource};
pub use error::WorkflowError;
pub use locale::{Locale, StatusLabel};
pub use process::{ProcessPolicy, MAX_TEXT_LEN};
pub use sqlite::SqliteWorkflow;
pub use store::{
    Directory, MachineRepository, NewProcess, NewQueue, ProcessRepository, QueueRepository,
    Workflow, WorkflowRepository,
};
pub use types::*;

/// Reject ids that cannot name a stored row.
pub(crate) fn validate_id(field: &str, id: i64) -> Result<(), WorkflowError> {
    if id <= 0 {
        return Err(WorkflowError::Validation(format!(
            "{} must be a positive integer, got {}",
            field, id
        )));
    }
    Ok(())
}
