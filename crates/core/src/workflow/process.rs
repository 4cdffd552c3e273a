//! Laundry process state machine.
//!
//! `pending -> received -> washing -> drying -> completed`, with `completed`
//! also reachable straight from `washing` unless the policy requires drying.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::allocator;
use super::cascade::{self, CascadeRule, CascadeSource};
use super::store::{NewProcess, WorkflowRepository};
use super::types::{
    CreateProcessRequest, LaundryProcess, ProcessAdvanced, ProcessCreated, ProcessId,
    ProcessStatus,
};
use super::{validate_id, WorkflowError};

/// Maximum length of process description and status note.
pub const MAX_TEXT_LEN: usize = 2000;

/// Shop-level rules for the process state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessPolicy {
    /// When set, `completed` can only be reached from `drying`.
    #[serde(default)]
    pub require_drying: bool,
}

impl ProcessPolicy {
    /// Whether `from -> to` is a legal single step.
    pub fn permits(&self, from: ProcessStatus, to: ProcessStatus) -> bool {
        use super::types::ProcessStatus::*;

        match (from, to) {
            (Pending, Received) | (Received, Washing) | (Washing, Drying) => true,
            (Drying, Completed) => true,
            (Washing, Completed) => !self.require_drying,
            _ => false,
        }
    }

    /// Statuses reachable from `from` in one step.
    pub fn next_statuses(&self, from: ProcessStatus) -> Vec<ProcessStatus> {
        ProcessStatus::ALL
            .into_iter()
            .filter(|to| self.permits(from, *to))
            .collect()
    }
}

pub fn create<R>(
    repo: &R,
    request: &CreateProcessRequest,
    now: DateTime<Utc>,
) -> Result<ProcessCreated, WorkflowError>
where
    R: WorkflowRepository + ?Sized,
{
    validate_id("order_id", request.order_id)?;
    validate_id("employee_id", request.employee_id)?;
    validate_text("description", &request.description)?;

    repo.find_order(request.order_id)?
        .ok_or_else(|| WorkflowError::not_found("order", request.order_id))?;
    repo.find_employee(request.employee_id)?
        .ok_or_else(|| WorkflowError::not_found("employee", request.employee_id))?;

    let process = repo.insert_process(
        &NewProcess {
            order_id: request.order_id,
            employee_id: request.employee_id,
            description: request.description.clone(),
        },
        now,
    )?;

    info!(
        process_id = process.id,
        order_id = process.order_id,
        employee_id = process.employee_id,
        "Created laundry process"
    );

    let pickup_queue = cascade::fire(
        repo,
        CascadeRule::ProcessCreated,
        CascadeSource::order(process.order_id),
        now,
    )?;

    Ok(ProcessCreated {
        process,
        pickup_queue,
    })
}

pub fn advance<R>(
    repo: &R,
    policy: &ProcessPolicy,
    process_id: ProcessId,
    target: ProcessStatus,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> Result<ProcessAdvanced, WorkflowError>
where
    R: WorkflowRepository + ?Sized,
{
    validate_id("process_id", process_id)?;
    if let Some(note) = note {
        validate_text("status_note", note)?;
    }

    let process = repo
        .find_process(process_id)?
        .ok_or_else(|| WorkflowError::not_found("process", process_id))?;
    let from = process.status;

    if !policy.permits(from, target) {
        warn!(
            process_id,
            from = from.as_str(),
            to = target.as_str(),
            "Rejected process transition"
        );
        return Err(WorkflowError::invalid_transition(
            "process", process_id, from, target,
        ));
    }

    if let Some(required) = target.required_machine() {
        let linked = repo.machines_for_process(process_id)?;
        if !linked.iter().any(|m| m.machine_type == required) {
            warn!(process_id, to = target.as_str(), "No {} machine assigned", required);
            return Err(WorkflowError::PreconditionFailed(format!(
                "process {} needs a {} machine assigned before {}",
                process_id, required, target
            )));
        }
    }

    let ended_at = (target == ProcessStatus::Completed).then_some(now);
    if !repo.transition_process(process_id, from, target, note, ended_at, now)? {
        warn!(process_id, "Process changed concurrently");
        return Err(WorkflowError::invalid_transition(
            "process", process_id, from, target,
        ));
    }

    let (released_machines, delivery_queue) = if target == ProcessStatus::Completed {
        let released = allocator::release_all(repo, process_id)?;
        let delivery = cascade::fire(
            repo,
            CascadeRule::ProcessCompleted,
            CascadeSource::order(process.order_id),
            now,
        )?;
        (released, delivery)
    } else {
        (Vec::new(), None)
    };

    info!(
        process_id,
        order_id = process.order_id,
        from = from.as_str(),
        to = target.as_str(),
        "Process transitioned"
    );

    let process = LaundryProcess {
        status: target,
        status_note: note.map(str::to_string).or(process.status_note),
        ended_at: ended_at.or(process.ended_at),
        updated_at: now,
        ..process
    };

    Ok(ProcessAdvanced {
        process,
        previous_status: from,
        released_machines,
        delivery_queue,
    })
}

fn validate_text(field: &str, value: &str) -> Result<(), WorkflowError> {
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(WorkflowError::Validation(format!(
            "{} exceeds {} characters",
            field, MAX_TEXT_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::ProcessStatus::*;

    #[test]
    fn test_forward_chain_is_permitted() {
        let policy = ProcessPolicy::default();
        assert!(policy.permits(Pending, Received));
        assert!(policy.permits(Received, Washing));
        assert!(policy.permits(Washing, Drying));
        assert!(policy.permits(Drying, Completed));
    }

    #[test]
    fn test_drying_is_optional_by_default() {
        let policy = ProcessPolicy::default();
        assert!(policy.permits(Washing, Completed));
        assert_eq!(policy.next_statuses(Washing), vec![Drying, Completed]);
    }

    #[test]
    fn test_require_drying_blocks_shortcut() {
        let policy = ProcessPolicy {
            require_drying: true,
        };
        assert!(!policy.permits(Washing, Completed));
        assert_eq!(policy.next_statuses(Washing), vec![Drying]);
    }

    #[test]
    fn test_skips_repeats_and_backwards_are_rejected() {
        let policy = ProcessPolicy::default();
        for status in ProcessStatus::ALL {
            assert!(!policy.permits(status, status), "repeat {:?}", status);
        }
        assert!(!policy.permits(Pending, Washing));
        assert!(!policy.permits(Received, Drying));
        assert!(!policy.permits(Received, Completed));
        assert!(!policy.permits(Drying, Washing));
        assert!(!policy.permits(Completed, Pending));
        assert!(policy.next_statuses(Completed).is_empty());
    }

    #[test]
    fn test_nothing_leads_back_to_pending() {
        let policy = ProcessPolicy::default();
        for status in ProcessStatus::ALL {
            assert!(!policy.permits(status, Pending));
        }
    }

    #[test]
    fn test_validate_text_length() {
        assert!(validate_text("note", "ok").is_ok());
        let long = "x".repeat(MAX_TEXT_LEN + 1);
        assert!(matches!(
            validate_text("note", &long),
            Err(WorkflowError::Validation(_))
        ));
    }
}
