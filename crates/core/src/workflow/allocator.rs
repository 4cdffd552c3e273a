//! Machine allocation.
//!
//! A machine is `in_use` exactly while it is linked to an active process, and
//! it is linked to at most one process at a time. Reassignment is computed as a
//! diff against the current set and applied inside the caller's transaction;
//! any failure leaves links and statuses untouched once the transaction is
//! rolled back.

use std::collections::BTreeSet;

use tracing::{info, warn};

use super::store::WorkflowRepository;
use super::types::{
    LaundryProcess, Machine, MachineId, MachineReleased, MachineStatus, MachinesAssigned,
    ProcessId,
};
use super::{validate_id, WorkflowError};
use crate::metrics;

/// Additions and removals needed to turn one machine set into another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationPlan {
    pub to_add: Vec<MachineId>,
    pub to_remove: Vec<MachineId>,
}

impl AllocationPlan {
    pub fn between(current: &BTreeSet<MachineId>, requested: &BTreeSet<MachineId>) -> Self {
        Self {
            to_add: requested.difference(current).copied().collect(),
            to_remove: current.difference(requested).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Replace the machine set of a process (full replace semantics).
pub fn assign<R>(
    repo: &R,
    process_id: ProcessId,
    machine_ids: &[MachineId],
) -> Result<MachinesAssigned, WorkflowError>
where
    R: WorkflowRepository + ?Sized,
{
    let requested = requested_set(machine_ids)?;
    let process = load_active(repo, process_id)?;

    let current: BTreeSet<MachineId> = repo
        .machines_for_process(process.id)?
        .into_iter()
        .map(|m| m.id)
        .collect();
    let plan = AllocationPlan::between(&current, &requested);

    // Validate every addition before touching anything.
    for &machine_id in &plan.to_add {
        let machine = repo
            .find_machine(machine_id)?
            .ok_or_else(|| WorkflowError::not_found("machine", machine_id))?;
        if machine.status == MachineStatus::InUse {
            return Err(claimed_elsewhere(repo, process.id, machine_id)?);
        }
    }

    for &machine_id in &plan.to_remove {
        free(repo, process.id, machine_id)?;
    }

    for &machine_id in &plan.to_add {
        // Re-checked at write time: another writer may have claimed it since.
        if !repo.set_machine_status(machine_id, MachineStatus::Available, MachineStatus::InUse)? {
            return Err(claimed_elsewhere(repo, process.id, machine_id)?);
        }
        repo.link_machine(process.id, machine_id)?;
    }

    if !plan.is_empty() {
        info!(
            process_id = process.id,
            added = ?plan.to_add,
            removed = ?plan.to_remove,
            "Reassigned machines"
        );
    }

    Ok(MachinesAssigned {
        process_id: process.id,
        order_id: process.order_id,
        machines: repo.machines_for_process(process.id)?,
        added: plan.to_add,
        removed: plan.to_remove,
    })
}

/// Unlink one machine from a process and mark it available.
pub fn release<R>(
    repo: &R,
    process_id: ProcessId,
    machine_id: MachineId,
) -> Result<MachineReleased, WorkflowError>
where
    R: WorkflowRepository + ?Sized,
{
    validate_id("process_id", process_id)?;
    validate_id("machine_id", machine_id)?;

    let process = repo
        .find_process(process_id)?
        .ok_or_else(|| WorkflowError::not_found("process", process_id))?;
    repo.find_machine(machine_id)?
        .ok_or_else(|| WorkflowError::not_found("machine", machine_id))?;

    if !repo.unlink_machine(process.id, machine_id)? {
        return Err(WorkflowError::PreconditionFailed(format!(
            "machine {} is not assigned to process {}",
            machine_id, process.id
        )));
    }
    repo.set_machine_status(machine_id, MachineStatus::InUse, MachineStatus::Available)?;

    info!(process_id = process.id, machine_id, "Released machine");

    let machine = repo
        .find_machine(machine_id)?
        .ok_or_else(|| WorkflowError::not_found("machine", machine_id))?;

    Ok(MachineReleased {
        process_id: process.id,
        order_id: process.order_id,
        machine,
    })
}

/// Unlink and free every machine of a process. Returns the freed machines.
pub fn release_all<R>(repo: &R, process_id: ProcessId) -> Result<Vec<Machine>, WorkflowError>
where
    R: WorkflowRepository + ?Sized,
{
    let linked = repo.machines_for_process(process_id)?;
    let mut released = Vec::with_capacity(linked.len());

    for machine in linked {
        free(repo, process_id, machine.id)?;
        released.push(Machine {
            status: MachineStatus::Available,
            ..machine
        });
    }

    Ok(released)
}

fn free<R>(repo: &R, process_id: ProcessId, machine_id: MachineId) -> Result<(), WorkflowError>
where
    R: WorkflowRepository + ?Sized,
{
    repo.unlink_machine(process_id, machine_id)?;
    repo.set_machine_status(machine_id, MachineStatus::InUse, MachineStatus::Available)?;
    Ok(())
}

fn requested_set(machine_ids: &[MachineId]) -> Result<BTreeSet<MachineId>, WorkflowError> {
    let mut set = BTreeSet::new();
    for &id in machine_ids {
        validate_id("machine_id", id)?;
        if !set.insert(id) {
            return Err(WorkflowError::Validation(format!(
                "machine {} listed more than once",
                id
            )));
        }
    }
    Ok(set)
}

fn load_active<R>(repo: &R, process_id: ProcessId) -> Result<LaundryProcess, WorkflowError>
where
    R: WorkflowRepository + ?Sized,
{
    validate_id("process_id", process_id)?;
    let process = repo
        .find_process(process_id)?
        .ok_or_else(|| WorkflowError::not_found("process", process_id))?;

    if process.status.is_terminal() {
        return Err(WorkflowError::PreconditionFailed(format!(
            "process {} is {}; machines can no longer be assigned",
            process.id, process.status
        )));
    }

    Ok(process)
}

fn claimed_elsewhere<R>(
    repo: &R,
    process_id: ProcessId,
    machine_id: MachineId,
) -> Result<WorkflowError, WorkflowError>
where
    R: WorkflowRepository + ?Sized,
{
    metrics::MACHINE_CONFLICTS.inc();
    let holder = repo.machine_holder(machine_id)?;
    warn!(process_id, machine_id, holder = ?holder, "Machine already in use");

    Ok(WorkflowError::Conflict(match holder {
        Some(other) => format!("machine {} is in use by process {}", machine_id, other),
        None => format!("machine {} is in use", machine_id),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[MachineId]) -> BTreeSet<MachineId> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_plan_symmetric_difference() {
        let plan = AllocationPlan::between(&set(&[1, 2, 3]), &set(&[2, 3, 4, 5]));
        assert_eq!(plan.to_add, vec![4, 5]);
        assert_eq!(plan.to_remove, vec![1]);
    }

    #[test]
    fn test_plan_same_set_is_empty() {
        let plan = AllocationPlan::between(&set(&[1, 2]), &set(&[2, 1]));
        assert!(plan.is_empty());
    }

    #[test]
    fn test_plan_clear_all() {
        let plan = AllocationPlan::between(&set(&[7, 8]), &set(&[]));
        assert!(plan.to_add.is_empty());
        assert_eq!(plan.to_remove, vec![7, 8]);
    }

    #[test]
    fn test_requested_set_rejects_duplicates() {
        assert!(matches!(
            requested_set(&[1, 2, 1]),
            Err(WorkflowError::Validation(_))
        ));
    }

    #[test]
    fn test_requested_set_rejects_non_positive_ids() {
        assert!(matches!(
            requested_set(&[1, 0]),
            Err(WorkflowError::Validation(_))
        ));
    }
}
