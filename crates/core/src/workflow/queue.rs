//! Pickup and delivery queue lifecycle.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::cascade::{self, CascadeRule, CascadeSource};
use super::store::{NewQueue, WorkflowRepository};
use super::types::{
    CreateQueueRequest, EmployeeId, PickupConfirmed, Queue, QueueAccepted, QueueDetails, QueueId,
    QueueStatus,
};
use super::{validate_id, WorkflowError};

pub fn create<R>(
    repo: &R,
    request: &CreateQueueRequest,
    now: DateTime<Utc>,
) -> Result<Queue, WorkflowError>
where
    R: WorkflowRepository + ?Sized,
{
    validate_id("order_id", request.order_id)?;
    if let Some(slot) = request.time_slot_id {
        validate_id("time_slot_id", slot)?;
    }

    repo.find_order(request.order_id)?
        .ok_or_else(|| WorkflowError::not_found("order", request.order_id))?;

    if let Some(existing) = repo.find_open_queue(request.order_id, request.queue_type)? {
        return Err(WorkflowError::Conflict(format!(
            "order {} already has an open {} queue ({})",
            request.order_id, request.queue_type, existing.id
        )));
    }

    let queue = repo.insert_queue(
        &NewQueue {
            order_id: request.order_id,
            queue_type: request.queue_type,
            time_slot_id: request.time_slot_id,
        },
        now,
    )?;

    info!(
        queue_id = queue.id,
        order_id = queue.order_id,
        "Created {} queue",
        queue.queue_type
    );

    Ok(queue)
}

pub fn accept<R>(
    repo: &R,
    queue_id: QueueId,
    employee_id: EmployeeId,
    now: DateTime<Utc>,
) -> Result<QueueAccepted, WorkflowError>
where
    R: WorkflowRepository + ?Sized,
{
    validate_id("employee_id", employee_id)?;

    let queue = load(repo, queue_id)?;
    repo.find_employee(employee_id)?
        .ok_or_else(|| WorkflowError::not_found("employee", employee_id))?;

    let target = queue.queue_type.in_progress_status();
    let queue = transition(repo, &queue, QueueStatus::Waiting, target, now)?;
    let assignment = repo.insert_assignment(queue.id, employee_id, now)?;

    Ok(QueueAccepted { queue, assignment })
}

pub fn confirm_pickup<R>(
    repo: &R,
    queue_id: QueueId,
    now: DateTime<Utc>,
) -> Result<PickupConfirmed, WorkflowError>
where
    R: WorkflowRepository + ?Sized,
{
    let queue = load(repo, queue_id)?;
    let queue = transition(
        repo,
        &queue,
        QueueStatus::PickupInProgress,
        QueueStatus::Done,
        now,
    )?;

    let delivery_queue = cascade::fire(
        repo,
        CascadeRule::PickupDone,
        CascadeSource {
            order_id: queue.order_id,
            time_slot_id: queue.time_slot_id,
        },
        now,
    )?;

    Ok(PickupConfirmed {
        queue,
        delivery_queue,
    })
}

pub fn confirm_delivery<R>(
    repo: &R,
    queue_id: QueueId,
    now: DateTime<Utc>,
) -> Result<Queue, WorkflowError>
where
    R: WorkflowRepository + ?Sized,
{
    let queue = load(repo, queue_id)?;
    transition(
        repo,
        &queue,
        QueueStatus::DeliveryInProgress,
        QueueStatus::Delivered,
        now,
    )
}

/// Attach order context and the recorded assignment to a queue.
pub fn details<R>(repo: &R, queue: Queue) -> Result<QueueDetails, WorkflowError>
where
    R: WorkflowRepository + ?Sized,
{
    let order = repo
        .find_order(queue.order_id)?
        .ok_or_else(|| WorkflowError::not_found("order", queue.order_id))?;
    let assignment = repo.find_assignment(queue.id)?;

    Ok(QueueDetails {
        queue,
        order,
        assignment,
    })
}

fn load<R>(repo: &R, queue_id: QueueId) -> Result<Queue, WorkflowError>
where
    R: WorkflowRepository + ?Sized,
{
    validate_id("queue_id", queue_id)?;
    repo.find_queue(queue_id)?
        .ok_or_else(|| WorkflowError::not_found("queue", queue_id))
}

/// Guarded status change: the queue must be in `expected` both when read and
/// when written, so a duplicate or racing request is rejected.
fn transition<R>(
    repo: &R,
    queue: &Queue,
    expected: QueueStatus,
    target: QueueStatus,
    now: DateTime<Utc>,
) -> Result<Queue, WorkflowError>
where
    R: WorkflowRepository + ?Sized,
{
    if queue.status != expected {
        warn!(
            queue_id = queue.id,
            from = queue.status.as_str(),
            to = target.as_str(),
            "Rejected queue transition"
        );
        return Err(WorkflowError::invalid_transition(
            "queue",
            queue.id,
            queue.status,
            target,
        ));
    }

    if !repo.transition_queue(queue.id, expected, target, now)? {
        warn!(queue_id = queue.id, "Queue changed concurrently");
        return Err(WorkflowError::invalid_transition(
            "queue",
            queue.id,
            queue.status,
            target,
        ));
    }

    info!(
        queue_id = queue.id,
        order_id = queue.order_id,
        from = expected.as_str(),
        to = target.as_str(),
        "Queue transitioned"
    );

    Ok(Queue {
        status: target,
        updated_at: now,
        ..queue.clone()
    })
}
