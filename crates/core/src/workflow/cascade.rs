//! Automatic creation of downstream queues.
//!
//! Each rule maps a transition event to one idempotent action: open a queue of
//! the rule's type for the order unless a non-terminal one already exists.
//! Rules run inside the transaction of the transition that fired them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::store::{NewQueue, WorkflowRepository};
use super::types::{OrderId, Queue, QueueType, TimeSlotId};
use super::WorkflowError;

/// Transition events that open a downstream queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeRule {
    /// A laundry process was created for the order.
    ProcessCreated,
    /// The order's pickup queue reached `done`.
    PickupDone,
    /// A laundry process for the order reached `completed`.
    ProcessCompleted,
}

impl CascadeRule {
    pub const ALL: [CascadeRule; 3] = [
        CascadeRule::ProcessCreated,
        CascadeRule::PickupDone,
        CascadeRule::ProcessCompleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CascadeRule::ProcessCreated => "process_created",
            CascadeRule::PickupDone => "pickup_done",
            CascadeRule::ProcessCompleted => "process_completed",
        }
    }

    /// Type of queue the rule opens.
    pub fn target(&self) -> QueueType {
        match self {
            CascadeRule::ProcessCreated => QueueType::Pickup,
            CascadeRule::PickupDone | CascadeRule::ProcessCompleted => QueueType::Delivery,
        }
    }

    /// Whether the new queue inherits the time slot of the triggering record.
    pub fn carries_time_slot(&self) -> bool {
        matches!(self, CascadeRule::PickupDone)
    }
}

/// What the triggering record knows about the order.
#[derive(Debug, Clone, Copy)]
pub struct CascadeSource {
    pub order_id: OrderId,
    pub time_slot_id: Option<TimeSlotId>,
}

impl CascadeSource {
    pub fn order(order_id: OrderId) -> Self {
        Self {
            order_id,
            time_slot_id: None,
        }
    }
}

/// Apply a rule. Returns the queue it opened, or `None` when the order already
/// has a non-terminal queue of the target type.
pub fn fire<R>(
    repo: &R,
    rule: CascadeRule,
    source: CascadeSource,
    now: DateTime<Utc>,
) -> Result<Option<Queue>, WorkflowError>
where
    R: WorkflowRepository + ?Sized,
{
    let queue_type = rule.target();

    if let Some(existing) = repo.find_open_queue(source.order_id, queue_type)? {
        debug!(
            rule = rule.as_str(),
            order_id = source.order_id,
            queue_id = existing.id,
            "Cascade skipped: {} queue already open",
            queue_type
        );
        return Ok(None);
    }

    let time_slot_id = if rule.carries_time_slot() {
        source.time_slot_id
    } else {
        None
    };

    let queue = repo.insert_queue(
        &NewQueue {
            order_id: source.order_id,
            queue_type,
            time_slot_id,
        },
        now,
    )?;

    info!(
        rule = rule.as_str(),
        order_id = source.order_id,
        queue_id = queue.id,
        "Cascade opened {} queue",
        queue_type
    );

    Ok(Some(queue))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_table() {
        assert_eq!(CascadeRule::ProcessCreated.target(), QueueType::Pickup);
        assert_eq!(CascadeRule::PickupDone.target(), QueueType::Delivery);
        assert_eq!(CascadeRule::ProcessCompleted.target(), QueueType::Delivery);
    }

    #[test]
    fn test_only_pickup_done_carries_time_slot() {
        let carrying: Vec<_> = CascadeRule::ALL
            .into_iter()
            .filter(|r| r.carries_time_slot())
            .collect();
        assert_eq!(carrying, vec![CascadeRule::PickupDone]);
    }
}
