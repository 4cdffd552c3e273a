//! Core workflow data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type OrderId = i64;
pub type CustomerId = i64;
pub type EmployeeId = i64;
pub type QueueId = i64;
pub type ProcessId = i64;
pub type MachineId = i64;
pub type TimeSlotId = i64;

// ============================================================================
// External collaborators (read-only to the engine)
// ============================================================================

/// An order as recorded by the intake side of the shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub address: String,
}

/// A staff member who can be assigned to queues and processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
}

// ============================================================================
// Queues
// ============================================================================

/// Logistics leg a queue represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueType {
    Pickup,
    Delivery,
}

impl QueueType {
    pub const ALL: [QueueType; 2] = [QueueType::Pickup, QueueType::Delivery];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueType::Pickup => "pickup",
            QueueType::Delivery => "delivery",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(code.trim()))
    }

    /// Status a queue of this type moves to when an employee accepts it.
    pub fn in_progress_status(&self) -> QueueStatus {
        match self {
            QueueType::Pickup => QueueStatus::PickupInProgress,
            QueueType::Delivery => QueueStatus::DeliveryInProgress,
        }
    }

    /// Terminal status for a queue of this type.
    pub fn terminal_status(&self) -> QueueStatus {
        match self {
            QueueType::Pickup => QueueStatus::Done,
            QueueType::Delivery => QueueStatus::Delivered,
        }
    }
}

impl std::fmt::Display for QueueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Queue lifecycle status.
///
/// `waiting -> {pickup_in_progress | delivery_in_progress} -> {done | delivered}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Waiting,
    PickupInProgress,
    DeliveryInProgress,
    Done,
    Delivered,
}

impl QueueStatus {
    pub const ALL: [QueueStatus; 5] = [
        QueueStatus::Waiting,
        QueueStatus::PickupInProgress,
        QueueStatus::DeliveryInProgress,
        QueueStatus::Done,
        QueueStatus::Delivered,
    ];

    /// Statuses that still count as "in flight" for the one-open-queue rule.
    pub const OPEN: [QueueStatus; 3] = [
        QueueStatus::Waiting,
        QueueStatus::PickupInProgress,
        QueueStatus::DeliveryInProgress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Waiting => "waiting",
            QueueStatus::PickupInProgress => "pickup_in_progress",
            QueueStatus::DeliveryInProgress => "delivery_in_progress",
            QueueStatus::Done => "done",
            QueueStatus::Delivered => "delivered",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(code.trim()))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueStatus::Done | QueueStatus::Delivered)
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logistics leg (collect from or deliver to the customer) of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Queue {
    pub id: QueueId,
    pub queue_type: QueueType,
    pub status: QueueStatus,
    pub order_id: OrderId,
    pub time_slot_id: Option<TimeSlotId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Record of an employee accepting a queue. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueAssignment {
    pub id: i64,
    pub queue_id: QueueId,
    pub employee_id: EmployeeId,
    pub assigned_at: DateTime<Utc>,
}

/// A queue together with the order it serves and who accepted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueDetails {
    pub queue: Queue,
    pub order: Order,
    pub assignment: Option<QueueAssignment>,
}

/// Request to open a queue for an order.
#[derive(Debug, Clone)]
pub struct CreateQueueRequest {
    pub order_id: OrderId,
    pub queue_type: QueueType,
    pub time_slot_id: Option<TimeSlotId>,
}

/// Filter for listing queues.
#[derive(Debug, Clone)]
pub struct QueueFilter {
    pub queue_type: Option<QueueType>,
    pub status: Option<QueueStatus>,
    pub order_id: Option<OrderId>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for QueueFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueFilter {
    pub fn new() -> Self {
        Self {
            queue_type: None,
            status: None,
            order_id: None,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_type(mut self, queue_type: QueueType) -> Self {
        self.queue_type = Some(queue_type);
        self
    }

    pub fn with_status(mut self, status: QueueStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

// ============================================================================
// Laundry processes
// ============================================================================

/// Wash/dry lifecycle of an order, in strict forward order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Pending,
    Received,
    Washing,
    Drying,
    Completed,
}

impl ProcessStatus {
    pub const ALL: [ProcessStatus; 5] = [
        ProcessStatus::Pending,
        ProcessStatus::Received,
        ProcessStatus::Washing,
        ProcessStatus::Drying,
        ProcessStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Pending => "pending",
            ProcessStatus::Received => "received",
            ProcessStatus::Washing => "washing",
            ProcessStatus::Drying => "drying",
            ProcessStatus::Completed => "completed",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(code.trim()))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessStatus::Completed)
    }

    /// Machine type that must be linked before entering this status, if any.
    pub fn required_machine(&self) -> Option<MachineType> {
        match self {
            ProcessStatus::Washing => Some(MachineType::Washing),
            ProcessStatus::Drying => Some(MachineType::Drying),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The processing stage of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaundryProcess {
    pub id: ProcessId,
    pub order_id: OrderId,
    pub employee_id: EmployeeId,
    pub status: ProcessStatus,
    pub description: String,
    pub status_note: Option<String>,
    pub started_at: DateTime<Utc>,
    /// Set exactly once, on completion.
    pub ended_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// A process together with its currently linked machines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessDetails {
    pub process: LaundryProcess,
    pub machines: Vec<Machine>,
}

/// Request to start processing an order.
#[derive(Debug, Clone)]
pub struct CreateProcessRequest {
    pub order_id: OrderId,
    pub employee_id: EmployeeId,
    pub description: String,
}

// ============================================================================
// Machines
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineType {
    Washing,
    Drying,
}

impl MachineType {
    pub const ALL: [MachineType; 2] = [MachineType::Washing, MachineType::Drying];

    pub fn as_str(&self) -> &'static str {
        match self {
            MachineType::Washing => "washing",
            MachineType::Drying => "drying",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(code.trim()))
    }
}

impl std::fmt::Display for MachineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineStatus {
    Available,
    InUse,
}

impl MachineStatus {
    pub const ALL: [MachineStatus; 2] = [MachineStatus::Available, MachineStatus::InUse];

    pub fn as_str(&self) -> &'static str {
        match self {
            MachineStatus::Available => "available",
            MachineStatus::InUse => "in_use",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(code.trim()))
    }
}

impl std::fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A physical washer or dryer. Pre-existing inventory; never created by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub id: MachineId,
    pub machine_type: MachineType,
    pub status: MachineStatus,
}

/// Filter for listing machines.
#[derive(Debug, Clone, Default)]
pub struct MachineFilter {
    pub status: Option<MachineStatus>,
    pub machine_type: Option<MachineType>,
}

impl MachineFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: MachineStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_type(mut self, machine_type: MachineType) -> Self {
        self.machine_type = Some(machine_type);
        self
    }
}

// ============================================================================
// Operation outcomes
// ============================================================================

/// Result of an employee accepting a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueAccepted {
    pub queue: Queue,
    pub assignment: QueueAssignment,
}

/// Result of confirming a pickup; carries the delivery queue opened by the cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PickupConfirmed {
    pub queue: Queue,
    pub delivery_queue: Option<Queue>,
}

/// Result of creating a process; carries the pickup queue opened by the cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessCreated {
    pub process: LaundryProcess,
    pub pickup_queue: Option<Queue>,
}

/// Result of a process status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessAdvanced {
    pub process: LaundryProcess,
    pub previous_status: ProcessStatus,
    /// Machines freed by the completion transition (empty otherwise).
    pub released_machines: Vec<Machine>,
    pub delivery_queue: Option<Queue>,
}

/// Result of replacing a process's machine set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MachinesAssigned {
    pub process_id: ProcessId,
    pub order_id: OrderId,
    pub machines: Vec<Machine>,
    pub added: Vec<MachineId>,
    pub removed: Vec<MachineId>,
}

/// Result of releasing one machine from a process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MachineReleased {
    pub process_id: ProcessId,
    pub order_id: OrderId,
    pub machine: Machine,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_type_status_pairs() {
        assert_eq!(
            QueueType::Pickup.in_progress_status(),
            QueueStatus::PickupInProgress
        );
        assert_eq!(
            QueueType::Delivery.in_progress_status(),
            QueueStatus::DeliveryInProgress
        );
        assert_eq!(QueueType::Pickup.terminal_status(), QueueStatus::Done);
        assert_eq!(QueueType::Delivery.terminal_status(), QueueStatus::Delivered);
    }

    #[test]
    fn test_open_statuses_are_not_terminal() {
        for status in QueueStatus::OPEN {
            assert!(!status.is_terminal());
        }
        assert!(QueueStatus::Done.is_terminal());
        assert!(QueueStatus::Delivered.is_terminal());
    }

    #[test]
    fn test_codes_parse_back() {
        for status in QueueStatus::ALL {
            assert_eq!(QueueStatus::from_code(status.as_str()), Some(status));
        }
        for status in ProcessStatus::ALL {
            assert_eq!(ProcessStatus::from_code(status.as_str()), Some(status));
        }
        assert_eq!(QueueType::from_code(" Pickup "), Some(QueueType::Pickup));
        assert_eq!(MachineType::from_code("dryer"), None);
        assert_eq!(MachineStatus::from_code("in_use"), Some(MachineStatus::InUse));
    }

    #[test]
    fn test_serde_uses_codes() {
        let json = serde_json::to_string(&QueueStatus::PickupInProgress).unwrap();
        assert_eq!(json, "\"pickup_in_progress\"");
        let status: ProcessStatus = serde_json::from_str("\"drying\"").unwrap();
        assert_eq!(status, ProcessStatus::Drying);
    }

    #[test]
    fn test_required_machine() {
        assert_eq!(
            ProcessStatus::Washing.required_machine(),
            Some(MachineType::Washing)
        );
        assert_eq!(
            ProcessStatus::Drying.required_machine(),
            Some(MachineType::Drying)
        );
        assert_eq!(ProcessStatus::Completed.required_machine(), None);
    }
}
