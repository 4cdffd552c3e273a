//! Storage seams for the workflow engine.
//!
//! One repository trait per entity. The engine components are generic over
//! [`WorkflowRepository`], and a backend hands them a view bound to a single
//! open transaction so every operation commits or rolls back as a whole.

use chrono::{DateTime, Utc};

use super::types::{
    CreateProcessRequest, CreateQueueRequest, Employee, EmployeeId, LaundryProcess, Machine,
    MachineFilter, MachineId, MachineReleased, MachineStatus, MachinesAssigned, Order, OrderId,
    PickupConfirmed, ProcessAdvanced, ProcessCreated, ProcessDetails, ProcessId, ProcessStatus,
    Queue, QueueAccepted, QueueAssignment, QueueDetails, QueueFilter, QueueId, QueueStatus,
    QueueType, TimeSlotId,
};
use super::WorkflowError;

/// Row to insert into the queues table.
#[derive(Debug, Clone)]
pub struct NewQueue {
    pub order_id: OrderId,
    pub queue_type: QueueType,
    pub time_slot_id: Option<TimeSlotId>,
}

/// Row to insert into the laundry processes table.
#[derive(Debug, Clone)]
pub struct NewProcess {
    pub order_id: OrderId,
    pub employee_id: EmployeeId,
    pub description: String,
}

/// Lookups into data owned by other parts of the shop system.
pub trait Directory {
    fn find_order(&self, id: OrderId) -> Result<Option<Order>, WorkflowError>;

    fn find_employee(&self, id: EmployeeId) -> Result<Option<Employee>, WorkflowError>;
}

pub trait QueueRepository {
    fn insert_queue(&self, queue: &NewQueue, now: DateTime<Utc>) -> Result<Queue, WorkflowError>;

    fn find_queue(&self, id: QueueId) -> Result<Option<Queue>, WorkflowError>;

    /// The non-terminal queue of the given type for an order, if one exists.
    fn find_open_queue(
        &self,
        order_id: OrderId,
        queue_type: QueueType,
    ) -> Result<Option<Queue>, WorkflowError>;

    /// Move a queue from `from` to `to`. Returns false (and changes nothing)
    /// when the stored status is no longer `from`.
    fn transition_queue(
        &self,
        id: QueueId,
        from: QueueStatus,
        to: QueueStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, WorkflowError>;

    fn insert_assignment(
        &self,
        queue_id: QueueId,
        employee_id: EmployeeId,
        now: DateTime<Utc>,
    ) -> Result<QueueAssignment, WorkflowError>;

    fn find_assignment(&self, queue_id: QueueId) -> Result<Option<QueueAssignment>, WorkflowError>;

    fn list_queues(&self, filter: &QueueFilter) -> Result<Vec<Queue>, WorkflowError>;

    fn count_queues(&self, filter: &QueueFilter) -> Result<i64, WorkflowError>;
}

pub trait ProcessRepository {
    fn insert_process(
        &self,
        process: &NewProcess,
        now: DateTime<Utc>,
    ) -> Result<LaundryProcess, WorkflowError>;

    fn find_process(&self, id: ProcessId) -> Result<Option<LaundryProcess>, WorkflowError>;

    /// Move a process from `from` to `to`, storing the note (when given) and the
    /// end time (when given). Returns false when the stored status is no longer `from`.
    fn transition_process(
        &self,
        id: ProcessId,
        from: ProcessStatus,
        to: ProcessStatus,
        note: Option<&str>,
        ended_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool, WorkflowError>;
}

pub trait MachineRepository {
    fn find_machine(&self, id: MachineId) -> Result<Option<Machine>, WorkflowError>;

    fn list_machines(&self, filter: &MachineFilter) -> Result<Vec<Machine>, WorkflowError>;

    /// Machines currently linked to a process, ordered by id.
    fn machines_for_process(&self, process_id: ProcessId) -> Result<Vec<Machine>, WorkflowError>;

    /// The process currently holding a machine, if any.
    fn machine_holder(&self, machine_id: MachineId) -> Result<Option<ProcessId>, WorkflowError>;

    fn link_machine(&self, process_id: ProcessId, machine_id: MachineId)
        -> Result<(), WorkflowError>;

    /// Returns false when the link did not exist.
    fn unlink_machine(
        &self,
        process_id: ProcessId,
        machine_id: MachineId,
    ) -> Result<bool, WorkflowError>;

    /// Set a machine's status only if it is currently `from`.
    fn set_machine_status(
        &self,
        machine_id: MachineId,
        from: MachineStatus,
        to: MachineStatus,
    ) -> Result<bool, WorkflowError>;
}

/// Everything the engine components need, bound to one transaction.
pub trait WorkflowRepository:
    Directory + QueueRepository + ProcessRepository + MachineRepository
{
}

impl<T> WorkflowRepository for T where
    T: Directory + QueueRepository + ProcessRepository + MachineRepository
{
}

/// The order fulfillment engine as seen by its callers.
pub trait Workflow: Send + Sync {
    // Queue lifecycle

    /// Open a queue in `waiting` for an order.
    fn create_queue(&self, request: CreateQueueRequest) -> Result<Queue, WorkflowError>;

    /// Employee takes a waiting queue; records a [`QueueAssignment`].
    fn accept_queue(
        &self,
        queue_id: QueueId,
        employee_id: EmployeeId,
    ) -> Result<QueueAccepted, WorkflowError>;

    /// Pickup leg finished; opens the delivery queue if none is in flight.
    fn confirm_pickup(&self, queue_id: QueueId) -> Result<PickupConfirmed, WorkflowError>;

    /// Delivery leg finished. Terminal.
    fn confirm_delivery(&self, queue_id: QueueId) -> Result<Queue, WorkflowError>;

    fn get_queue(&self, queue_id: QueueId) -> Result<Option<QueueDetails>, WorkflowError>;

    fn list_queues(&self, filter: &QueueFilter) -> Result<Vec<QueueDetails>, WorkflowError>;

    fn count_queues(&self, filter: &QueueFilter) -> Result<i64, WorkflowError>;

    // Process state machine

    /// Start processing an order; opens the pickup queue if none is in flight.
    fn create_process(&self, request: CreateProcessRequest)
        -> Result<ProcessCreated, WorkflowError>;

    fn advance_process(
        &self,
        process_id: ProcessId,
        target: ProcessStatus,
        note: Option<String>,
    ) -> Result<ProcessAdvanced, WorkflowError>;

    fn get_process(&self, process_id: ProcessId) -> Result<Option<ProcessDetails>, WorkflowError>;

    // Machine allocation

    /// Replace the process's machine set with `machine_ids`.
    fn assign_machines(
        &self,
        process_id: ProcessId,
        machine_ids: &[MachineId],
    ) -> Result<MachinesAssigned, WorkflowError>;

    fn release_machine(
        &self,
        process_id: ProcessId,
        machine_id: MachineId,
    ) -> Result<MachineReleased, WorkflowError>;

    fn process_machines(&self, process_id: ProcessId) -> Result<Vec<Machine>, WorkflowError>;

    fn list_machines(&self, filter: &MachineFilter) -> Result<Vec<Machine>, WorkflowError>;
}
