use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflow::{
    CascadeRule, EmployeeId, MachineId, OrderId, ProcessId, ProcessStatus, QueueId, QueueStatus,
    QueueType, TimeSlotId,
};

/// Audit event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    // System events
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Queue lifecycle
    QueueCreated {
        queue_id: QueueId,
        order_id: OrderId,
        queue_type: QueueType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_slot_id: Option<TimeSlotId>,
        /// Set when the queue was opened automatically by a cascade rule.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cascade: Option<CascadeRule>,
    },
    QueueAccepted {
        queue_id: QueueId,
        order_id: OrderId,
        employee_id: EmployeeId,
        status: QueueStatus,
    },
    QueueStatusChanged {
        queue_id: QueueId,
        order_id: OrderId,
        from_status: QueueStatus,
        to_status: QueueStatus,
    },

    // Process lifecycle
    ProcessCreated {
        process_id: ProcessId,
        order_id: OrderId,
        employee_id: EmployeeId,
        description: String,
    },
    ProcessStatusChanged {
        process_id: ProcessId,
        order_id: OrderId,
        from_status: ProcessStatus,
        to_status: ProcessStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },

    // Machine allocation
    MachinesAssigned {
        process_id: ProcessId,
        order_id: OrderId,
        added: Vec<MachineId>,
        removed: Vec<MachineId>,
    },
    MachineReleased {
        process_id: ProcessId,
        order_id: OrderId,
        machine_id: MachineId,
    },
}

impl AuditEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ServiceStarted { .. } => "service_started",
            Self::ServiceStopped { .. } => "service_stopped",
            Self::QueueCreated { .. } => "queue_created",
            Self::QueueAccepted { .. } => "queue_accepted",
            Self::QueueStatusChanged { .. } => "queue_status_changed",
            Self::ProcessCreated { .. } => "process_created",
            Self::ProcessStatusChanged { .. } => "process_status_changed",
            Self::MachinesAssigned { .. } => "machines_assigned",
            Self::MachineReleased { .. } => "machine_released",
        }
    }

    pub fn order_id(&self) -> Option<OrderId> {
        match self {
            Self::ServiceStarted { .. } | Self::ServiceStopped { .. } => None,
            Self::QueueCreated { order_id, .. }
            | Self::QueueAccepted { order_id, .. }
            | Self::QueueStatusChanged { order_id, .. }
            | Self::ProcessCreated { order_id, .. }
            | Self::ProcessStatusChanged { order_id, .. }
            | Self::MachinesAssigned { order_id, .. }
            | Self::MachineReleased { order_id, .. } => Some(*order_id),
        }
    }

    /// Employee who acted, when the event records one.
    pub fn employee_id(&self) -> Option<EmployeeId> {
        match self {
            Self::QueueAccepted { employee_id, .. } | Self::ProcessCreated { employee_id, .. } => {
                Some(*employee_id)
            }
            _ => None,
        }
    }
}

/// Stored audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub order_id: Option<OrderId>,
    pub employee_id: Option<EmployeeId>,
    pub data: AuditEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_service_started() {
        let event = AuditEvent::ServiceStarted {
            version: "0.1.0".to_string(),
            config_hash: "abc123".to_string(),
        };
        assert_eq!(event.event_type(), "service_started");
        assert_eq!(event.order_id(), None);
        assert_eq!(event.employee_id(), None);
    }

    #[test]
    fn test_event_type_queue_accepted() {
        let event = AuditEvent::QueueAccepted {
            queue_id: 1,
            order_id: 10,
            employee_id: 5,
            status: QueueStatus::PickupInProgress,
        };
        assert_eq!(event.event_type(), "queue_accepted");
        assert_eq!(event.order_id(), Some(10));
        assert_eq!(event.employee_id(), Some(5));
    }

    #[test]
    fn test_event_type_process_status_changed() {
        let event = AuditEvent::ProcessStatusChanged {
            process_id: 3,
            order_id: 10,
            from_status: ProcessStatus::Washing,
            to_status: ProcessStatus::Drying,
            note: None,
        };
        assert_eq!(event.event_type(), "process_status_changed");
        assert_eq!(event.order_id(), Some(10));
        assert_eq!(event.employee_id(), None);
    }

    #[test]
    fn test_serialization_is_tagged() {
        let event = AuditEvent::QueueCreated {
            queue_id: 2,
            order_id: 10,
            queue_type: QueueType::Delivery,
            time_slot_id: Some(4),
            cascade: Some(CascadeRule::PickupDone),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "queue_created");
        assert_eq!(json["queue_type"], "delivery");
        assert_eq!(json["cascade"], "pickup_done");

        let back: AuditEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let event = AuditEvent::QueueCreated {
            queue_id: 2,
            order_id: 10,
            queue_type: QueueType::Pickup,
            time_slot_id: None,
            cascade: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("cascade").is_none());
        assert!(json.get("time_slot_id").is_none());
    }
}
