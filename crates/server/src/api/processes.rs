//! Laundry process and machine assignment handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use laundry_core::workflow::{
    CreateProcessRequest, LaundryProcess, Locale, Machine, MachineId, MachineReleased,
    MachinesAssigned, ProcessId, ProcessStatus,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ApiResult};
use super::queues::QueueResponse;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for starting a process
#[derive(Debug, Deserialize)]
pub struct CreateProcessBody {
    pub order_id: i64,
    pub employee_id: i64,
    #[serde(default)]
    pub description: String,
}

/// Request body for a status change
#[derive(Debug, Deserialize)]
pub struct UpdateStatusBody {
    /// Status code or display label in the configured locale
    pub status: String,
    pub status_note: Option<String>,
}

/// Request body for replacing the machine set
#[derive(Debug, Deserialize)]
pub struct AssignMachinesBody {
    pub machine_ids: Vec<MachineId>,
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub id: ProcessId,
    pub order_id: i64,
    pub employee_id: i64,
    pub status: ProcessStatus,
    pub status_label: &'static str,
    pub description: String,
    pub status_note: Option<String>,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub updated_at: String,
}

impl ProcessResponse {
    fn new(process: LaundryProcess, locale: Locale) -> Self {
        Self {
            id: process.id,
            order_id: process.order_id,
            employee_id: process.employee_id,
            status: process.status,
            status_label: locale.label(process.status),
            description: process.description,
            status_note: process.status_note,
            started_at: process.started_at.to_rfc3339(),
            ended_at: process.ended_at.map(|t| t.to_rfc3339()),
            updated_at: process.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProcessDetailsResponse {
    #[serde(flatten)]
    pub process: ProcessResponse,
    pub machines: Vec<Machine>,
}

#[derive(Debug, Serialize)]
pub struct CreateProcessResponse {
    pub process: ProcessResponse,
    /// Pickup queue opened for the order, if none was in flight
    pub pickup_queue: Option<QueueResponse>,
}

#[derive(Debug, Serialize)]
pub struct UpdateStatusResponse {
    pub process: ProcessResponse,
    pub previous_status: ProcessStatus,
    pub released_machines: Vec<Machine>,
    /// Delivery queue opened on completion, if any
    pub delivery_queue: Option<QueueResponse>,
}

#[derive(Debug, Serialize)]
pub struct ProcessMachinesResponse {
    pub process_id: ProcessId,
    pub machines: Vec<Machine>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Start processing an order
pub async fn create_process(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateProcessBody>,
) -> ApiResult<(StatusCode, Json<CreateProcessResponse>)> {
    let locale = state.locale();
    let created = state.workflow().create_process(CreateProcessRequest {
        order_id: body.order_id,
        employee_id: body.employee_id,
        description: body.description,
    })?;

    Ok((
        StatusCode::CREATED,
        Json(CreateProcessResponse {
            process: ProcessResponse::new(created.process, locale),
            pickup_queue: created
                .pickup_queue
                .map(|queue| QueueResponse::new(queue, locale)),
        }),
    ))
}

/// Get a process with its machines
pub async fn get_process(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ProcessId>,
) -> ApiResult<Json<ProcessDetailsResponse>> {
    match state.workflow().get_process(id)? {
        Some(details) => Ok(Json(ProcessDetailsResponse {
            process: ProcessResponse::new(details.process, state.locale()),
            machines: details.machines,
        })),
        None => Err(ApiError::not_found("process", id)),
    }
}

/// Advance the process state machine
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ProcessId>,
    Json(body): Json<UpdateStatusBody>,
) -> ApiResult<Json<UpdateStatusResponse>> {
    let locale = state.locale();
    let target: ProcessStatus = locale.parse(&body.status);
    let advanced = state
        .workflow()
        .advance_process(id, target, body.status_note)?;

    Ok(Json(UpdateStatusResponse {
        process: ProcessResponse::new(advanced.process, locale),
        previous_status: advanced.previous_status,
        released_machines: advanced.released_machines,
        delivery_queue: advanced
            .delivery_queue
            .map(|queue| QueueResponse::new(queue, locale)),
    }))
}

/// Replace the process's machine set
pub async fn assign_machines(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ProcessId>,
    Json(body): Json<AssignMachinesBody>,
) -> ApiResult<Json<MachinesAssigned>> {
    let assigned = state.workflow().assign_machines(id, &body.machine_ids)?;
    Ok(Json(assigned))
}

/// Machines currently held by a process
pub async fn list_process_machines(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ProcessId>,
) -> ApiResult<Json<ProcessMachinesResponse>> {
    let machines = state.workflow().process_machines(id)?;
    Ok(Json(ProcessMachinesResponse {
        process_id: id,
        machines,
    }))
}

/// Free one machine from a process
pub async fn release_machine(
    State(state): State<Arc<AppState>>,
    Path((id, machine_id)): Path<(ProcessId, MachineId)>,
) -> ApiResult<Json<MachineReleased>> {
    let released = state.workflow().release_machine(id, machine_id)?;
    Ok(Json(released))
}
