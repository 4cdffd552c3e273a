use axum::{
    extract::{Query, State},
    Json,
};
use laundry_core::workflow::{Machine, MachineFilter, MachineStatus, MachineType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListMachinesParams {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub machine_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListMachinesResponse {
    pub machines: Vec<Machine>,
}

/// Machine inventory, optionally filtered by status and type
pub async fn list_machines(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListMachinesParams>,
) -> ApiResult<Json<ListMachinesResponse>> {
    let mut filter = MachineFilter::new();

    if let Some(ref code) = params.status {
        let status = MachineStatus::from_code(code)
            .ok_or_else(|| ApiError::bad_request(format!("Unknown machine status: {}", code)))?;
        filter = filter.with_status(status);
    }

    if let Some(ref code) = params.machine_type {
        let machine_type = MachineType::from_code(code)
            .ok_or_else(|| ApiError::bad_request(format!("Unknown machine type: {}", code)))?;
        filter = filter.with_type(machine_type);
    }

    let machines = state.workflow().list_machines(&filter)?;
    Ok(Json(ListMachinesResponse { machines }))
}
