//! Pickup and delivery queue handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use laundry_core::workflow::{
    CreateQueueRequest, Locale, Order, Queue, QueueAssignment, QueueDetails, QueueFilter,
    QueueId, QueueStatus, QueueType,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Maximum allowed limit for queue listings
const MAX_LIMIT: i64 = 1000;

/// Default limit for queue listings
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for opening a pickup queue
#[derive(Debug, Deserialize)]
pub struct CreatePickupQueueBody {
    pub order_id: i64,
    pub time_slot_id: Option<i64>,
}

/// Request body for accepting a queue
#[derive(Debug, Deserialize)]
pub struct AcceptQueueBody {
    pub employee_id: i64,
}

/// Query parameters for listing queues
#[derive(Debug, Deserialize)]
pub struct ListQueuesParams {
    /// `pickup` or `delivery`
    #[serde(rename = "type")]
    pub queue_type: Option<String>,
    /// Status code or display label
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub id: QueueId,
    pub queue_type: QueueType,
    pub status: QueueStatus,
    pub status_label: &'static str,
    pub order_id: i64,
    pub time_slot_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl QueueResponse {
    pub fn new(queue: Queue, locale: Locale) -> Self {
        Self {
            id: queue.id,
            queue_type: queue.queue_type,
            status: queue.status,
            status_label: locale.label(queue.status),
            order_id: queue.order_id,
            time_slot_id: queue.time_slot_id,
            created_at: queue.created_at.to_rfc3339(),
            updated_at: queue.updated_at.to_rfc3339(),
        }
    }
}

/// A queue with the order it serves and who has taken it
#[derive(Debug, Serialize)]
pub struct QueueDetailsResponse {
    #[serde(flatten)]
    pub queue: QueueResponse,
    pub order: Order,
    pub assignment: Option<QueueAssignment>,
}

impl QueueDetailsResponse {
    fn new(details: QueueDetails, locale: Locale) -> Self {
        Self {
            queue: QueueResponse::new(details.queue, locale),
            order: details.order,
            assignment: details.assignment,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListQueuesResponse {
    pub queues: Vec<QueueDetailsResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct AcceptQueueResponse {
    pub queue: QueueResponse,
    pub assignment: QueueAssignment,
}

#[derive(Debug, Serialize)]
pub struct ConfirmPickupResponse {
    pub queue: QueueResponse,
    /// Delivery queue opened by this confirmation, if any
    pub delivery_queue: Option<QueueResponse>,
}

// ============================================================================
// Handlers
// ============================================================================

/// List queues of one type with their order context
pub async fn list_queues(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListQueuesParams>,
) -> ApiResult<Json<ListQueuesResponse>> {
    let locale = state.locale();

    let queue_type = match params.queue_type.as_deref() {
        Some(code) => QueueType::from_code(code)
            .ok_or_else(|| ApiError::bad_request(format!("Unknown queue type: {}", code)))?,
        None => return Err(ApiError::bad_request("Query parameter 'type' is required")),
    };

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = QueueFilter::new().with_type(queue_type);
    if let Some(ref input) = params.status {
        let status: QueueStatus = locale
            .try_parse(input)
            .ok_or_else(|| ApiError::bad_request(format!("Unknown queue status: {}", input)))?;
        filter = filter.with_status(status);
    }

    let total = state.workflow().count_queues(&filter)?;
    let queues = state
        .workflow()
        .list_queues(&filter.with_limit(limit).with_offset(offset))?;

    Ok(Json(ListQueuesResponse {
        queues: queues
            .into_iter()
            .map(|details| QueueDetailsResponse::new(details, locale))
            .collect(),
        total,
        limit,
        offset,
    }))
}

/// Get one queue with its order and assignment
pub async fn get_queue(
    State(state): State<Arc<AppState>>,
    Path(id): Path<QueueId>,
) -> ApiResult<Json<QueueDetailsResponse>> {
    match state.workflow().get_queue(id)? {
        Some(details) => Ok(Json(QueueDetailsResponse::new(details, state.locale()))),
        None => Err(ApiError::not_found("queue", id)),
    }
}

/// Open a pickup queue for an order
pub async fn create_pickup_queue(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreatePickupQueueBody>,
) -> ApiResult<(StatusCode, Json<QueueResponse>)> {
    let queue = state.workflow().create_queue(CreateQueueRequest {
        order_id: body.order_id,
        queue_type: QueueType::Pickup,
        time_slot_id: body.time_slot_id,
    })?;

    Ok((
        StatusCode::CREATED,
        Json(QueueResponse::new(queue, state.locale())),
    ))
}

/// An employee takes a waiting queue
pub async fn accept_queue(
    State(state): State<Arc<AppState>>,
    Path(id): Path<QueueId>,
    Json(body): Json<AcceptQueueBody>,
) -> ApiResult<Json<AcceptQueueResponse>> {
    let accepted = state.workflow().accept_queue(id, body.employee_id)?;

    Ok(Json(AcceptQueueResponse {
        queue: QueueResponse::new(accepted.queue, state.locale()),
        assignment: accepted.assignment,
    }))
}

/// Pickup leg done; may open the delivery queue
pub async fn confirm_pickup(
    State(state): State<Arc<AppState>>,
    Path(id): Path<QueueId>,
) -> ApiResult<Json<ConfirmPickupResponse>> {
    let locale = state.locale();
    let confirmed = state.workflow().confirm_pickup(id)?;

    Ok(Json(ConfirmPickupResponse {
        queue: QueueResponse::new(confirmed.queue, locale),
        delivery_queue: confirmed
            .delivery_queue
            .map(|queue| QueueResponse::new(queue, locale)),
    }))
}

/// Delivery leg done
pub async fn confirm_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<QueueId>,
) -> ApiResult<Json<QueueResponse>> {
    let queue = state.workflow().confirm_delivery(id)?;
    Ok(Json(QueueResponse::new(queue, state.locale())))
}
