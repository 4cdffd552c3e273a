use axum::{
    extract::State,
    http::header,
    middleware,
    response::IntoResponse,
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{audit, handlers, machines, middleware::metrics_middleware, processes, queues};
use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Audit
        .route("/audit", get(audit::query_audit))
        // Queue lifecycle
        .route("/queues", get(queues::list_queues))
        .route("/queues/{id}", get(queues::get_queue))
        .route("/pickup-queue", post(queues::create_pickup_queue))
        .route("/queues/{id}/accept", patch(queues::accept_queue))
        .route("/queues/{id}/confirm-pickup", patch(queues::confirm_pickup))
        .route("/queues/{id}/confirm-delivery", patch(queues::confirm_delivery))
        // Laundry process
        .route("/laundry-process", post(processes::create_process))
        .route("/laundry-process/{id}", get(processes::get_process))
        .route("/laundry-process/{id}/status", patch(processes::update_status))
        .route(
            "/laundry-process/{id}/machines",
            get(processes::list_process_machines).post(processes::assign_machines),
        )
        .route(
            "/laundry-process/{id}/machines/{machine_id}",
            delete(processes::release_machine),
        )
        // Machine inventory
        .route("/machines", get(machines::list_machines))
        .layer(middleware::from_fn(metrics_middleware))
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state);
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
