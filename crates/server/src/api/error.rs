//! Mapping of engine errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use laundry_core::WorkflowError;
use serde::Serialize;

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: &'static str,
}

/// An error on its way out of a handler.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse {
                error: message.into(),
                kind: "validation",
            },
        }
    }

    pub fn not_found(entity: &'static str, id: i64) -> Self {
        WorkflowError::not_found(entity, id).into()
    }

    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(error = %message, "Request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorResponse {
                error: message,
                kind: "database",
            },
        }
    }
}

pub fn status_for(error: &WorkflowError) -> StatusCode {
    match error {
        WorkflowError::NotFound { .. } => StatusCode::NOT_FOUND,
        WorkflowError::InvalidTransition { .. } => StatusCode::CONFLICT,
        WorkflowError::Conflict(_) => StatusCode::CONFLICT,
        WorkflowError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
        WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
        WorkflowError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<WorkflowError> for ApiError {
    fn from(error: WorkflowError) -> Self {
        if let WorkflowError::Database(ref message) = error {
            return ApiError::internal(message.clone());
        }
        Self {
            status: status_for(&error),
            body: ErrorResponse {
                error: error.to_string(),
                kind: error.kind(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
