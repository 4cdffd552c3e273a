use thiserror::Error;

/// Error type for workflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// An order, employee, queue, process or machine identifier did not resolve.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// The requested status change is not permitted from the current state.
    #[error("Cannot move {entity} {id} from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        id: i64,
        from: String,
        to: String,
    },

    /// A required resource (e.g. a machine of the needed type) is missing.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// A resource is already claimed by another operation.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Malformed input.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl WorkflowError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        WorkflowError::NotFound { entity, id }
    }

    pub fn invalid_transition(
        entity: &'static str,
        id: i64,
        from: impl std::fmt::Display,
        to: impl std::fmt::Display,
    ) -> Self {
        WorkflowError::InvalidTransition {
            entity,
            id,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Stable snake_case name of the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::NotFound { .. } => "not_found",
            WorkflowError::InvalidTransition { .. } => "invalid_transition",
            WorkflowError::PreconditionFailed(_) => "precondition_failed",
            WorkflowError::Conflict(_) => "conflict",
            WorkflowError::Validation(_) => "validation_error",
            WorkflowError::Database(_) => "database_error",
        }
    }
}

impl From<rusqlite::Error> for WorkflowError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            // Only the open-queue and machine-link indexes are unique beyond primary keys.
            rusqlite::Error::SqliteFailure(ref err, ref msg)
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                WorkflowError::Conflict(
                    msg.clone()
                        .unwrap_or_else(|| "unique constraint violated".to_string()),
                )
            }
            other => WorkflowError::Database(other.to_string()),
        }
    }
}
