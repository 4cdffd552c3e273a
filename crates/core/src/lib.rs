pub mod audit;
pub mod config;
pub mod metrics;
pub mod workflow;

pub use audit::{
    create_audit_system, AuditError, AuditEvent, AuditFilter, AuditHandle, AuditRecord,
    AuditStore, AuditWriter, SqliteAuditStore,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use workflow::{SqliteWorkflow, Workflow, WorkflowError};
