use std::sync::Arc;

use laundry_core::workflow::Locale;
use laundry_core::{AuditStore, Config, SanitizedConfig, Workflow};

/// Shared application state
pub struct AppState {
    config: Config,
    workflow: Arc<dyn Workflow>,
    audit_store: Arc<dyn AuditStore>,
}

impl AppState {
    pub fn new(
        config: Config,
        workflow: Arc<dyn Workflow>,
        audit_store: Arc<dyn AuditStore>,
    ) -> Self {
        Self {
            config,
            workflow,
            audit_store,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn workflow(&self) -> &dyn Workflow {
        self.workflow.as_ref()
    }

    pub fn audit_store(&self) -> &dyn AuditStore {
        self.audit_store.as_ref()
    }

    /// Locale used for status labels in requests and responses.
    pub fn locale(&self) -> Locale {
        self.config.workflow.locale
    }
}
