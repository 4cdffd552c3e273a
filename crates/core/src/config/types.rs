use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::workflow::{Locale, MachineId, MachineType, ProcessPolicy};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub inventory: InventoryConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("laundry.db")
}

/// Audit log configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuditConfig {
    /// Capacity of the channel between the engine and the audit writer.
    #[serde(default = "default_audit_buffer")]
    pub buffer_size: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_audit_buffer(),
        }
    }
}

fn default_audit_buffer() -> usize {
    1000
}

/// Workflow rules and presentation
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// Locale of status labels at the HTTP boundary.
    #[serde(default)]
    pub locale: Locale,
    /// Only allow `completed` after `drying`.
    #[serde(default)]
    pub require_drying: bool,
}

impl WorkflowConfig {
    pub fn policy(&self) -> ProcessPolicy {
        ProcessPolicy {
            require_drying: self.require_drying,
        }
    }
}

/// Machines registered at startup when missing.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InventoryConfig {
    #[serde(default)]
    pub machines: Vec<MachineSeed>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MachineSeed {
    pub id: MachineId,
    #[serde(rename = "type")]
    pub machine_type: MachineType,
}

/// Config view for API responses
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub audit: AuditConfig,
    pub workflow: WorkflowConfig,
    /// Number of machines seeded from the inventory section.
    pub inventory_machines: usize,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            audit: config.audit.clone(),
            workflow: config.workflow.clone(),
            inventory_machines: config.inventory.machines.len(),
        }
    }
}
