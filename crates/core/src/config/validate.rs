use std::collections::HashSet;

use super::{types::Config, ConfigError};

/// Validate configuration
///
/// Rejects a zero port, a zero audit buffer, and inventory machines with
/// non-positive or repeated ids.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.audit.buffer_size == 0 {
        return Err(ConfigError::ValidationError(
            "audit.buffer_size cannot be 0".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for machine in &config.inventory.machines {
        if machine.id <= 0 {
            return Err(ConfigError::ValidationError(format!(
                "inventory machine id must be positive, got {}",
                machine.id
            )));
        }
        if !seen.insert(machine.id) {
            return Err(ConfigError::ValidationError(format!(
                "inventory machine {} is listed more than once",
                machine.id
            )));
        }
    }

    Ok(())
}
