// ABOUTME: The `provider` section of kbox.yml.
// ABOUTME: Binary location, VM name and the retry bounds for the lifecycle steps.

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    /// Provider binary; the platform default when unset.
    pub executable: Option<PathBuf>,
    pub vm_name: String,
    pub up_attempts: u32,
    pub down_attempts: u32,
    pub ip_repairs: u32,
    /// `--disksize` passed on first init, in MB.
    pub disk_size: Option<u64>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            executable: None,
            vm_name: "Kalabox2".to_string(),
            up_attempts: 3,
            down_attempts: 3,
            ip_repairs: 1,
            disk_size: None,
        }
    }
}

impl ProviderConfig {
    pub(super) fn validate(&self) -> Result<(), String> {
        if self.vm_name.trim().is_empty() {
            return Err("provider.vm_name cannot be empty".to_string());
        }
        if self.up_attempts == 0 {
            return Err("provider.up_attempts must be at least 1".to_string());
        }
        if self.down_attempts == 0 {
            return Err("provider.down_attempts must be at least 1".to_string());
        }
        if self.disk_size == Some(0) {
            return Err("provider.disk_size must be positive".to_string());
        }
        Ok(())
    }
}
