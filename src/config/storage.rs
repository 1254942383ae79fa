//! State storage configuration

use serde::Deserialize;
use std::path::PathBuf;

use super::error::ValidationError;

/// State storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one sub-directory per session
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.state_dir.as_os_str().is_empty() {
            return Err(ValidationError::EmptyStateDir);
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
        }
    }
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("./data/conversations")
}
