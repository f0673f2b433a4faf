//! Configuration types for scenes

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Errors raised while loading or saving a [`SceneConfig`]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read or write config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Behaviour switches for a scene's hierarchy and propagation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Walk the ancestor chain on attach/reparent to reject cycles
    pub check_cycles: bool,
    /// Initial capacity of the propagation worklist
    pub traversal_capacity: usize,
    /// Run the invariant checker after every propagation pass
    pub validate_after_update: bool,
    /// Propagate at most once per frame
    pub skip_repeated_updates: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            check_cycles: true,
            traversal_capacity: 1024,
            validate_after_update: false,
            skip_repeated_updates: true,
        }
    }
}

impl SceneConfig {
    /// Parse a config from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        debug!(config = ?config, "Parsed SceneConfig");
        Ok(config)
    }

    /// Load a config from a JSON file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!(path = ?path, "Loading SceneConfig");
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Save the config as pretty-printed JSON
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        debug!(path = ?path, "Saved SceneConfig");
        Ok(())
    }

    /// Reject values the scene cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.traversal_capacity == 0 {
            return Err(ConfigError::Invalid(
                "traversal_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
