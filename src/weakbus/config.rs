use std::fs;
use std::path::Path;
use log::debug;
use serde::{Serialize, Deserialize};
use crate::error::{BusError, ErrorCode};

/// What `publish` does when a subscriber handler fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Stop at the first failing handler and return its error
    #[default]
    FailFast,
    /// Log the failure and keep delivering to the remaining subscribers
    Isolate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub name: String,
    pub error_policy: ErrorPolicy,
    /// Remove a topic once pruning has left it without subscribers
    pub drop_empty_topics: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            name: "weakbus".to_string(),
            error_policy: ErrorPolicy::FailFast,
            drop_empty_topics: true,
        }
    }
}

impl BusConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, BusError> {
        toml::from_str(content)
            .map_err(|e| BusError::new(ErrorCode::ConfigInvalid, format!("Failed to parse TOML: {}", e)))
    }

    /// Load configuration from a TOML file
    ///
    /// Read failures surface as `BusError::Io`, parse failures as `ConfigInvalid`.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, BusError> {
        let content = fs::read_to_string(path)?;

        Self::from_toml_str(&content)
    }

    /// Load configuration from a TOML file, falling back to defaults if the file does not exist
    pub fn from_toml_file_or_default<P: AsRef<Path>>(path: P) -> Result<Self, BusError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::from_toml_file(path)
    }

    /// Save configuration to a TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), BusError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| BusError::new(ErrorCode::ConfigInvalid, format!("Failed to serialize to TOML: {}", e)))?;

        fs::write(path, content)?;
        Ok(())
    }
}
