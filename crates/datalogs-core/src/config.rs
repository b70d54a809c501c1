//! Logger configuration.

use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

use crate::error::{DatalogsError, Result};
use crate::storage;

/// Default `strftime` format of timestamped directory names, e.g. `23-07-28-1312`.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%y-%m-%d-%H%M";

/// Configuration for a root [`Logger`](crate::Logger) and its descendants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Directory of the root logger (created if missing)
    pub root_directory: PathBuf,
    /// `strftime` format prefixed to timestamped sub-logger directories
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
}

fn default_timestamp_format() -> String {
    DEFAULT_TIMESTAMP_FORMAT.to_string()
}

impl LoggerConfig {
    pub fn new(root_directory: impl Into<PathBuf>) -> Self {
        Self {
            root_directory: root_directory.into(),
            timestamp_format: default_timestamp_format(),
        }
    }

    pub fn with_timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = format.into();
        self
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let config: Self = storage::load_yaml(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_yaml_file(&self, path: &Path) -> Result<()> {
        storage::save_yaml(path, self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.root_directory.as_os_str().is_empty() {
            return Err(DatalogsError::Configuration(
                "root directory cannot be empty".to_string(),
            ));
        }
        if self.timestamp_format.is_empty()
            || StrftimeItems::new(&self.timestamp_format).any(|item| matches!(item, Item::Error))
        {
            return Err(DatalogsError::Configuration(format!(
                "invalid timestamp format '{}'",
                self.timestamp_format
            )));
        }
        if self.timestamp_format.contains(['/', '\\']) {
            return Err(DatalogsError::Configuration(format!(
                "timestamp format '{}' cannot contain path separators",
                self.timestamp_format
            )));
        }
        Ok(())
    }
}
