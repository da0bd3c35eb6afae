//! Indexer configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cursor::DEFAULT_MAX_PENDING_LEAVES;

/// Default seconds between scheduled scans.
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 60;

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML for this schema.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Configuration for the catalog indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Bound on dispatched-but-unconfirmed leaves; discovery pauses at this
    /// many.
    pub max_pending_leaves: usize,
    /// Seconds between scheduled scans. 0 disables the timer so an embedder
    /// (or a test) drives scans itself.
    pub scan_interval_secs: u64,
    /// Where the cursor snapshot lives. Absent means the embedder picks the
    /// store.
    pub state_path: Option<PathBuf>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            max_pending_leaves: DEFAULT_MAX_PENDING_LEAVES,
            scan_interval_secs: DEFAULT_SCAN_INTERVAL_SECS,
            state_path: None,
        }
    }
}

impl IndexerConfig {
    /// Parse a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// `ConfigError::Parse` when the text is not valid for this schema.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration file.
    ///
    /// # Errors
    ///
    /// `ConfigError::Io` when the file cannot be read, `ConfigError::Parse`
    /// when it does not parse.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// The scan interval as a duration, `None` when the timer is disabled.
    #[must_use]
    pub fn scan_interval(&self) -> Option<Duration> {
        if self.scan_interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.scan_interval_secs))
        }
    }
}
