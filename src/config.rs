//! Config loading and defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{QueueError, Result};

/// Top-level configuration for an event queue instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub limits: QueueLimits,
    pub logging: LoggingConfig,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            limits: QueueLimits::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl QueueConfig {
    /// Load a TOML config file, falling back to defaults if it does not
    /// exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(QueueError::ConfigIo)?;
        Ok(toml::from_str(&raw)?)
    }
}

/// Queue safety limits.
///
/// Values are explicit about their units to avoid confusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueLimits {
    /// Capacity of the default in-memory buffer. Posts beyond this are
    /// refused and their payloads dropped.
    pub max_pending_events: usize,
}

impl Default for QueueLimits {
    fn default() -> Self {
        Self {
            max_pending_events: 4096,
        }
    }
}

/// Logging settings consumed by `telemetry::init_logging`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridable via `DESKSPAN_LOG`.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}
