//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the inspection gate.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct IdsConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration for the downstream stage.
    pub timeouts: TimeoutConfig,

    /// Detection, tracking and blocking policy.
    pub inspection: InspectionConfig,

    /// Security log sinks.
    pub logging: LoggingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed for the downstream handler, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Inspection policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct InspectionConfig {
    /// When false every request is forwarded and only logged.
    pub enabled: bool,

    /// Suspicious events within the window that trigger a block.
    pub threshold: usize,

    /// Sliding window length in seconds.
    pub window_secs: u64,

    /// Block duration in seconds.
    pub block_secs: u64,

    /// Interval for purging idle sources and stale blocks (0 = never).
    pub housekeeping_secs: u64,
}

impl InspectionConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn block_duration(&self) -> Duration {
        Duration::from_secs(self.block_secs)
    }
}

impl Default for InspectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 3,
            window_secs: 20,
            block_secs: 30,
            housekeeping_secs: 60,
        }
    }
}

/// Security log configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,

    /// Path of the rotating security log file. `None` disables the file sink.
    pub file_path: Option<String>,

    /// Size at which the log file is rotated.
    pub max_file_bytes: u64,

    /// Number of rotated files kept next to the active one.
    pub max_backups: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: Some("security.log".to_string()),
            max_file_bytes: 1_000_000,
            max_backups: 3,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
