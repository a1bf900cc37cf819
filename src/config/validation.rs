//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges. All problems are
//! reported together rather than stopping at the first one.

use thiserror::Error;

use crate::config::schema::IdsConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address must not be empty")]
    EmptyBindAddress,

    #[error("inspection.threshold must be at least 1")]
    ZeroThreshold,

    #[error("inspection.window_secs must be greater than 0")]
    ZeroWindow,

    #[error("inspection.block_secs must be greater than 0")]
    ZeroBlockDuration,

    #[error("timeouts.request_secs must be greater than 0")]
    ZeroRequestTimeout,

    #[error("logging.max_file_bytes must be greater than 0 when logging.file_path is set")]
    ZeroLogFileSize,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &IdsConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.trim().is_empty() {
        errors.push(ValidationError::EmptyBindAddress);
    }
    if config.inspection.threshold == 0 {
        errors.push(ValidationError::ZeroThreshold);
    }
    if config.inspection.window_secs == 0 {
        errors.push(ValidationError::ZeroWindow);
    }
    if config.inspection.block_secs == 0 {
        errors.push(ValidationError::ZeroBlockDuration);
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }
    if config.logging.file_path.is_some() && config.logging.max_file_bytes == 0 {
        errors.push(ValidationError::ZeroLogFileSize);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
