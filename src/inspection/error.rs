//! Failures crossing the continuation boundary.

use std::any::Any;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The downstream stage did not produce a response.
#[derive(Debug, Error)]
pub enum DownstreamError {
    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panic(String),

    /// The handler returned an error.
    #[error("handler failed: {0}")]
    Failed(#[source] BoxError),
}

impl DownstreamError {
    pub fn failed(error: impl Into<BoxError>) -> Self {
        DownstreamError::Failed(error.into())
    }

    /// Convert a payload caught by `catch_unwind`.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        DownstreamError::Panic(message)
    }

    /// Error message followed by its source chain.
    pub fn detail(&self) -> String {
        let mut detail = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            detail.push_str(": caused by: ");
            detail.push_str(&cause.to_string());
            source = cause.source();
        }
        detail
    }
}
