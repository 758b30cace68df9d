//! Common error types for setup and I/O paths
//!
//! Per-datagram failures (`DecodeError`) never surface here: they are
//! counted by the ingestion loop and dropped. `PipelineError` covers the
//! paths that can legitimately stop a binary from starting.

use thiserror::Error;

use crate::config::ConfigError;
use crate::store::StoreError;

/// Errors raised while setting up or tearing down the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// I/O error (socket bind, log file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Sample store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Logging could not be initialised
    #[error("Logging setup failed: {0}")]
    Logging(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    /// Create a logging setup error
    pub fn logging(msg: impl Into<String>) -> Self {
        Self::Logging(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Result type alias using PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;
