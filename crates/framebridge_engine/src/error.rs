//! Error types for the compute engine.

use framebridge_types::{Handle, OptionsError};

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur inside an engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Unknown handle: {0}")]
    UnknownHandle(Handle),

    #[error("Engine has not been initialized")]
    NotInitialized,

    #[error("Invalid read options: {0}")]
    Options(#[from] OptionsError),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("{0}")]
    Other(String),
}
