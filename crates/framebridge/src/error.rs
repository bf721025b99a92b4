//! Error types for the bridge.

use std::time::Duration;

use crate::channel::ChannelClosed;
use crate::protocol::ErrorKind;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors surfaced to callers of the bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The input could not be turned into a fetchable source.
    #[error("{input} is not a valid url: {reason}")]
    InvalidSource { input: String, reason: String },

    /// The HTTP request itself failed.
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("fetching {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// The worker went away while a request was outstanding.
    #[error("worker exited before responding")]
    WorkerExited,

    #[error("worker thread panicked")]
    WorkerPanicked,

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// A compute request reached a worker that has not finished starting.
    #[error("worker is not ready: {0}")]
    NotReady(String),

    /// The worker answered with a response of the wrong type.
    #[error("protocol error: expected `{expected}` response, got `{got}`")]
    UnexpectedResponse { expected: &'static str, got: &'static str },

    /// The worker rejected a request as out of sequence.
    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("unknown handle: {0}")]
    UnknownHandle(String),

    #[error("invalid read options: {0}")]
    InvalidOptions(String),

    /// The engine failed. The message is the engine's own.
    #[error("engine error: {0}")]
    Engine(String),
}

impl BridgeError {
    /// Rebuild an error reported by the worker in an `error` response.
    pub fn remote(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::NotReady => Self::NotReady(message),
            ErrorKind::Protocol => Self::Protocol(message),
            ErrorKind::UnknownHandle => Self::UnknownHandle(message),
            ErrorKind::InvalidOptions => Self::InvalidOptions(message),
            ErrorKind::Engine => Self::Engine(message),
        }
    }

    pub(crate) fn invalid_source(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSource {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Errors raised before any traffic because the input was unusable.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::InvalidSource { .. })
    }

    /// Errors raised while talking to a remote source.
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::HttpStatus { .. })
    }

    /// Check if this error indicates the worker has exited.
    pub fn is_worker_exited(&self) -> bool {
        matches!(self, Self::WorkerExited | Self::WorkerPanicked)
    }
}

impl From<ChannelClosed> for BridgeError {
    fn from(_: ChannelClosed) -> Self {
        Self::WorkerExited
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for BridgeError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        Self::WorkerExited
    }
}
