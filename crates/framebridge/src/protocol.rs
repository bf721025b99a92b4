//! Messages exchanged between the control side and the worker.
//!
//! Every request carries a [`RequestId`] that the worker echoes in its
//! response. Each request type also declares the response type it expects;
//! the dispatcher checks both.

use bytes::Bytes;

use framebridge_engine::{Engine, EngineConfig, EngineError};
use framebridge_types::{Handle, PlanOp, ReadOptions, RequestId, Shape};

use crate::channel::Tagged;

/// Message tags as they appear in logs and channel statistics.
pub mod tags {
    pub const START: &str = "start";
    pub const READY: &str = "ready";
    pub const READ_CSV: &str = "read_csv";
    pub const COLLECT: &str = "LazyFrame::collect";
    pub const SHAPE: &str = "DataFrame::shape";
    pub const COLUMNS: &str = "DataFrame::columns";
    pub const RELEASE: &str = "release";
    pub const SHUTDOWN: &str = "shutdown";
    pub const STOPPED: &str = "stopped";
    pub const ERROR: &str = "error";
}

// ─────────────────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────────────────

/// Request envelope sent to the worker.
#[derive(Debug)]
pub struct Request {
    pub id: RequestId,
    pub body: RequestBody,
}

/// Request payloads.
pub enum RequestBody {
    /// Hand the engine to the worker and boot it.
    Start {
        engine: Box<dyn Engine>,
        config: EngineConfig,
    },

    /// Parse a CSV buffer. The buffer is moved, not copied.
    ReadCsv { options: ReadOptions, buf: Bytes },

    /// Materialize a lazy plan on top of a frame.
    Collect { ptr: Handle, plan: Vec<PlanOp> },

    Shape { ptr: Handle },

    Columns { ptr: Handle },

    /// Drop an object from the worker's table. Never answered.
    Release { ptr: Handle },

    Shutdown,
}

impl RequestBody {
    pub fn tag(&self) -> &'static str {
        match self {
            RequestBody::Start { .. } => tags::START,
            RequestBody::ReadCsv { .. } => tags::READ_CSV,
            RequestBody::Collect { .. } => tags::COLLECT,
            RequestBody::Shape { .. } => tags::SHAPE,
            RequestBody::Columns { .. } => tags::COLUMNS,
            RequestBody::Release { .. } => tags::RELEASE,
            RequestBody::Shutdown => tags::SHUTDOWN,
        }
    }

    /// Tag of the response this request is answered with, `None` for
    /// notifications.
    pub fn response_tag(&self) -> Option<&'static str> {
        match self {
            RequestBody::Start { .. } => Some(tags::READY),
            RequestBody::ReadCsv { .. } => Some(tags::READ_CSV),
            RequestBody::Collect { .. } => Some(tags::COLLECT),
            RequestBody::Shape { .. } => Some(tags::SHAPE),
            RequestBody::Columns { .. } => Some(tags::COLUMNS),
            RequestBody::Release { .. } => None,
            RequestBody::Shutdown => Some(tags::STOPPED),
        }
    }

    /// Whether the request needs an engine in the `Ready` state.
    pub fn is_compute(&self) -> bool {
        matches!(
            self,
            RequestBody::ReadCsv { .. }
                | RequestBody::Collect { .. }
                | RequestBody::Shape { .. }
                | RequestBody::Columns { .. }
        )
    }
}

impl std::fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestBody::Start { engine, config } => f
                .debug_struct("Start")
                .field("engine", &engine.name())
                .field("config", config)
                .finish(),
            RequestBody::ReadCsv { options, buf } => f
                .debug_struct("ReadCsv")
                .field("options", options)
                .field("buf_len", &buf.len())
                .finish(),
            RequestBody::Collect { ptr, plan } => f
                .debug_struct("Collect")
                .field("ptr", ptr)
                .field("plan", plan)
                .finish(),
            RequestBody::Shape { ptr } => f.debug_struct("Shape").field("ptr", ptr).finish(),
            RequestBody::Columns { ptr } => f.debug_struct("Columns").field("ptr", ptr).finish(),
            RequestBody::Release { ptr } => f.debug_struct("Release").field("ptr", ptr).finish(),
            RequestBody::Shutdown => f.write_str("Shutdown"),
        }
    }
}

impl Tagged for Request {
    fn tag(&self) -> &'static str {
        self.body.tag()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Responses
// ─────────────────────────────────────────────────────────────────────────────

/// Response envelope received from the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Id of the request this answers.
    pub id: RequestId,
    pub body: ResponseBody,
}

/// Response payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Ready,
    ReadCsv { ptr: Handle },
    Collect { ptr: Handle },
    Shape(Shape),
    Columns(Vec<String>),
    Stopped,
    Error { kind: ErrorKind, message: String },
}

impl ResponseBody {
    pub fn tag(&self) -> &'static str {
        match self {
            ResponseBody::Ready => tags::READY,
            ResponseBody::ReadCsv { .. } => tags::READ_CSV,
            ResponseBody::Collect { .. } => tags::COLLECT,
            ResponseBody::Shape(_) => tags::SHAPE,
            ResponseBody::Columns(_) => tags::COLUMNS,
            ResponseBody::Stopped => tags::STOPPED,
            ResponseBody::Error { .. } => tags::ERROR,
        }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        ResponseBody::Error {
            kind,
            message: message.into(),
        }
    }
}

impl Tagged for Response {
    fn tag(&self) -> &'static str {
        self.body.tag()
    }
}

/// Category of a failure reported by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Compute request before the worker reached `Ready`
    NotReady,
    /// Request out of sequence, e.g. a second `start`
    Protocol,
    UnknownHandle,
    InvalidOptions,
    /// Anything the engine itself reported
    Engine,
}

impl From<&EngineError> for ErrorKind {
    fn from(err: &EngineError) -> Self {
        match err {
            EngineError::UnknownHandle(_) => ErrorKind::UnknownHandle,
            EngineError::NotInitialized => ErrorKind::NotReady,
            EngineError::Options(_) => ErrorKind::InvalidOptions,
            EngineError::Polars(_) | EngineError::Other(_) => ErrorKind::Engine,
        }
    }
}

impl From<EngineError> for ResponseBody {
    fn from(err: EngineError) -> Self {
        ResponseBody::error(ErrorKind::from(&err), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_answered_request_declares_its_response() {
        let ptr = Handle::from_raw(1);
        let cases = [
            (
                RequestBody::ReadCsv {
                    options: ReadOptions::default(),
                    buf: Bytes::new(),
                },
                Some(tags::READ_CSV),
            ),
            (RequestBody::Collect { ptr, plan: vec![] }, Some(tags::COLLECT)),
            (RequestBody::Shape { ptr }, Some(tags::SHAPE)),
            (RequestBody::Columns { ptr }, Some(tags::COLUMNS)),
            (RequestBody::Release { ptr }, None),
            (RequestBody::Shutdown, Some(tags::STOPPED)),
        ];
        for (body, expected) in cases {
            assert_eq!(body.response_tag(), expected, "{}", body.tag());
        }
    }

    #[test]
    fn test_compute_requests() {
        let ptr = Handle::from_raw(1);
        assert!(RequestBody::Shape { ptr }.is_compute());
        assert!(!RequestBody::Release { ptr }.is_compute());
        assert!(!RequestBody::Shutdown.is_compute());
    }

    #[test]
    fn test_engine_error_kind() {
        let body = ResponseBody::from(EngineError::UnknownHandle(Handle::from_raw(9)));
        assert_eq!(
            body,
            ResponseBody::error(ErrorKind::UnknownHandle, "Unknown handle: #9")
        );
        assert_eq!(body.tag(), tags::ERROR);
    }

    #[test]
    fn test_read_csv_debug_omits_buffer_contents() {
        let body = RequestBody::ReadCsv {
            options: ReadOptions::default(),
            buf: Bytes::from_static(b"a,b\n1,2\n"),
        };
        let text = format!("{body:?}");
        assert!(text.contains("buf_len: 8"));
        assert!(!text.contains("a,b"));
    }
}
