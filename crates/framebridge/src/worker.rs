//! Worker runtime.
//!
//! Owns the engine and serves requests one at a time. The runtime is a small
//! state machine:
//!
//! ```text
//! Uninitialized --start--> Initializing --init ok--> Ready --shutdown--> Stopped
//!       ^                        |
//!       +-------init failed------+
//! ```
//!
//! Every request that expects an answer gets exactly one response, including
//! requests that arrive in the wrong state.

use bytes::Bytes;
use framebridge_engine::{Engine, EngineConfig, EngineError};
use framebridge_types::{Handle, PlanOp, ReadOptions};
use tracing::{debug, warn};

use crate::channel::Port;
use crate::protocol::{ErrorKind, Request, RequestBody, Response, ResponseBody};

/// Lifecycle state of a worker runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Uninitialized,
    Initializing,
    Ready,
    Stopped,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkerState::Uninitialized => "uninitialized",
            WorkerState::Initializing => "initializing",
            WorkerState::Ready => "ready",
            WorkerState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// The worker side of the bridge.
pub struct WorkerRuntime {
    name: String,
    state: WorkerState,
    engine: Option<Box<dyn Engine>>,
}

impl WorkerRuntime {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: WorkerState::Uninitialized,
            engine: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Serve requests until `shutdown` is handled or the control side goes away.
    pub async fn run(mut self, mut port: Port<Response, Request>) {
        debug!("[worker:{}] Loop started", self.name);

        while let Some(request) = port.recv().await {
            if let Some(response) = self.handle(request) {
                if port.send(response).is_err() {
                    debug!("[worker:{}] Control side gone, dropping response", self.name);
                    break;
                }
            }
            if self.state == WorkerState::Stopped {
                break;
            }
        }

        debug!(
            "[worker:{}] Loop exited in state {} with {} live objects",
            self.name,
            self.state,
            self.engine.as_ref().map(|e| e.live_objects()).unwrap_or(0)
        );
    }

    /// Handle a single request. Returns `None` for notifications.
    pub fn handle(&mut self, request: Request) -> Option<Response> {
        let Request { id, body } = request;
        debug!("[worker:{}] {} {} in state {}", self.name, id, body.tag(), self.state);

        let body = match body {
            RequestBody::Start { engine, config } => self.start(engine, &config),
            RequestBody::Shutdown => self.shutdown(),
            RequestBody::Release { ptr } => {
                self.release(ptr);
                return None;
            }
            compute => self.compute(compute),
        };

        if let ResponseBody::Error { kind, message } = &body {
            warn!("[worker:{}] {} failed ({:?}): {}", self.name, id, kind, message);
        }
        Some(Response { id, body })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    fn start(&mut self, mut engine: Box<dyn Engine>, config: &EngineConfig) -> ResponseBody {
        if self.state != WorkerState::Uninitialized {
            return ResponseBody::error(
                ErrorKind::Protocol,
                format!("start received while {}", self.state),
            );
        }

        self.state = WorkerState::Initializing;
        debug!("[worker:{}] Initializing engine {}", self.name, engine.name());

        match engine.init(config) {
            Ok(()) => {
                self.engine = Some(engine);
                self.state = WorkerState::Ready;
                debug!("[worker:{}] Ready", self.name);
                ResponseBody::Ready
            }
            Err(e) => {
                self.state = WorkerState::Uninitialized;
                ResponseBody::error(ErrorKind::Engine, format!("engine init failed: {}", e))
            }
        }
    }

    fn shutdown(&mut self) -> ResponseBody {
        self.state = WorkerState::Stopped;
        if let Some(engine) = self.engine.take() {
            debug!(
                "[worker:{}] Dropping engine with {} live objects",
                self.name,
                engine.live_objects()
            );
        }
        ResponseBody::Stopped
    }

    fn release(&mut self, ptr: Handle) {
        match self.engine.as_mut().map(|engine| engine.release(ptr)) {
            Some(true) => debug!("[worker:{}] Released {}", self.name, ptr),
            _ => debug!("[worker:{}] Release of unknown handle {} ignored", self.name, ptr),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Compute
    // ─────────────────────────────────────────────────────────────────────────

    fn compute(&mut self, body: RequestBody) -> ResponseBody {
        let engine = match (self.state, self.engine.as_mut()) {
            (WorkerState::Ready, Some(engine)) => engine,
            (state, _) => {
                return ResponseBody::error(
                    ErrorKind::NotReady,
                    format!("{} received while {}", body.tag(), state),
                );
            }
        };

        let result = match body {
            RequestBody::ReadCsv { options, buf } => read_csv(engine.as_mut(), options, buf),
            RequestBody::Collect { ptr, plan } => collect(engine.as_mut(), ptr, &plan),
            RequestBody::Shape { ptr } => engine.shape(ptr).map(ResponseBody::Shape),
            RequestBody::Columns { ptr } => engine.columns(ptr).map(ResponseBody::Columns),
            other => {
                return ResponseBody::error(
                    ErrorKind::Protocol,
                    format!("{} is not a compute request", other.tag()),
                );
            }
        };

        result.unwrap_or_else(ResponseBody::from)
    }
}

fn read_csv(
    engine: &mut dyn Engine,
    options: ReadOptions,
    buf: Bytes,
) -> Result<ResponseBody, EngineError> {
    let config = options.resolve()?;
    let ptr = engine.read_csv(buf, &config)?;
    Ok(ResponseBody::ReadCsv { ptr })
}

fn collect(engine: &mut dyn Engine, ptr: Handle, plan: &[PlanOp]) -> Result<ResponseBody, EngineError> {
    let ptr = engine.collect(ptr, plan)?;
    Ok(ResponseBody::Collect { ptr })
}
