//! Control-side proxies for engine-resident objects.
//!
//! A [`FrameProxy`] wraps the handle of a materialized frame. Calling
//! [`FrameProxy::lazy`] starts a [`LazyPlanProxy`], which records
//! `select`/`filter`/`drop_nulls` steps locally. Nothing crosses the channel
//! until [`LazyPlanProxy::collect`].
//!
//! Handles are reference counted. When the last proxy referring to a frame is
//! dropped, a `release` notification is posted to the worker.

use std::sync::Arc;

use framebridge_types::{Expr, Handle, PlanOp, Shape};

use crate::dispatcher::Dispatcher;
use crate::error::{BridgeError, BridgeResult};
use crate::protocol::{RequestBody, ResponseBody, tags};

/// Shared owner of a frame handle.
struct FrameRef {
    ptr: Handle,
    dispatcher: Arc<Dispatcher>,
}

impl Drop for FrameRef {
    fn drop(&mut self) {
        if let Err(e) = self.dispatcher.notify(RequestBody::Release { ptr: self.ptr }) {
            // Worker already gone, its table went with it.
            tracing::debug!("[proxy] release of {} skipped: {}", self.ptr, e);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FrameProxy
// ─────────────────────────────────────────────────────────────────────────────

/// A materialized frame living in the worker.
#[derive(Clone)]
pub struct FrameProxy {
    inner: Arc<FrameRef>,
}

impl FrameProxy {
    pub(crate) fn wrap(ptr: Handle, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            inner: Arc::new(FrameRef { ptr, dispatcher }),
        }
    }

    pub fn handle(&self) -> Handle {
        self.inner.ptr
    }

    /// Start a lazy plan over this frame. Purely local.
    pub fn lazy(&self) -> LazyPlanProxy {
        LazyPlanProxy {
            source: self.inner.clone(),
            ops: Vec::new(),
        }
    }

    pub async fn shape(&self) -> BridgeResult<Shape> {
        match self.call(RequestBody::Shape { ptr: self.handle() }).await? {
            ResponseBody::Shape(shape) => Ok(shape),
            other => Err(unexpected(tags::SHAPE, &other)),
        }
    }

    pub async fn columns(&self) -> BridgeResult<Vec<String>> {
        match self.call(RequestBody::Columns { ptr: self.handle() }).await? {
            ResponseBody::Columns(columns) => Ok(columns),
            other => Err(unexpected(tags::COLUMNS, &other)),
        }
    }

    async fn call(&self, body: RequestBody) -> BridgeResult<ResponseBody> {
        self.inner.dispatcher.call(body).await
    }
}

impl std::fmt::Debug for FrameProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameProxy")
            .field("handle", &self.handle())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LazyPlanProxy
// ─────────────────────────────────────────────────────────────────────────────

/// An unmaterialized chain of operations over a frame.
///
/// Composition methods take `&self` and return a new plan; the receiver is
/// never modified, so a plan can be branched.
#[derive(Clone)]
pub struct LazyPlanProxy {
    source: Arc<FrameRef>,
    ops: Vec<PlanOp>,
}

impl LazyPlanProxy {
    pub fn select<I, E>(&self, exprs: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        self.push(PlanOp::Select {
            exprs: exprs.into_iter().map(Into::into).collect(),
        })
    }

    pub fn filter(&self, predicate: impl Into<Expr>) -> Self {
        self.push(PlanOp::Filter {
            predicate: predicate.into(),
        })
    }

    /// Drop rows with a null in any column, or only in `subset` when given.
    pub fn drop_nulls(&self, subset: Option<Vec<String>>) -> Self {
        self.push(PlanOp::DropNulls { subset })
    }

    /// Run the plan in the worker and wrap the resulting frame.
    pub async fn collect(&self) -> BridgeResult<FrameProxy> {
        let dispatcher = &self.source.dispatcher;
        let body = RequestBody::Collect {
            ptr: self.source.ptr,
            plan: self.ops.clone(),
        };
        match dispatcher.call(body).await? {
            ResponseBody::Collect { ptr } => Ok(FrameProxy::wrap(ptr, dispatcher.clone())),
            other => Err(unexpected(tags::COLLECT, &other)),
        }
    }

    /// Handle of the frame the plan starts from.
    pub fn source(&self) -> Handle {
        self.source.ptr
    }

    pub fn plan(&self) -> &[PlanOp] {
        &self.ops
    }

    pub fn depth(&self) -> usize {
        self.ops.len()
    }

    fn push(&self, op: PlanOp) -> Self {
        let mut ops = Vec::with_capacity(self.ops.len() + 1);
        ops.extend_from_slice(&self.ops);
        ops.push(op);
        Self {
            source: self.source.clone(),
            ops,
        }
    }
}

impl std::fmt::Debug for LazyPlanProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyPlanProxy")
            .field("source", &self.source.ptr)
            .field("ops", &self.ops)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Proxy
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of object a [`Proxy`] stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyKind {
    Frame,
    LazyPlan,
}

/// Any control-side proxy.
#[derive(Debug, Clone)]
pub enum Proxy {
    Frame(FrameProxy),
    LazyPlan(LazyPlanProxy),
}

impl Proxy {
    pub fn kind(&self) -> ProxyKind {
        match self {
            Proxy::Frame(_) => ProxyKind::Frame,
            Proxy::LazyPlan(_) => ProxyKind::LazyPlan,
        }
    }

    /// The frame handle behind this proxy. For a plan, its source frame.
    pub fn handle(&self) -> Handle {
        match self {
            Proxy::Frame(frame) => frame.handle(),
            Proxy::LazyPlan(plan) => plan.source(),
        }
    }

    pub fn as_frame(&self) -> Option<&FrameProxy> {
        match self {
            Proxy::Frame(frame) => Some(frame),
            Proxy::LazyPlan(_) => None,
        }
    }

    pub fn as_lazy(&self) -> Option<&LazyPlanProxy> {
        match self {
            Proxy::LazyPlan(plan) => Some(plan),
            Proxy::Frame(_) => None,
        }
    }
}

impl From<FrameProxy> for Proxy {
    fn from(frame: FrameProxy) -> Self {
        Proxy::Frame(frame)
    }
}

impl From<LazyPlanProxy> for Proxy {
    fn from(plan: LazyPlanProxy) -> Self {
        Proxy::LazyPlan(plan)
    }
}

fn unexpected(expected: &'static str, got: &ResponseBody) -> BridgeError {
    BridgeError::UnexpectedResponse {
        expected,
        got: got.tag(),
    }
}
