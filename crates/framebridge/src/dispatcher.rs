//! Request/response correlation.
//!
//! Every call gets a fresh [`RequestId`] and a oneshot slot in the pending
//! map. A background reader task routes each response to the slot with the
//! same id, so concurrent calls resolve correctly no matter which order the
//! worker answers them in.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use framebridge_types::RequestId;

use crate::channel::{ChannelStats, Port, PortReceiver, PortSender};
use crate::error::{BridgeError, BridgeResult};
use crate::protocol::{Request, RequestBody, Response, ResponseBody};

type PendingMap = DashMap<RequestId, oneshot::Sender<ResponseBody>>;

/// Control-side end of the bridge protocol.
pub struct Dispatcher {
    sender: PortSender<Request>,
    pending: Arc<PendingMap>,
    next_id: AtomicU64,
    timeout: Option<Duration>,
    worker_alive: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl Dispatcher {
    /// Take over the control port and start routing responses.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(port: Port<Request, Response>, timeout: Option<Duration>) -> Self {
        let (sender, receiver) = port.split();
        let pending = Arc::new(PendingMap::new());
        let worker_alive = Arc::new(AtomicBool::new(true));

        let reader = tokio::spawn(read_responses(
            receiver,
            pending.clone(),
            worker_alive.clone(),
        ));

        Self {
            sender,
            pending,
            next_id: AtomicU64::new(1),
            timeout,
            worker_alive,
            reader,
        }
    }

    /// Send a request and wait for its response.
    ///
    /// `error` responses are turned back into [`BridgeError`]s, and a response
    /// of the wrong type is a protocol error.
    pub async fn call(&self, body: RequestBody) -> BridgeResult<ResponseBody> {
        let expected = body.response_tag().ok_or_else(|| {
            BridgeError::Protocol(format!("{} is a notification, it has no response", body.tag()))
        })?;

        if !self.is_worker_alive() {
            return Err(BridgeError::WorkerExited);
        }

        let id = self.allocate_id();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        debug!("[dispatcher] {} {} -> awaiting {}", id, body.tag(), expected);
        if let Err(e) = self.sender.send(Request { id, body }) {
            self.pending.remove(&id);
            return Err(e.into());
        }

        let body = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(result) => result?,
                Err(_) => {
                    self.pending.remove(&id);
                    warn!("[dispatcher] {} timed out after {:?}", id, limit);
                    return Err(BridgeError::Timeout(limit));
                }
            },
            None => rx.await?,
        };

        match body {
            ResponseBody::Error { kind, message } => Err(BridgeError::remote(kind, message)),
            body if body.tag() == expected => Ok(body),
            body => Err(BridgeError::UnexpectedResponse {
                expected,
                got: body.tag(),
            }),
        }
    }

    /// Post a request that is never answered.
    pub fn notify(&self, body: RequestBody) -> BridgeResult<()> {
        if let Some(expected) = body.response_tag() {
            return Err(BridgeError::Protocol(format!(
                "{} expects a {} response, use call",
                body.tag(),
                expected
            )));
        }
        let id = self.allocate_id();
        self.sender.send(Request { id, body })?;
        Ok(())
    }

    /// Number of calls still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> Arc<ChannelStats> {
        self.sender.stats()
    }

    pub fn is_worker_alive(&self) -> bool {
        self.worker_alive.load(Ordering::SeqCst) && !self.sender.is_closed()
    }

    fn allocate_id(&self) -> RequestId {
        RequestId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Route responses to their pending calls until the worker side closes.
async fn read_responses(
    mut receiver: PortReceiver<Response>,
    pending: Arc<PendingMap>,
    worker_alive: Arc<AtomicBool>,
) {
    while let Some(Response { id, body }) = receiver.recv().await {
        match pending.remove(&id) {
            Some((_, tx)) => {
                if tx.send(body).is_err() {
                    debug!("[dispatcher] Caller for {} went away, response dropped", id);
                }
            }
            None => warn!("[dispatcher] Orphan response {} ({}) dropped", id, body.tag()),
        }
    }

    worker_alive.store(false, Ordering::SeqCst);
    // Dropping the senders wakes every waiting caller with WorkerExited.
    let orphaned = pending.len();
    pending.clear();
    debug!("[dispatcher] Worker channel closed, {} pending calls failed", orphaned);
}
