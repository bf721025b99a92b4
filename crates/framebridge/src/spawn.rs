//! Worker thread spawning.
//!
//! Each worker gets its own OS thread with a current-thread tokio runtime, so
//! the engine never shares an executor with the control side.

use std::thread;

use parking_lot::Mutex;

use crate::channel::Port;
use crate::error::{BridgeError, BridgeResult};
use crate::protocol::{Request, Response};
use crate::worker::WorkerRuntime;

/// Join handle for a spawned worker thread.
pub struct WorkerThread {
    name: String,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl WorkerThread {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the thread has finished. A thread that was already joined
    /// counts as finished.
    pub fn is_finished(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .map(|h| h.is_finished())
            .unwrap_or(true)
    }

    /// Block until the worker thread exits. Safe to call more than once.
    pub fn join(&self) -> BridgeResult<()> {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            handle.join().map_err(|_| BridgeError::WorkerPanicked)?;
            tracing::debug!("[spawn_worker:{}] Thread joined", self.name);
        }
        Ok(())
    }
}

/// Start a worker runtime on a dedicated thread, serving `port`.
pub fn spawn_worker(name: String, port: Port<Response, Request>) -> BridgeResult<WorkerThread> {
    tracing::debug!("[spawn_worker] Starting {}", name);

    // Build the runtime up front so failures surface to the caller.
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(BridgeError::WorkerSpawn)?;

    let name_clone = name.clone();
    let handle = thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            tracing::debug!("[spawn_worker:{}] Thread started", name_clone);
            rt.block_on(WorkerRuntime::new(name_clone.clone()).run(port));
            rt.shutdown_background();
            tracing::debug!("[spawn_worker:{}] Thread exiting", name_clone);
        })
        .map_err(BridgeError::WorkerSpawn)?;

    Ok(WorkerThread {
        name,
        handle: Mutex::new(Some(handle)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::channel;
    use crate::protocol::{RequestBody, ResponseBody};
    use framebridge_types::RequestId;

    #[tokio::test]
    async fn test_worker_thread_lifecycle() {
        let (control, worker_port) = channel::<Request, Response>();
        let thread = spawn_worker("fb-test-worker".to_string(), worker_port).unwrap();
        assert_eq!(thread.name(), "fb-test-worker");

        let (tx, mut rx) = control.split();
        tx.send(Request {
            id: RequestId::new(1),
            body: RequestBody::Shutdown,
        })
        .unwrap();

        let response = rx.recv().await.unwrap();
        assert_eq!(response.id, RequestId::new(1));
        assert_eq!(response.body, ResponseBody::Stopped);

        thread.join().unwrap();
        assert!(thread.is_finished());
        thread.join().unwrap();
    }

    #[test]
    fn test_worker_exits_when_control_side_drops() {
        let (control, worker_port) = channel::<Request, Response>();
        let thread = spawn_worker("fb-orphan-worker".to_string(), worker_port).unwrap();
        drop(control);
        thread.join().unwrap();
    }
}
