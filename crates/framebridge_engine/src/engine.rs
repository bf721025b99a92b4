//! The engine seam.

use bytes::Bytes;
use framebridge_types::{CsvReadConfig, Handle, PlanOp, Shape};

use crate::error::EngineResult;

/// Settings applied when a worker boots its engine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Thread count used for reads that do not ask for one
    pub num_threads: Option<usize>,
}

/// A compute engine addressed through handles.
///
/// Every method is called from the worker thread only. Methods that create
/// objects return a new handle; nothing is ever returned by reference across
/// the bridge.
pub trait Engine: Send + 'static {
    /// Short name for logging.
    fn name(&self) -> &str;

    /// Bootstrap the engine. Called once per successful `start`.
    fn init(&mut self, config: &EngineConfig) -> EngineResult<()>;

    /// Parse a CSV buffer into a new frame. The engine takes ownership of `buf`.
    fn read_csv(&mut self, buf: Bytes, options: &CsvReadConfig) -> EngineResult<Handle>;

    /// Run `plan` on top of the frame behind `source` and store the result.
    fn collect(&mut self, source: Handle, plan: &[PlanOp]) -> EngineResult<Handle>;

    fn shape(&self, frame: Handle) -> EngineResult<Shape>;

    fn columns(&self, frame: Handle) -> EngineResult<Vec<String>>;

    /// Drop an object. Returns `false` if the handle was not live.
    fn release(&mut self, handle: Handle) -> bool;

    /// Number of objects currently held.
    fn live_objects(&self) -> usize;
}
