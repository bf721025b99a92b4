//! Framebridge Engine
//!
//! The compute side of the bridge. A worker owns exactly one [`Engine`] and
//! is the only thing that ever calls it, so implementations are free to keep
//! their object table as plain owned state.
//!
//! # Architecture
//!
//! - [`Engine`] is the seam the worker runtime talks to
//! - [`ObjectTable`] maps [`Handle`]s to engine-resident objects
//! - [`PolarsEngine`] is the production implementation, backed by polars
//!
//! [`Handle`]: framebridge_types::Handle

mod engine;
mod error;
mod polars_engine;
mod table;

pub use engine::{Engine, EngineConfig};
pub use error::{EngineError, EngineResult};
pub use polars_engine::PolarsEngine;
pub use table::ObjectTable;
