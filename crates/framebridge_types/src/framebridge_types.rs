//! Framebridge Types - Data shared by both sides of the bridge
//!
//! Everything in this crate crosses the channel between the control context
//! and the worker context by value: handles, request ids, expressions, lazy
//! plan operations and CSV read options. None of it refers to engine memory.

mod expr;
mod handle;
mod options;

pub use expr::*;
pub use handle::*;
pub use options::*;
