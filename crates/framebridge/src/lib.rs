//! Framebridge
//!
//! Drives a dataframe engine that lives on its own worker thread from an
//! async control context.
//!
//! # Architecture
//!
//! - [`Bridge`] spawns the worker, hands it the engine and waits for `ready`
//! - [`FrameProxy`] and [`LazyPlanProxy`] stand in for engine objects; plans
//!   are composed locally and only cross the channel on `collect`
//! - The [`dispatcher`] tags every request with a [`RequestId`] and resolves
//!   the caller's future when the response with the same id comes back
//! - CSV buffers are moved into the worker, never copied
//!
//! [`RequestId`]: framebridge_types::RequestId

pub mod bridge;
pub mod channel;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod io;
pub mod protocol;
pub mod proxy;
pub mod spawn;
pub mod worker;

pub use bridge::Bridge;
pub use channel::{ChannelClosed, ChannelStats, Direction};
pub use config::{BridgeConfig, ConfigError};
pub use error::{BridgeError, BridgeResult};
pub use io::CsvSource;
pub use proxy::{FrameProxy, LazyPlanProxy, Proxy, ProxyKind};
pub use worker::{WorkerRuntime, WorkerState};
