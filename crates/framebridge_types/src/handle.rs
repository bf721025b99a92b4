//! Opaque identifiers that cross the bridge.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Handle
// ─────────────────────────────────────────────────────────────────────────────

/// Opaque reference to an object living in a worker's object table.
///
/// A handle is only meaningful to the worker that issued it. The control side
/// stores and forwards handles but never interprets them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(u64);

impl Handle {
    /// Wrap a raw handle value issued by an engine.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw value, for logging and for engines that index by it.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request ID
// ─────────────────────────────────────────────────────────────────────────────

/// Per-call correlation id, echoed back in the matching response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Frame Metadata
// ─────────────────────────────────────────────────────────────────────────────

/// Row and column counts of a materialized frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    pub height: usize,
    pub width: usize,
}

impl Shape {
    pub const fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.height, self.width)
    }
}
