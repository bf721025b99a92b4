//! Typed message channel between the control side and the worker.
//!
//! A channel has two [`Port`]s. Each port sends one message type and receives
//! the other. Sends never block and never copy payloads; the message value is
//! moved into the queue as is.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;

/// Messages that can name themselves for logs and statistics.
pub trait Tagged {
    fn tag(&self) -> &'static str;
}

/// The peer end of the channel is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("channel closed")]
pub struct ChannelClosed;

/// Which way a message travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Sent by the first port returned from [`channel`]
    Outbound,
    /// Sent by the second port
    Inbound,
}

// ─────────────────────────────────────────────────────────────────────────────
// Statistics
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Counters {
    by_tag: DashMap<&'static str, u64>,
    total: AtomicU64,
}

impl Counters {
    fn record(&self, tag: &'static str) {
        *self.by_tag.entry(tag).or_insert(0) += 1;
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    fn count(&self, tag: &str) -> u64 {
        self.by_tag.get(tag).map(|n| *n).unwrap_or(0)
    }

    fn snapshot(&self) -> BTreeMap<&'static str, u64> {
        self.by_tag.iter().map(|e| (*e.key(), *e.value())).collect()
    }
}

/// Per-tag message counters shared by both ends of a channel.
#[derive(Debug, Default)]
pub struct ChannelStats {
    outbound: Counters,
    inbound: Counters,
}

impl ChannelStats {
    fn counters(&self, direction: Direction) -> &Counters {
        match direction {
            Direction::Outbound => &self.outbound,
            Direction::Inbound => &self.inbound,
        }
    }

    /// Messages with `tag` sent in `direction`.
    pub fn count(&self, direction: Direction, tag: &str) -> u64 {
        self.counters(direction).count(tag)
    }

    /// All messages sent in `direction`.
    pub fn total(&self, direction: Direction) -> u64 {
        self.counters(direction).total.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of the per-tag counters for one direction.
    pub fn snapshot(&self, direction: Direction) -> BTreeMap<&'static str, u64> {
        self.counters(direction).snapshot()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Ports
// ─────────────────────────────────────────────────────────────────────────────

/// Create a channel. The first port sends `A` and receives `B`.
pub fn channel<A: Tagged, B: Tagged>() -> (Port<A, B>, Port<B, A>) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();
    let stats = Arc::new(ChannelStats::default());

    let first = Port {
        tx: PortSender {
            tx: a_tx,
            direction: Direction::Outbound,
            stats: stats.clone(),
        },
        rx: PortReceiver { rx: b_rx },
    };
    let second = Port {
        tx: PortSender {
            tx: b_tx,
            direction: Direction::Inbound,
            stats,
        },
        rx: PortReceiver { rx: a_rx },
    };
    (first, second)
}

/// One end of a channel.
pub struct Port<Out, In> {
    tx: PortSender<Out>,
    rx: PortReceiver<In>,
}

impl<Out: Tagged, In> Port<Out, In> {
    pub fn send(&self, message: Out) -> Result<(), ChannelClosed> {
        self.tx.send(message)
    }

    pub async fn recv(&mut self) -> Option<In> {
        self.rx.recv().await
    }

    pub fn stats(&self) -> Arc<ChannelStats> {
        self.tx.stats.clone()
    }

    pub fn split(self) -> (PortSender<Out>, PortReceiver<In>) {
        (self.tx, self.rx)
    }
}

/// Sending half of a [`Port`].
pub struct PortSender<Out> {
    tx: mpsc::UnboundedSender<Out>,
    direction: Direction,
    stats: Arc<ChannelStats>,
}

impl<Out> Clone for PortSender<Out> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            direction: self.direction,
            stats: self.stats.clone(),
        }
    }
}

impl<Out: Tagged> PortSender<Out> {
    /// Post a message. Fails only when the receiving side has been dropped.
    pub fn send(&self, message: Out) -> Result<(), ChannelClosed> {
        let tag = message.tag();
        self.tx.send(message).map_err(|_| ChannelClosed)?;
        self.stats.counters(self.direction).record(tag);
        tracing::trace!("[channel] {:?} {}", self.direction, tag);
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn stats(&self) -> Arc<ChannelStats> {
        self.stats.clone()
    }
}

/// Receiving half of a [`Port`].
pub struct PortReceiver<In> {
    rx: mpsc::UnboundedReceiver<In>,
}

impl<In> PortReceiver<In> {
    /// Next message, or `None` once every sender on the other side is gone.
    pub async fn recv(&mut self) -> Option<In> {
        self.rx.recv().await
    }
}
