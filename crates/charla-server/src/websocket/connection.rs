//! Per-connection outbound queue and liveness state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use charla_core::ConnectionId;
use tokio::sync::mpsc;

/// One open WebSocket, as seen by the broadcast side.
///
/// Frames are pre-serialized JSON shared between recipients. The session
/// task owns the receiving end and writes them to the socket.
pub struct ClientConnection {
    /// Id assigned at upgrade.
    pub id: ConnectionId,
    tx: mpsc::Sender<Arc<String>>,
    /// When the socket was accepted.
    pub connected_at: Instant,
    /// Set by any inbound frame, cleared by the heartbeat.
    pub is_alive: AtomicBool,
    /// Frames dropped because the queue was full or closed.
    pub dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Wrap the sending half of a connection's outbound queue.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id,
            tx,
            connected_at: Instant::now(),
            is_alive: AtomicBool::new(true),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Queue a frame without waiting.
    ///
    /// Returns `false` if the queue is full or closed and bumps the drop
    /// counter.
    pub fn send(&self, frame: Arc<String>) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Frames dropped so far.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record inbound activity.
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
    }

    /// Read and clear the alive flag.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Time since accept.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
