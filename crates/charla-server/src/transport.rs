//! Delivery primitives used by the broadcaster.
//!
//! The broadcaster never iterates connections itself; it asks a
//! [`Transport`] for one of three audiences. Implementations must not wait
//! for delivery confirmation, and a failure to reach one recipient must not
//! affect the others.

use async_trait::async_trait;
use charla_core::{ConnectionId, ServerEvent};

/// Fan-out capability over the set of open connections.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `event` to the single connection `id`.
    async fn send_to(&self, id: &ConnectionId, event: &ServerEvent);

    /// Deliver `event` to every open connection except `except`.
    async fn send_to_all_except(&self, except: &ConnectionId, event: &ServerEvent);

    /// Deliver `event` to every open connection.
    async fn send_to_all(&self, event: &ServerEvent);
}
