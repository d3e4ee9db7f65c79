//! Connection table and the [`Transport`] implementation over it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use charla_core::{ConnectionId, ServerEvent};
use metrics::counter;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::connection::ClientConnection;
use crate::metrics::WS_BROADCAST_DROPS_TOTAL;
use crate::transport::Transport;

/// Every open connection, joined or not.
pub struct BroadcastManager {
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
}

impl BroadcastManager {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection, replacing any entry with the same id.
    pub async fn add(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.connections.write().await;
        let _ = conns.insert(connection.id.clone(), connection);
    }

    /// Unregister a connection. No-op if absent.
    pub async fn remove(&self, id: &ConnectionId) {
        let mut conns = self.connections.write().await;
        let _ = conns.remove(id);
    }

    /// Number of open connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Serialize once and queue to every connection accepted by `filter`.
    async fn fan_out<F>(&self, event: &ServerEvent, filter: F)
    where
        F: Fn(&ConnectionId) -> bool,
    {
        let frame = match event.to_json() {
            Ok(json) => Arc::new(json),
            Err(e) => {
                warn!(event = event.event_name(), error = %e, "failed to serialize event");
                return;
            }
        };

        let conns = self.connections.read().await;
        let mut recipients = 0usize;
        for conn in conns.values().filter(|c| filter(&c.id)) {
            recipients += 1;
            if !conn.send(frame.clone()) {
                counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                warn!(
                    conn_id = %conn.id,
                    event = event.event_name(),
                    dropped = conn.drop_count(),
                    "outbound queue full or closed, frame dropped"
                );
            }
        }
        debug!(event = event.event_name(), recipients, "event fanned out");
    }
}

impl Default for BroadcastManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for BroadcastManager {
    async fn send_to(&self, id: &ConnectionId, event: &ServerEvent) {
        self.fan_out(event, |c| c == id).await;
    }

    async fn send_to_all_except(&self, except: &ConnectionId, event: &ServerEvent) {
        self.fan_out(event, |c| c != except).await;
    }

    async fn send_to_all(&self, event: &ServerEvent) {
        self.fan_out(event, |_| true).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn make_connection(id: &str, capacity: usize) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Arc::new(ClientConnection::new(ConnectionId::from(id), tx)), rx)
    }

    async fn manager_with(ids: &[&str]) -> (BroadcastManager, Vec<mpsc::Receiver<Arc<String>>>) {
        let bm = BroadcastManager::new();
        let mut rxs = Vec::new();
        for id in ids {
            let (conn, rx) = make_connection(id, 8);
            bm.add(conn).await;
            rxs.push(rx);
        }
        (bm, rxs)
    }

    fn typing_stop(id: &str) -> ServerEvent {
        ServerEvent::TypingStop(ConnectionId::from(id))
    }

    #[tokio::test]
    async fn add_and_remove() {
        let (bm, _rxs) = manager_with(&["c1", "c2"]).await;
        assert_eq!(bm.connection_count().await, 2);
        bm.remove(&ConnectionId::from("c1")).await;
        assert_eq!(bm.connection_count().await, 1);
        bm.remove(&ConnectionId::from("missing")).await;
        assert_eq!(bm.connection_count().await, 1);
    }

    #[tokio::test]
    async fn add_same_id_replaces() {
        let bm = BroadcastManager::default();
        let (a, _rxa) = make_connection("dup", 4);
        let (b, mut rxb) = make_connection("dup", 4);
        bm.add(a).await;
        bm.add(b).await;
        assert_eq!(bm.connection_count().await, 1);
        bm.send_to_all(&typing_stop("x")).await;
        assert!(rxb.try_recv().is_ok());
    }

    #[tokio::test]
    async fn send_to_reaches_only_target() {
        let (bm, mut rxs) = manager_with(&["c1", "c2"]).await;
        bm.send_to(&ConnectionId::from("c2"), &typing_stop("c1")).await;
        assert!(rxs[0].try_recv().is_err());
        assert!(rxs[1].try_recv().is_ok());
    }

    #[tokio::test]
    async fn send_to_unknown_is_noop() {
        let (bm, mut rxs) = manager_with(&["c1"]).await;
        bm.send_to(&ConnectionId::from("ghost"), &typing_stop("c1")).await;
        assert!(rxs[0].try_recv().is_err());
    }

    #[tokio::test]
    async fn send_to_all_except_skips_sender() {
        let (bm, mut rxs) = manager_with(&["c1", "c2", "c3"]).await;
        bm.send_to_all_except(&ConnectionId::from("c1"), &typing_stop("c1"))
            .await;
        assert!(rxs[0].try_recv().is_err());
        assert!(rxs[1].try_recv().is_ok());
        assert!(rxs[2].try_recv().is_ok());
    }

    #[tokio::test]
    async fn send_to_all_reaches_everyone_with_same_frame() {
        let (bm, mut rxs) = manager_with(&["c1", "c2"]).await;
        bm.send_to_all(&ServerEvent::Roster(vec!["Ana".into()])).await;
        let a = rxs[0].try_recv().unwrap();
        let b = rxs[1].try_recv().unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let parsed: serde_json::Value = serde_json::from_str(&a).unwrap();
        assert_eq!(parsed["event"], "usuarios:lista");
        assert_eq!(parsed["data"], serde_json::json!(["Ana"]));
    }

    #[tokio::test]
    async fn full_queue_does_not_block_others() {
        let bm = BroadcastManager::new();
        let (slow, _slow_rx) = make_connection("slow", 1);
        let (fast, mut fast_rx) = make_connection("fast", 8);
        bm.add(slow.clone()).await;
        bm.add(fast).await;

        for _ in 0..3 {
            bm.send_to_all(&typing_stop("x")).await;
        }
        assert_eq!(slow.drop_count(), 2);
        for _ in 0..3 {
            assert!(fast_rx.try_recv().is_ok());
        }
    }

    #[tokio::test]
    async fn empty_table_is_fine() {
        let bm = BroadcastManager::new();
        bm.send_to_all(&typing_stop("x")).await;
        bm.send_to_all_except(&ConnectionId::from("x"), &typing_stop("x"))
            .await;
        assert_eq!(bm.connection_count().await, 0);
    }
}
