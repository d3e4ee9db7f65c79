//! Lifecycle of one WebSocket, from upgrade through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use charla_core::{ClientEvent, ConnectionId, Handshake, ServerEvent};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, instrument, warn};

use super::broadcast::BroadcastManager;
use super::connection::ClientConnection;
use super::heartbeat::{HeartbeatResult, run_heartbeat};
use crate::broadcaster::{EventBroadcaster, SessionState};
use crate::metrics::{
    CHAT_FRAMES_REJECTED_TOTAL, WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE,
    WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL,
};

/// How long the writer gets to flush after the reader stops.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Shared state every session task needs.
#[derive(Clone)]
pub struct SessionContext {
    /// Open-connection table.
    pub broadcast: Arc<BroadcastManager>,
    /// Event handlers.
    pub broadcaster: Arc<EventBroadcaster>,
    /// Ping and liveness check period.
    pub ping_interval: Duration,
    /// Silence after which a connection is dropped.
    pub pong_timeout: Duration,
    /// Outbound queue depth per connection.
    pub send_queue_capacity: usize,
    /// Server-wide shutdown signal.
    pub shutdown: CancellationToken,
}

/// What an inbound frame amounts to.
#[derive(Debug, PartialEq, Eq)]
enum Inbound<'a> {
    Text(&'a str),
    NotUtf8,
    Control,
    Close,
}

fn classify(msg: &Message) -> Inbound<'_> {
    match msg {
        Message::Text(t) => Inbound::Text(t.as_str()),
        Message::Binary(data) => std::str::from_utf8(data).map_or(Inbound::NotUtf8, Inbound::Text),
        Message::Ping(_) | Message::Pong(_) => Inbound::Control,
        Message::Close(_) => Inbound::Close,
    }
}

/// Drive one connection.
///
/// 1. Registers the connection and sends the `connect` handshake
/// 2. Parses each inbound frame and hands valid events to the broadcaster,
///    in arrival order; malformed frames are logged and dropped
/// 3. Writes queued outbound frames and periodic pings
/// 4. On close, error, heartbeat timeout, or server shutdown: unregisters,
///    then runs the disconnect handler exactly once
#[instrument(skip_all, fields(conn_id = %conn_id))]
pub async fn run_ws_session(ws: WebSocket, conn_id: ConnectionId, ctx: SessionContext) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(ctx.send_queue_capacity.max(1));
    let connection = Arc::new(ClientConnection::new(conn_id.clone(), send_tx));

    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    // Registered before the handshake so no broadcast after it is missed;
    // queued frames are only written once the handshake is out.
    ctx.broadcast.add(connection.clone()).await;

    let handshake = ServerEvent::Connected(Handshake {
        id: conn_id.clone(),
    });
    match handshake.to_json() {
        Ok(json) => {
            if let Err(e) = ws_tx.send(Message::Text(json.into())).await {
                debug!(error = %e, "failed to send handshake");
            }
        }
        Err(e) => warn!(error = %e, "failed to serialize handshake"),
    }
    ctx.broadcaster.on_connect(&conn_id);

    let cancel = ctx.shutdown.child_token();

    let heartbeat = tokio::spawn({
        let connection = connection.clone();
        let cancel = cancel.clone();
        let (interval, timeout) = (ctx.ping_interval, ctx.pong_timeout);
        async move {
            if run_heartbeat(connection, interval, timeout, cancel.clone()).await
                == HeartbeatResult::TimedOut
            {
                warn!(?timeout, "client unresponsive, disconnecting");
                cancel.cancel();
            }
        }
        .in_current_span()
    });

    let mut outbound = tokio::spawn({
        let cancel = cancel.clone();
        let period = ctx.ping_interval;
        async move {
            let mut ping = time::interval_at(time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    frame = send_rx.recv() => {
                        let Some(frame) = frame else { break };
                        if ws_tx.send(Message::Text(frame.as_str().into())).await.is_err() {
                            break;
                        }
                    }
                    _ = ping.tick() => {
                        if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                            break;
                        }
                    }
                    () = cancel.cancelled() => {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }
        .in_current_span()
    });

    let mut state = SessionState::Connected;
    loop {
        let msg = tokio::select! {
            msg = ws_rx.next() => msg,
            () = cancel.cancelled() => break,
        };
        let msg = match msg {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                debug!(error = %e, "websocket read error");
                break;
            }
            None => break,
        };
        connection.mark_alive();

        let frame = match classify(&msg) {
            Inbound::Text(frame) => frame,
            Inbound::NotUtf8 => {
                counter!(CHAT_FRAMES_REJECTED_TOTAL, "kind" => "invalid_utf8").increment(1);
                warn!("dropping non-UTF-8 binary frame");
                continue;
            }
            Inbound::Control => continue,
            Inbound::Close => {
                debug!("client sent close frame");
                break;
            }
        };

        match ClientEvent::parse(frame) {
            Ok(event) => {
                state = state.on_event(&event);
                ctx.broadcaster.dispatch(&conn_id, event).await;
            }
            Err(e) => {
                counter!(CHAT_FRAMES_REJECTED_TOTAL, "kind" => e.kind()).increment(1);
                warn!(kind = e.kind(), error = %e, "dropping malformed frame");
            }
        }
    }

    cancel.cancel();
    ctx.broadcast.remove(&conn_id).await;
    let left_as = ctx.broadcaster.on_disconnect(&conn_id).await;
    let state = state.on_disconnect();

    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    let age = connection.age();
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(age.as_secs_f64());
    info!(
        name = left_as.as_deref(),
        ?state,
        age_ms = u64::try_from(age.as_millis()).unwrap_or(u64::MAX),
        dropped = connection.drop_count(),
        "client disconnected"
    );

    if time::timeout(CLOSE_GRACE, &mut outbound).await.is_err() {
        outbound.abort();
    }
    let _ = heartbeat.await;
}
