//! Inbound event → outbound event translation.
//!
//! | Inbound            | Registry        | Outbound                    | Audience          |
//! |--------------------|-----------------|-----------------------------|-------------------|
//! | connect            | -               | -                           | -                 |
//! | join(name)         | `join`          | `usuario:conectado`         | all but sender    |
//! |                    |                 | `usuarios:lista`            | sender only       |
//! | message(text)      | `lookup`        | `mensaje:recibir`           | everyone          |
//! | typing-start(name) | -               | `usuario:escribiendo`       | all but sender    |
//! | typing-stop        | -               | `usuario:dejo_escribir`     | all but sender    |
//! | disconnect         | `leave`         | `usuario:desconectado` (if joined) | all but sender |
//!
//! An empty display name is treated as no name: messages go out as
//! `Anónimo` and the departure is not announced.
//!
//! Each handler is callable on its own, without a network. Concurrency comes
//! from the registry's atomic operations; handlers for different sessions
//! run in parallel.

use std::sync::Arc;

use charla_core::constants::{ANONYMOUS_NAME, joined_text, left_text};
use charla_core::{ChatMessage, ClientEvent, ConnectionId, Presence, ServerEvent, iso_timestamp};
use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::{debug, info};

use crate::metrics::{CHAT_JOINS_TOTAL, CHAT_MESSAGES_TOTAL};
use crate::registry::SessionRegistry;
use crate::transport::Transport;

/// Per-connection protocol state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Open, no join event yet. Messages and typing events are still relayed.
    Connected,
    /// A join event has been processed.
    Joined,
    /// Disconnected. Terminal: reached only after the reader has stopped,
    /// so no frame is processed in this state.
    Gone,
}

impl SessionState {
    /// State after processing `event`.
    pub fn on_event(self, event: &ClientEvent) -> Self {
        match (self, event) {
            (Self::Gone, _) => Self::Gone,
            (_, ClientEvent::Join { .. }) => Self::Joined,
            (state, _) => state,
        }
    }

    /// State after the connection closed.
    pub fn on_disconnect(self) -> Self {
        Self::Gone
    }
}

/// Applies inbound events to the registry and emits the resulting events.
pub struct EventBroadcaster {
    registry: Arc<SessionRegistry>,
    transport: Arc<dyn Transport>,
    clock: fn() -> DateTime<Utc>,
}

impl EventBroadcaster {
    /// Create a broadcaster over a shared registry and transport.
    pub fn new(registry: Arc<SessionRegistry>, transport: Arc<dyn Transport>) -> Self {
        Self {
            registry,
            transport,
            clock: Utc::now,
        }
    }

    /// Replace the clock used for message timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// The registry this broadcaster mutates.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Route a validated inbound event from connection `id`.
    pub async fn dispatch(&self, id: &ConnectionId, event: ClientEvent) {
        match event {
            ClientEvent::Join { display_name } => self.on_join(id, display_name).await,
            ClientEvent::SendMessage { text } => self.on_message(id, text).await,
            ClientEvent::TypingStart { display_name } => {
                self.on_typing_start(id, display_name).await;
            }
            ClientEvent::TypingStop => self.on_typing_stop(id).await,
        }
    }

    /// A connection opened. Nothing to record until it joins.
    pub fn on_connect(&self, id: &ConnectionId) {
        debug!(conn_id = %id, "session connected");
    }

    /// Record the display name, announce it to everyone else, and send the
    /// roster (which includes the new name) back to the joiner.
    pub async fn on_join(&self, id: &ConnectionId, name: String) {
        self.registry.join(id.clone(), name.clone());
        counter!(CHAT_JOINS_TOTAL).increment(1);
        info!(conn_id = %id, name = %name, "user joined");

        let announcement = ServerEvent::UserJoined(Presence {
            id: id.clone(),
            text: joined_text(&name),
            name,
        });
        self.transport.send_to_all_except(id, &announcement).await;

        let roster = ServerEvent::Roster(self.registry.snapshot());
        self.transport.send_to(id, &roster).await;
    }

    /// Relay a chat message to every connection, sender included.
    pub async fn on_message(&self, id: &ConnectionId, text: String) {
        let name = self
            .registry
            .lookup(id)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| ANONYMOUS_NAME.to_string());
        let timestamp = iso_timestamp((self.clock)());
        counter!(CHAT_MESSAGES_TOTAL).increment(1);
        info!(conn_id = %id, name = %name, len = text.len(), "message relayed");

        let event = ServerEvent::MessageReceived(ChatMessage {
            id: id.clone(),
            name,
            text,
            timestamp,
        });
        self.transport.send_to_all(&event).await;
    }

    /// Tell everyone else that `name` is typing.
    pub async fn on_typing_start(&self, id: &ConnectionId, name: String) {
        debug!(conn_id = %id, name = %name, "typing started");
        self.transport
            .send_to_all_except(id, &ServerEvent::TypingStart(name))
            .await;
    }

    /// Tell everyone else that `id` stopped typing.
    pub async fn on_typing_stop(&self, id: &ConnectionId) {
        debug!(conn_id = %id, "typing stopped");
        self.transport
            .send_to_all_except(id, &ServerEvent::TypingStop(id.clone()))
            .await;
    }

    /// Forget `id` and, if it had joined under a non-empty name, announce
    /// its departure.
    ///
    /// Returns the name it had joined under. An empty name counts as never
    /// joined.
    pub async fn on_disconnect(&self, id: &ConnectionId) -> Option<String> {
        let Some(name) = self.registry.leave(id).filter(|n| !n.is_empty()) else {
            debug!(conn_id = %id, "session closed before joining");
            return None;
        };
        info!(conn_id = %id, name = %name, "user left");

        let event = ServerEvent::UserLeft(Presence {
            id: id.clone(),
            name: name.clone(),
            text: left_text(&name),
        });
        self.transport.send_to_all_except(id, &event).await;
        Some(name)
    }
}
