//! Wire protocol: inbound client events and outbound server events.
//!
//! Every frame is a JSON envelope `{"event": "<name>", "data": <payload>}`.
//! Inbound envelopes are validated into [`ClientEvent`] before they reach the
//! broadcaster; outbound [`ServerEvent`]s serialize to the same envelope.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::constants::events;
use crate::errors::ProtocolError;
use crate::ids::ConnectionId;

/// Format a timestamp as ISO-8601 with millisecond precision and `Z` suffix,
/// e.g. `2026-01-01T00:00:00.000Z`.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ─────────────────────────────────────────────────────────────────────────────
// Inbound
// ─────────────────────────────────────────────────────────────────────────────

/// A validated event received from a client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    /// `usuario:unirse`: announce a display name.
    Join {
        /// Name the client wants to appear under.
        display_name: String,
    },
    /// `mensaje:enviar`: send a chat message to everyone.
    SendMessage {
        /// Message body.
        text: String,
    },
    /// `usuario:escribiendo`: the client started typing.
    TypingStart {
        /// Name shown in the typing indicator.
        display_name: String,
    },
    /// `usuario:dejo_escribir`: the client stopped typing.
    TypingStop,
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

impl ClientEvent {
    /// Parse and validate one inbound text frame.
    ///
    /// A `mensaje:enviar` whose payload lacks a string `mensaje` field is
    /// accepted with an empty body; other shape mismatches are rejected.
    pub fn parse(frame: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope = serde_json::from_str(frame)?;
        match envelope.event.as_str() {
            events::JOIN => Ok(Self::Join {
                display_name: expect_string(events::JOIN, envelope.data)?,
            }),
            events::SEND_MESSAGE => {
                let text = match envelope.data {
                    Value::Object(mut fields) => match fields.remove("mensaje") {
                        Some(Value::String(s)) => s,
                        _ => String::new(),
                    },
                    other => {
                        return Err(ProtocolError::InvalidPayload {
                            event: events::SEND_MESSAGE.into(),
                            reason: format!("expected an object, got {}", kind_of(&other)),
                        });
                    }
                };
                Ok(Self::SendMessage { text })
            }
            events::TYPING_START => Ok(Self::TypingStart {
                display_name: expect_string(events::TYPING_START, envelope.data)?,
            }),
            events::TYPING_STOP => Ok(Self::TypingStop),
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }

    /// Wire event name of this event.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Join { .. } => events::JOIN,
            Self::SendMessage { .. } => events::SEND_MESSAGE,
            Self::TypingStart { .. } => events::TYPING_START,
            Self::TypingStop => events::TYPING_STOP,
        }
    }

    /// Encode as a wire envelope, the way a client would send it.
    pub fn to_json(&self) -> String {
        let value = match self {
            Self::Join { display_name } | Self::TypingStart { display_name } => {
                json!({ "event": self.event_name(), "data": display_name })
            }
            Self::SendMessage { text } => {
                json!({ "event": self.event_name(), "data": { "mensaje": text } })
            }
            Self::TypingStop => json!({ "event": self.event_name() }),
        };
        value.to_string()
    }
}

fn expect_string(event: &str, data: Value) -> Result<String, ProtocolError> {
    match data {
        Value::String(s) => Ok(s),
        other => Err(ProtocolError::InvalidPayload {
            event: event.to_string(),
            reason: format!("expected a string, got {}", kind_of(&other)),
        }),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outbound
// ─────────────────────────────────────────────────────────────────────────────

/// Payload of `usuario:conectado` and `usuario:desconectado`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    /// Connection that joined or left.
    pub id: ConnectionId,
    /// Its display name.
    #[serde(rename = "nombre")]
    pub name: String,
    /// Human-readable announcement.
    #[serde(rename = "mensaje")]
    pub text: String,
}

/// Payload of `mensaje:recibir`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sender connection.
    pub id: ConnectionId,
    /// Sender display name, or the anonymous sentinel.
    #[serde(rename = "nombre")]
    pub name: String,
    /// Message body.
    #[serde(rename = "mensaje")]
    pub text: String,
    /// ISO-8601 dispatch time.
    pub timestamp: String,
}

/// Payload of the `connect` handshake.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    /// The id the server assigned to this connection.
    pub id: ConnectionId,
}

/// An event sent from the server to one or more clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// First frame on every connection, tells the client its own id.
    #[serde(rename = "connect")]
    Connected(Handshake),
    /// Someone else joined.
    #[serde(rename = "usuario:conectado")]
    UserJoined(Presence),
    /// Every joined display name, sent to a newly joined session.
    #[serde(rename = "usuarios:lista")]
    Roster(Vec<String>),
    /// A chat message.
    #[serde(rename = "mensaje:recibir")]
    MessageReceived(ChatMessage),
    /// Someone else started typing; carries their display name.
    #[serde(rename = "usuario:escribiendo")]
    TypingStart(String),
    /// Someone else stopped typing; carries their connection id.
    #[serde(rename = "usuario:dejo_escribir")]
    TypingStop(ConnectionId),
    /// A joined user left.
    #[serde(rename = "usuario:desconectado")]
    UserLeft(Presence),
}

impl ServerEvent {
    /// Wire event name of this event.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Connected(_) => events::CONNECT,
            Self::UserJoined(_) => events::USER_JOINED,
            Self::Roster(_) => events::ROSTER,
            Self::MessageReceived(_) => events::MESSAGE_RECEIVED,
            Self::TypingStart(_) => events::TYPING_START,
            Self::TypingStop(_) => events::TYPING_STOP,
            Self::UserLeft(_) => events::USER_LEFT,
        }
    }

    /// Serialize to a wire envelope.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
