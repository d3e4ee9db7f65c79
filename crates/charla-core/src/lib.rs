//! # charla-core
//!
//! Shared vocabulary for the Charla chat relay.
//!
//! - **Connection IDs**: [`ConnectionId`] newtype, UUID v7
//! - **Protocol**: [`ClientEvent`] (inbound, validated) and [`ServerEvent`]
//!   (outbound) with the exact wire event names
//! - **Errors**: [`ProtocolError`] via `thiserror`
//! - **Logging**: `tracing` subscriber initialisation

#![deny(unsafe_code)]

pub mod constants;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod protocol;

pub use errors::ProtocolError;
pub use ids::ConnectionId;
pub use protocol::{ChatMessage, ClientEvent, Handshake, Presence, ServerEvent, iso_timestamp};
