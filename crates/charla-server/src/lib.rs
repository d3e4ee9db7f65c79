//! # charla-server
//!
//! The chat relay core plus its WebSocket transport.
//!
//! - [`registry::SessionRegistry`]: which connections have joined, under what name
//! - [`broadcaster::EventBroadcaster`]: turns inbound client events into
//!   audience-scoped outbound events
//! - [`transport::Transport`]: the three delivery primitives the broadcaster uses
//! - [`websocket`]: connection table, per-connection session task, heartbeat
//! - [`server::ChatServer`]: Axum router (`/ws`, `/health`, `/metrics`) and
//!   graceful shutdown

#![deny(unsafe_code)]

pub mod broadcaster;
pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod shutdown;
pub mod transport;
pub mod websocket;

pub use broadcaster::{EventBroadcaster, SessionState};
pub use config::ServerConfig;
pub use errors::ServerError;
pub use registry::SessionRegistry;
pub use server::ChatServer;
pub use transport::Transport;
