//! WebSocket transport: connection table, per-connection session task, and
//! heartbeat.

pub mod broadcast;
pub mod connection;
pub mod heartbeat;
pub mod session;

pub use broadcast::BroadcastManager;
pub use session::{SessionContext, run_ws_session};
