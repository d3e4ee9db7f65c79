//! Protocol constants shared by the server and its tests.

/// Current version of the relay (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Display name used for messages sent before a join event.
pub const ANONYMOUS_NAME: &str = "Anónimo";

/// Wire event names.
pub mod events {
    /// Handshake carrying the connection's own id (server → client).
    pub const CONNECT: &str = "connect";
    /// A client announces its display name (client → server).
    pub const JOIN: &str = "usuario:unirse";
    /// A client sends a chat message (client → server).
    pub const SEND_MESSAGE: &str = "mensaje:enviar";
    /// Typing started (both directions).
    pub const TYPING_START: &str = "usuario:escribiendo";
    /// Typing stopped (both directions).
    pub const TYPING_STOP: &str = "usuario:dejo_escribir";
    /// Another user joined (server → client).
    pub const USER_JOINED: &str = "usuario:conectado";
    /// Roster of joined display names (server → newly joined client).
    pub const ROSTER: &str = "usuarios:lista";
    /// A chat message fanned out to everyone (server → client).
    pub const MESSAGE_RECEIVED: &str = "mensaje:recibir";
    /// A joined user left (server → client).
    pub const USER_LEFT: &str = "usuario:desconectado";
}

/// Announcement text broadcast when `name` joins.
pub fn joined_text(name: &str) -> String {
    format!("{name} se unió al chat")
}

/// Announcement text broadcast when `name` leaves.
pub fn left_text(name: &str) -> String {
    format!("{name} abandonó el chat")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_semver() {
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert_eq!(parts.len(), 3, "VERSION must be semver (MAJOR.MINOR.PATCH)");
    }

    #[test]
    fn join_and_leave_texts() {
        assert_eq!(joined_text("Alice"), "Alice se unió al chat");
        assert_eq!(left_text("Alice"), "Alice abandonó el chat");
    }

    #[test]
    fn inbound_and_outbound_typing_share_names() {
        assert_eq!(events::TYPING_START, "usuario:escribiendo");
        assert_eq!(events::TYPING_STOP, "usuario:dejo_escribir");
    }
}
