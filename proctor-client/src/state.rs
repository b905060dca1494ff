//! Connection lifecycle states.

use std::fmt;

/// The connection's lifecycle state.
///
/// Transitions move forward within a session: `Connecting` leads either to
/// `Connected` or to one of the terminal error states. Leaving a terminal
/// state requires an explicit reconnect, which builds a fresh connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport established.
    Disconnected,
    /// Transport established, handshake in progress.
    Connecting,
    /// The host could not be reached (set by the transport collaborator).
    HostUnreachable,
    /// The connection failed during handshake or normal operation.
    ConnectionFailed,
    /// The server rejected our authentication.
    AuthFailed,
    /// The peer did not greet like a compatible server.
    InvalidServer,
    /// Fully initialized and exchanging updates.
    Connected,
}

impl ConnectionState {
    /// True for states that require a reconnect to leave.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::HostUnreachable | Self::ConnectionFailed | Self::AuthFailed | Self::InvalidServer
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::HostUnreachable => "host unreachable",
            Self::ConnectionFailed => "connection failed",
            Self::AuthFailed => "authentication failed",
            Self::InvalidServer => "invalid server",
            Self::Connected => "connected",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(ConnectionState::ConnectionFailed.is_terminal());
        assert!(ConnectionState::AuthFailed.is_terminal());
        assert!(ConnectionState::InvalidServer.is_terminal());
        assert!(ConnectionState::HostUnreachable.is_terminal());
        assert!(!ConnectionState::Connected.is_terminal());
        assert!(!ConnectionState::Connecting.is_terminal());
        assert!(!ConnectionState::Disconnected.is_terminal());
    }
}
