//! Error types for the client core.

use crate::state::ConnectionState;
use thiserror::Error;

/// Errors surfaced by the client core.
///
/// Every variant is fatal to the current operation; the dispatcher maps it
/// to a terminal [`ConnectionState`] and tears the connection down.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level I/O fault.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Malformed or unknown protocol data.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A rectangle outside the framebuffer (update aborted).
    #[error("rectangle {width}x{height} at ({x}, {y}) outside the {fb_width}x{fb_height} framebuffer")]
    Bounds {
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        fb_width: u16,
        fb_height: u16,
    },

    /// A rectangle decoder failed.
    #[error("decode error: {0}")]
    Decode(#[source] anyhow::Error),

    /// The server asked for something this client does not do.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Authentication against the server failed.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The peer is not a compatible server.
    #[error("invalid server: {0}")]
    InvalidServer(String),
}

impl ClientError {
    /// The terminal connection state this error drives the session into.
    pub fn terminal_state(&self) -> ConnectionState {
        match self {
            Self::AuthFailed(_) => ConnectionState::AuthFailed,
            Self::InvalidServer(_) => ConnectionState::InvalidServer,
            _ => ConnectionState::ConnectionFailed,
        }
    }
}
