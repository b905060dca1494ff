//! The seam to the lower authentication/session layer.
//!
//! The protocol this core decodes rides on a lower layer that owns
//! authentication and a handful of session-management messages. Instead of
//! inheriting from that layer, the core embeds a [`LowerConnection`] value
//! and calls it explicitly: during the handshake for authentication, from
//! the dispatcher for message types the core does not know, and on teardown.

use crate::errors::ClientError;
use proctor_protocol::{WireReader, WireWriter};
use tokio::io::{AsyncRead, AsyncWrite};

/// How to authenticate during the handshake.
///
/// The mode is chosen from the quality tier and the auth-file setting:
/// demo sessions authenticate with a challenge (via the auth file when one
/// is configured, else the application-internal secret), regular sessions
/// do not authenticate at this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// No authentication.
    None,
    /// Challenge-response using the application-internal secret.
    AppInternalChallenge,
    /// Challenge-response using the configured auth file.
    ChallengeViaAuthFile,
}

/// The lower connection layer the core delegates to.
#[allow(async_fn_in_trait)]
pub trait LowerConnection {
    /// Run the authentication exchange on the already-established streams.
    async fn auth_against_server<R, W>(
        &mut self,
        mode: AuthMode,
        input: &mut WireReader<R>,
        output: &mut WireWriter<W>,
    ) -> Result<(), ClientError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin;

    /// Handle a server message type the core does not understand.
    ///
    /// Returning an error is fatal to the connection.
    async fn handle_message<R, W>(
        &mut self,
        message_type: u8,
        input: &mut WireReader<R>,
        output: &mut WireWriter<W>,
    ) -> Result<(), ClientError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin;

    /// Ask the server who is logged in (sent once after the handshake).
    async fn send_get_user_information<W>(
        &mut self,
        output: &mut WireWriter<W>,
    ) -> Result<(), ClientError>
    where
        W: AsyncWrite + Unpin;

    /// The connection is going away; release whatever the layer holds.
    fn connection_closed(&mut self);
}

/// A lower layer that authenticates nothing and knows no extra messages.
///
/// Suitable for servers that do not require authentication, and for tests.
#[derive(Debug, Default)]
pub struct NoopLower;

impl LowerConnection for NoopLower {
    async fn auth_against_server<R, W>(
        &mut self,
        _mode: AuthMode,
        _input: &mut WireReader<R>,
        _output: &mut WireWriter<W>,
    ) -> Result<(), ClientError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        Ok(())
    }

    async fn handle_message<R, W>(
        &mut self,
        message_type: u8,
        _input: &mut WireReader<R>,
        _output: &mut WireWriter<W>,
    ) -> Result<(), ClientError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        Err(ClientError::Protocol(format!(
            "unknown server message type {}",
            message_type
        )))
    }

    async fn send_get_user_information<W>(
        &mut self,
        _output: &mut WireWriter<W>,
    ) -> Result<(), ClientError>
    where
        W: AsyncWrite + Unpin,
    {
        Ok(())
    }

    fn connection_closed(&mut self) {}
}
