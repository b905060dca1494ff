//! Protocol greeting parse and echo.
//!
//! A session opens with a 12-byte ASCII greeting, `RFB xxx.yyy\n` for a
//! standard display server or `ISD xxx.yyy\n` for a demo server. The client
//! echoes the exact bytes it received, accepting whatever version the server
//! announced. A greeting matching neither format means the peer is not a
//! server we can talk to.

use crate::io::{WireReader, WireWriter};
use tokio::io::{AsyncRead, AsyncWrite};

/// Length of the protocol greeting.
pub const GREETING_LEN: usize = 12;

const STANDARD_PREFIX: &[u8; 4] = b"RFB ";
const DEMO_PREFIX: &[u8; 4] = b"ISD ";

/// Which greeting format the server used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerFlavour {
    /// A standard display server (`RFB` greeting).
    Standard,
    /// A demo server (`ISD` greeting).
    Demo,
}

/// A parsed protocol greeting, keeping the raw bytes for the echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub major: u32,
    pub minor: u32,
    pub flavour: ServerFlavour,
    raw: [u8; GREETING_LEN],
}

impl ProtocolVersion {
    /// The greeting exactly as the server sent it.
    pub fn raw(&self) -> &[u8; GREETING_LEN] {
        &self.raw
    }

    /// Parse a 12-byte greeting buffer.
    pub fn parse(raw: [u8; GREETING_LEN]) -> std::io::Result<Self> {
        let flavour = if raw.starts_with(STANDARD_PREFIX) {
            ServerFlavour::Standard
        } else if raw.starts_with(DEMO_PREFIX) {
            ServerFlavour::Demo
        } else {
            return Err(invalid_greeting(&raw));
        };

        // "XXX 000.000\n": digits at 4..7 and 8..11, separated by a dot.
        if raw[7] != b'.' || raw[11] != b'\n' {
            return Err(invalid_greeting(&raw));
        }
        let major = parse_digits(&raw[4..7]).ok_or_else(|| invalid_greeting(&raw))?;
        let minor = parse_digits(&raw[8..11]).ok_or_else(|| invalid_greeting(&raw))?;

        Ok(Self {
            major,
            minor,
            flavour,
            raw,
        })
    }
}

fn parse_digits(bytes: &[u8]) -> Option<u32> {
    let s = std::str::from_utf8(bytes).ok()?;
    s.parse().ok()
}

fn invalid_greeting(raw: &[u8; GREETING_LEN]) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!(
            "not a greeting from a compatible server: {:?}",
            String::from_utf8_lossy(raw)
        ),
    )
}

/// Read and parse the server's greeting.
pub async fn read_greeting<R: AsyncRead + Unpin>(
    stream: &mut WireReader<R>,
) -> std::io::Result<ProtocolVersion> {
    let mut raw = [0u8; GREETING_LEN];
    stream.read_bytes(&mut raw).await?;
    ProtocolVersion::parse(raw)
}

/// Echo the greeting back to the server, byte for byte.
pub async fn echo_greeting<W: AsyncWrite + Unpin>(
    stream: &mut WireWriter<W>,
    version: &ProtocolVersion,
) -> std::io::Result<()> {
    stream.write_bytes(version.raw());
    stream.flush().await
}
