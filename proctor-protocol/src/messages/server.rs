//! Server-to-client messages.
//!
//! The dispatcher reads one type byte and hands off to these parsers:
//! `0 = FramebufferUpdate, 1 = SetColourMapEntries, 2 = Bell,
//! 3 = ServerCutText`. FramebufferUpdate is special: only its header is
//! parsed here, the per-rectangle payloads are consumed by the decoders.

use crate::io::WireReader;
use crate::messages::types::PixelFormat;
use tokio::io::AsyncRead;

/// Server message type byte for FramebufferUpdate.
pub const MSG_FRAMEBUFFER_UPDATE: u8 = 0;
/// Server message type byte for SetColourMapEntries.
pub const MSG_SET_COLOUR_MAP_ENTRIES: u8 = 1;
/// Server message type byte for Bell.
pub const MSG_BELL: u8 = 2;
/// Server message type byte for ServerCutText.
pub const MSG_SERVER_CUT_TEXT: u8 = 3;

/// ServerInit: framebuffer geometry, the server's native pixel format, and
/// the desktop name.
///
/// Wire: `u16 width; u16 height; pixel_format (16 bytes); u32 name_len;
/// name[name_len]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInit {
    pub framebuffer_width: u16,
    pub framebuffer_height: u16,
    pub pixel_format: PixelFormat,
    pub name: String,
}

impl ServerInit {
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut WireReader<R>,
    ) -> std::io::Result<Self> {
        let framebuffer_width = stream.read_u16().await?;
        let framebuffer_height = stream.read_u16().await?;
        let pixel_format = PixelFormat::read_from(stream).await?;

        let name_len = stream.read_u32().await? as usize;
        let mut name_buf = vec![0u8; name_len];
        stream.read_bytes(&mut name_buf).await?;
        let name = String::from_utf8_lossy(&name_buf).into_owned();

        Ok(Self {
            framebuffer_width,
            framebuffer_height,
            pixel_format,
            name,
        })
    }
}

/// Header of a FramebufferUpdate message, read after the type byte.
///
/// Wire: `pad; u16 n_rects`. The rectangle stream follows.
#[derive(Debug, Clone, Copy)]
pub struct FramebufferUpdateHeader {
    pub n_rects: u16,
}

impl FramebufferUpdateHeader {
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut WireReader<R>,
    ) -> std::io::Result<Self> {
        stream.skip(1).await?;
        let n_rects = stream.read_u16().await?;
        Ok(Self { n_rects })
    }
}

/// SetColourMapEntries body. The client never requests a colour-mapped
/// format, so this is parsed only to keep the counts for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct SetColourMapEntries {
    pub first_colour: u16,
    pub n_colours: u16,
}

impl SetColourMapEntries {
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut WireReader<R>,
    ) -> std::io::Result<Self> {
        stream.skip(1).await?;
        let first_colour = stream.read_u16().await?;
        let n_colours = stream.read_u16().await?;
        stream.skip(n_colours as usize * 6).await?;
        Ok(Self {
            first_colour,
            n_colours,
        })
    }
}

/// ServerCutText: clipboard contents pushed by the server.
///
/// Wire: `pad[3]; u32 length; text[length]`.
#[derive(Debug, Clone)]
pub struct ServerCutText {
    pub text: String,
}

impl ServerCutText {
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut WireReader<R>,
    ) -> std::io::Result<Self> {
        stream.skip(3).await?;
        let length = stream.read_u32().await? as usize;
        let mut buf = vec![0u8; length];
        stream.read_bytes(&mut buf).await?;
        Ok(Self {
            text: String::from_utf8_lossy(&buf).into_owned(),
        })
    }
}
