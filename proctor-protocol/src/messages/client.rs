//! Client-to-server messages.
//!
//! Each message is a small fixed-format record: a type byte followed by its
//! fields in network byte order. Writers only fill the output buffer; the
//! caller flushes, so a message always leaves the client in one piece.

use crate::io::WireWriter;
use crate::messages::types::PixelFormat;
use tokio::io::AsyncWrite;

/// Message type byte for SetPixelFormat.
pub const MSG_SET_PIXEL_FORMAT: u8 = 0;
/// Message type byte for SetEncodings.
pub const MSG_SET_ENCODINGS: u8 = 2;
/// Message type byte for FramebufferUpdateRequest.
pub const MSG_FRAMEBUFFER_UPDATE_REQUEST: u8 = 3;
/// Message type byte for KeyEvent.
pub const MSG_KEY_EVENT: u8 = 4;
/// Message type byte for PointerEvent.
pub const MSG_POINTER_EVENT: u8 = 5;

/// ClientInit: one byte requesting a shared (1) or exclusive (0) session.
#[derive(Debug, Clone, Copy)]
pub struct ClientInit {
    pub shared: bool,
}

impl ClientInit {
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut WireWriter<W>) {
        stream.write_u8(self.shared as u8);
    }
}

/// SetPixelFormat: asks the server to send pixels in the given format.
///
/// Wire: `type=0; pad[3]; pixel_format (16 bytes)`.
#[derive(Debug, Clone, Copy)]
pub struct SetPixelFormat {
    pub pixel_format: PixelFormat,
}

impl SetPixelFormat {
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut WireWriter<W>) {
        stream.write_u8(MSG_SET_PIXEL_FORMAT);
        stream.write_bytes(&[0, 0, 0]);
        self.pixel_format.write_to(stream);
    }
}

/// SetEncodings: advertises the encodings the client can decode, in
/// preference order.
///
/// Wire: `type=2; pad; u16 count; i32 encoding * count`.
#[derive(Debug, Clone)]
pub struct SetEncodings {
    pub encodings: Vec<i32>,
}

impl SetEncodings {
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut WireWriter<W>) {
        stream.write_u8(MSG_SET_ENCODINGS);
        stream.write_u8(0);
        stream.write_u16(self.encodings.len() as u16);
        for &encoding in &self.encodings {
            stream.write_i32(encoding);
        }
    }
}

/// FramebufferUpdateRequest: asks for the given region, incrementally or in
/// full.
///
/// Wire: `type=3; u8 incremental; u16 x, y, w, h`.
#[derive(Debug, Clone, Copy)]
pub struct FramebufferUpdateRequest {
    pub incremental: bool,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl FramebufferUpdateRequest {
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut WireWriter<W>) {
        stream.write_u8(MSG_FRAMEBUFFER_UPDATE_REQUEST);
        stream.write_u8(self.incremental as u8);
        stream.write_u16(self.x);
        stream.write_u16(self.y);
        stream.write_u16(self.width);
        stream.write_u16(self.height);
    }
}

/// KeyEvent: a key press or release identified by its X11 keysym.
///
/// Wire: `type=4; u8 down; pad[2]; u32 keysym`.
#[derive(Debug, Clone, Copy)]
pub struct KeyEvent {
    pub down: bool,
    pub keysym: u32,
}

impl KeyEvent {
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut WireWriter<W>) {
        stream.write_u8(MSG_KEY_EVENT);
        stream.write_u8(self.down as u8);
        stream.write_bytes(&[0, 0]);
        stream.write_u32(self.keysym);
    }
}

/// PointerEvent: pointer position plus a button state bitmask.
///
/// Wire: `type=5; u8 button_mask; u16 x, y`.
#[derive(Debug, Clone, Copy)]
pub struct PointerEvent {
    pub button_mask: u8,
    pub x: u16,
    pub y: u16,
}

impl PointerEvent {
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut WireWriter<W>) {
        stream.write_u8(MSG_POINTER_EVENT);
        stream.write_u8(self.button_mask);
        stream.write_u16(self.x);
        stream.write_u16(self.y);
    }
}
