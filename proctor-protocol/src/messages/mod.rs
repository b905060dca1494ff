//! Protocol message types.
//!
//! Split by direction, following the wire surface:
//! - [`types`] - shared building blocks (pixel format, rectangle header) and
//!   the encoding number tables
//! - [`client`] - client-to-server messages
//! - [`server`] - server-to-client messages

pub mod client;
pub mod server;
pub mod types;

pub use client::{
    ClientInit, FramebufferUpdateRequest, KeyEvent, PointerEvent, SetEncodings, SetPixelFormat,
};
pub use server::{FramebufferUpdateHeader, ServerCutText, ServerInit, SetColourMapEntries};
pub use types::{PixelFormat, Rectangle};
