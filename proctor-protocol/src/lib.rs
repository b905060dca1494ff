//! Wire codec and message types for the proctor remote framebuffer protocol.
//!
//! This crate owns everything that touches raw protocol bytes:
//!
//! - [`io`] - buffered async streams with network-byte-order primitives
//! - [`messages`] - client and server message types and encoding constants
//! - [`handshake`] - protocol greeting parse and echo
//!
//! Policy throughout is fail-fast: malformed data produces an error
//! immediately, never a silent fallback.

pub mod handshake;
pub mod io;
pub mod messages;

pub use io::{WireReader, WireWriter};
