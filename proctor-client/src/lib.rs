//! Connection state machine and update dispatcher for the proctor client.
//!
//! This crate ties the lower layers together into the client core: it
//! performs the protocol handshake, drives the rectangle decoders from
//! incoming framebuffer updates, maintains the shared screen / scaled-screen
//! / cursor state, emits change notifications, and encodes the outbound
//! input events.
//!
//! The core is transport-agnostic: it owns buffered reader/writer halves
//! over any `AsyncRead`/`AsyncWrite` pair. Connection setup, timeouts and
//! authentication secrets live in collaborators: the [`LowerConnection`]
//! trait is the seam to the authentication/ISD layer, and [`EventSink`] is
//! the seam to whoever repaints.
//!
//! # Concurrency
//!
//! A single driver task owns the [`ClientConnection`] and with it the
//! transport and all decoder state. UI consumers share the screen through
//! its read/write lock; the write lock is held for the whole duration of one
//! framebuffer update so readers never observe a half-decoded frame. The
//! scaled screen and the cursor have their own locks; when locks are
//! combined, the screen lock is always the outer one.

pub mod connection;
pub mod errors;
pub mod events;
pub mod lower;
pub mod quality;
pub mod state;

pub use connection::{ClientConnection, CursorState};
pub use errors::ClientError;
pub use events::{ChannelEventSink, ClientEvent, EventSink, NullEventSink};
pub use lower::{AuthMode, LowerConnection, NoopLower};
pub use quality::Quality;
pub use state::ConnectionState;
