//! Persistent inflate contexts.
//!
//! The protocol carries up to five independent deflate streams per
//! connection: one for the generic Zlib encoding and four for Tight
//! (selected by the low two bits of the Tight control byte). Each stream's
//! history spans rectangles and messages, so the contexts must live for the
//! whole session.
//!
//! Contexts are created lazily on first use and released exactly once per
//! reset request; inflating on a reset stream starts a fresh context. All
//! inflation uses `SyncFlush` so every call surfaces as much output as the
//! input allows.

use anyhow::{Context, Result};
use flate2::{Decompress, FlushDecompress, Status};

/// Index of the generic Zlib encoding's stream.
pub const GENERIC_STREAM: usize = 0;

/// First index of the Tight streams; Tight stream id `n` lives at
/// `TIGHT_STREAM_BASE + n`.
pub const TIGHT_STREAM_BASE: usize = 1;

/// Number of Tight streams.
pub const TIGHT_STREAM_COUNT: usize = 4;

const STREAM_COUNT: usize = TIGHT_STREAM_BASE + TIGHT_STREAM_COUNT;

/// The set of lazily-initialized, individually-resettable inflate contexts.
pub struct ZlibStreamSet {
    streams: [Option<Decompress>; STREAM_COUNT],
}

impl ZlibStreamSet {
    /// Create a set with every stream inactive.
    pub fn new() -> Self {
        Self {
            streams: Default::default(),
        }
    }

    /// True if the stream has been initialized and not reset since.
    pub fn is_active(&self, index: usize) -> bool {
        self.streams[index].is_some()
    }

    /// Release a stream's inflate state and clear its active flag.
    ///
    /// Idempotent: resetting an inactive stream is a no-op, so a reset bit
    /// from the server releases the context exactly once.
    pub fn reset(&mut self, index: usize) {
        if self.streams[index].take().is_some() {
            tracing::debug!("released inflate context for stream {}", index);
        }
    }

    /// Release every stream (connection teardown).
    pub fn reset_all(&mut self) {
        for index in 0..STREAM_COUNT {
            self.reset(index);
        }
    }

    /// Inflate as much of `input` into `output` as fits, with `SyncFlush`.
    ///
    /// Initializes the stream if it is not active. Returns the consumed
    /// input byte count, the produced output byte count, and the inflater
    /// status; the caller decides whether a short read means "input
    /// exhausted" or "output full".
    pub fn inflate(
        &mut self,
        index: usize,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<(usize, usize, Status)> {
        let stream = self.streams[index].get_or_insert_with(|| Decompress::new(true));

        let in_before = stream.total_in();
        let out_before = stream.total_out();
        let status = stream
            .decompress(input, output, FlushDecompress::Sync)
            .with_context(|| format!("inflate failed on stream {}", index))?;
        let consumed = (stream.total_in() - in_before) as usize;
        let produced = (stream.total_out() - out_before) as usize;

        Ok((consumed, produced, status))
    }
}

impl Default for ZlibStreamSet {
    fn default() -> Self {
        Self::new()
    }
}
