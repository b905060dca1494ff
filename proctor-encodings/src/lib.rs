//! Rectangle decoders for the proctor remote framebuffer client.
//!
//! The server tiles every framebuffer update into rectangles, each carrying
//! one of the encodings this crate decodes: Raw, CopyRect, CoRRE, Zlib,
//! Tight (Copy/Palette/Gradient filters plus an optional JPEG sub-mode), the
//! LZO+RLE Italc encoding, and the two cursor shape encodings.
//!
//! All decoding funnels through one [`RectDecoder`] value owned by the
//! dispatcher. It holds every piece of state that persists across updates:
//! the shared scratch buffer, the zlib read-staging buffer, the five inflate
//! contexts, the grow-only raw decompression buffer, and the Tight filter
//! state (palette and gradient previous-row). Encodings are selected by a
//! plain match in the dispatcher; there is no per-encoding dynamic dispatch.
//!
//! Errors are fatal to the enclosing update: a decoder that fails leaves the
//! screen in whatever state it reached, and the connection is torn down by
//! the caller.

use proctor_screen::format;

pub mod copyrect;
pub mod corre;
pub mod cursor;
pub mod italc;
pub mod raw;
pub mod tight;
pub mod zlib;
pub mod zlib_streams;

pub use zlib_streams::{ZlibStreamSet, GENERIC_STREAM, TIGHT_STREAM_BASE, TIGHT_STREAM_COUNT};

/// Size of the shared scratch buffer. Large enough that every decoder can
/// stage at least one full scan line of any rectangle the Tight encoder may
/// produce.
pub const BUFFER_SIZE: usize = 16384;

/// Size of the staging buffer for compressed Tight data read off the wire.
pub const ZLIB_BUFFER_SIZE: usize = 512;

/// Widest rectangle the Tight decoder accepts; also sizes the gradient
/// filter's previous-row buffer.
pub const TIGHT_MAX_WIDTH: usize = 2048;

/// Whether this build can decode Tight JPEG sub-rectangles.
pub const JPEG_SUPPORTED: bool = cfg!(feature = "jpeg");

/// Persistent decoder state, owned by the dispatcher.
///
/// One instance lives for the whole connection; nothing here is shared
/// between tasks.
pub struct RectDecoder {
    /// Shared scratch for wire reads and decompressed filter input.
    pub(crate) buffer: Vec<u8>,
    /// Staging buffer for compressed Tight data.
    pub(crate) zlib_buffer: Vec<u8>,
    /// The five persistent inflate contexts (1 generic + 4 Tight).
    pub(crate) streams: ZlibStreamSet,
    /// Grow-only output buffer for the Zlib encoding.
    pub(crate) raw_buffer: Vec<u8>,
    /// Tight palette, up to 256 entries in the local pixel format.
    pub(crate) palette: Box<[u32; 256]>,
    /// Number of valid entries in `palette`.
    pub(crate) palette_colors: usize,
    /// Gradient filter previous-row state, 3 channels per pixel.
    pub(crate) prev_row: Box<[u16]>,
    /// Filter output staging, one `u32` per pixel.
    pub(crate) row_out: Vec<u32>,
}

impl RectDecoder {
    /// Create a decoder with empty persistent state.
    pub fn new() -> Self {
        Self {
            buffer: vec![0; BUFFER_SIZE],
            zlib_buffer: vec![0; ZLIB_BUFFER_SIZE],
            streams: ZlibStreamSet::new(),
            raw_buffer: Vec::new(),
            palette: Box::new([0; 256]),
            palette_colors: 0,
            prev_row: vec![0u16; TIGHT_MAX_WIDTH * 3].into_boxed_slice(),
            row_out: Vec::new(),
        }
    }

    /// Release every inflate context, as done when the connection closes.
    pub fn reset_streams(&mut self) {
        self.streams.reset_all();
    }

    /// The stream set, exposed for the dispatcher's teardown path and tests.
    pub fn streams(&self) -> &ZlibStreamSet {
        &self.streams
    }
}

impl Default for RectDecoder {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) use format::rgb_to_pixel;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_decoder_has_no_active_streams() {
        let decoder = RectDecoder::new();
        for idx in 0..5 {
            assert!(!decoder.streams().is_active(idx));
        }
    }

    #[test]
    fn test_buffer_sizes() {
        let decoder = RectDecoder::new();
        assert_eq!(decoder.buffer.len(), BUFFER_SIZE);
        assert_eq!(decoder.zlib_buffer.len(), ZLIB_BUFFER_SIZE);
        assert!(decoder.raw_buffer.is_empty());
        assert_eq!(decoder.prev_row.len(), TIGHT_MAX_WIDTH * 3);
    }
}
