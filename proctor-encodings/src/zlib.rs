//! Zlib encoding: one deflate stream over raw pixel data.
//!
//! Wire format: `u32 n_bytes` of compressed data that inflates to exactly
//! `w * h * 4` bytes of local-format pixels. The stream's dictionary
//! persists across rectangles, so the whole connection shares inflate
//! context [`GENERIC_STREAM`].
//!
//! The decompression target is the grow-only raw buffer: with a fixed pixel
//! size and framebuffer geometry the first full-screen update sizes it once
//! and later rectangles reuse it.

use crate::{RectDecoder, BUFFER_SIZE, GENERIC_STREAM};
use anyhow::{bail, Context, Result};
use flate2::Status;
use proctor_protocol::WireReader;
use proctor_screen::ScreenBuffer;
use tokio::io::AsyncRead;

impl RectDecoder {
    /// Decode a Zlib rectangle.
    pub async fn decode_zlib<R: AsyncRead + Unpin>(
        &mut self,
        stream: &mut WireReader<R>,
        screen: &mut ScreenBuffer,
        x: u16,
        y: u16,
        w: u16,
        h: u16,
    ) -> Result<()> {
        let expected = w as usize * h as usize * 4;
        if self.raw_buffer.len() < expected {
            self.raw_buffer.resize(expected, 0);
        }

        let n_bytes = stream
            .read_u32()
            .await
            .context("failed to read Zlib header")? as usize;

        let Self {
            buffer,
            streams,
            raw_buffer,
            ..
        } = self;

        let mut remaining = n_bytes;
        let mut out_pos = 0usize;
        while remaining > 0 {
            let to_read = remaining.min(BUFFER_SIZE);
            stream
                .read_bytes(&mut buffer[..to_read])
                .await
                .context("failed to read Zlib data")?;
            remaining -= to_read;

            let mut consumed = 0usize;
            while consumed < to_read {
                let (c, p, status) = streams.inflate(
                    GENERIC_STREAM,
                    &buffer[consumed..to_read],
                    &mut raw_buffer[out_pos..expected],
                )?;
                consumed += c;
                out_pos += p;

                if consumed < to_read && out_pos >= expected {
                    bail!("Zlib inflate ran out of output space");
                }
                if c == 0 && p == 0 {
                    bail!("Zlib inflate made no progress (status {:?})", status);
                }
                if status == Status::StreamEnd {
                    break;
                }
            }
        }

        if out_pos != expected {
            bail!(
                "Zlib rectangle inflated to {} bytes, expected {}",
                out_pos,
                expected
            );
        }

        screen.copy_rect_from_ne_bytes(x, y, w, h, &raw_buffer[..expected]);
        Ok(())
    }
}
