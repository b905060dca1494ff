//! Raw encoding: uncompressed pixel data.
//!
//! The simplest encoding: `width * height * 4` bytes of pixels in the local
//! format, row-major. Data is read in batches of whole scan lines sized to
//! the shared scratch buffer and copied row by row, preserving the screen's
//! stride.

use crate::{RectDecoder, BUFFER_SIZE};
use anyhow::{Context, Result};
use proctor_protocol::WireReader;
use proctor_screen::ScreenBuffer;
use tokio::io::AsyncRead;

impl RectDecoder {
    /// Decode a Raw rectangle at `(x, y)` of size `w * h`.
    pub async fn decode_raw<R: AsyncRead + Unpin>(
        &mut self,
        stream: &mut WireReader<R>,
        screen: &mut ScreenBuffer,
        x: u16,
        y: u16,
        w: u16,
        h: u16,
    ) -> Result<()> {
        if w == 0 || h == 0 {
            return Ok(());
        }

        let row_bytes = w as usize * 4;
        let lines_per_batch = ((BUFFER_SIZE / row_bytes).max(1) as u16).min(h);

        let mut row = y;
        let mut remaining = h;
        while remaining > 0 {
            let lines = lines_per_batch.min(remaining);
            let batch_bytes = lines as usize * row_bytes;

            if batch_bytes <= self.buffer.len() {
                stream
                    .read_bytes(&mut self.buffer[..batch_bytes])
                    .await
                    .context("failed to read raw pixel data")?;
                screen.copy_rect_from_ne_bytes(x, row, w, lines, &self.buffer[..batch_bytes]);
            } else {
                // A single scan line wider than the scratch buffer.
                let mut line = vec![0u8; batch_bytes];
                stream
                    .read_bytes(&mut line)
                    .await
                    .context("failed to read raw pixel data")?;
                screen.copy_rect_from_ne_bytes(x, row, w, lines, &line);
            }

            row += lines;
            remaining -= lines;
        }

        Ok(())
    }
}
