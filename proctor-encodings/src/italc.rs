//! Italc encoding: LZO1X-compressed run-length pixel data.
//!
//! Wire format: `u8 compressed; u32 bytes_lzo; u32 bytes_rle` (the length
//! fields only when compressed). An uncompressed rectangle is plain Raw
//! data. A compressed one is `bytes_lzo` bytes of LZO1X that must expand to
//! exactly `bytes_rle` bytes of run-length groups.
//!
//! Each group is a little-endian u32: the low 24 bits are the pixel, the
//! high byte is the run length minus one. Runs are emitted in raster order
//! from the rectangle's top-left corner, wrapping at its right edge onto the
//! next screen row, and stop at the bottom of the screen.

use crate::RectDecoder;
use anyhow::{anyhow, bail, Context, Result};
use proctor_protocol::WireReader;
use proctor_screen::ScreenBuffer;
use tokio::io::AsyncRead;

impl RectDecoder {
    /// Decode an Italc rectangle.
    pub async fn decode_italc<R: AsyncRead + Unpin>(
        &mut self,
        stream: &mut WireReader<R>,
        screen: &mut ScreenBuffer,
        x: u16,
        y: u16,
        w: u16,
        h: u16,
    ) -> Result<()> {
        let compressed = stream
            .read_u8()
            .await
            .context("failed to read Italc header")?;
        if compressed == 0 {
            return self.decode_raw(stream, screen, x, y, w, h).await;
        }

        let bytes_lzo = stream
            .read_u32()
            .await
            .context("failed to read Italc header")? as usize;
        let bytes_rle = stream
            .read_u32()
            .await
            .context("failed to read Italc header")? as usize;

        let mut lzo_data = vec![0u8; bytes_lzo];
        stream
            .read_bytes(&mut lzo_data)
            .await
            .context("failed to read Italc compressed data")?;

        let rle = minilzo::decompress(&lzo_data, bytes_rle)
            .map_err(|e| anyhow!("Italc: LZO decompression failed: {:?}", e))?;
        if rle.len() != bytes_rle {
            bail!(
                "Italc: expected and real size of decompressed data do not match ({} != {})",
                rle.len(),
                bytes_rle
            );
        }

        let screen_height = screen.height();
        let mut dx: u16 = 0;
        let mut row = y;
        'groups: for group in rle.chunks_exact(4) {
            let value = u32::from_le_bytes([group[0], group[1], group[2], group[3]]) & 0x00FF_FFFF;
            let run = group[3] as u16;
            for _ in 0..=run {
                screen.scan_line(row)[(x + dx) as usize] = value;
                dx += 1;
                if dx >= w {
                    dx = 0;
                    if row + 1 < screen_height {
                        row += 1;
                    } else {
                        break 'groups;
                    }
                }
            }
        }

        if dx != 0 {
            tracing::warn!(
                "Italc rectangle ended mid-row (dx = {} of {} pixels)",
                dx,
                w
            );
        }

        Ok(())
    }
}
