//! Tight encoding: filtered zlib streams with an optional JPEG sub-mode.
//!
//! One control byte steers everything:
//!
//! - Low 4 bits: reset flags for the four Tight inflate streams. Each set
//!   bit releases that stream's context before any payload is read.
//! - High 4 bits: `0x8` = Fill (one solid pixel), `0x9` = JPEG, anything
//!   up to `0x9` otherwise is basic mode, where bits 0-1 pick the inflate
//!   stream and bit 2 announces an explicit filter byte.
//!
//! Basic-mode payloads run through one of three filters before landing on
//! the screen:
//!
//! - **Copy**: rows are already packed local-format pixels.
//! - **Palette**: indexed colour; a 2-colour palette packs one bit per pixel
//!   (MSB first, rows padded to whole bytes), larger palettes use one byte
//!   per pixel.
//! - **Gradient**: each channel is predicted from the left, upper and
//!   upper-left neighbours (clamped to the channel range) and the wire
//!   carries the per-channel delta.
//!
//! Payloads shorter than [`TIGHT_MIN_TO_COMPRESS`] bytes arrive uncompressed.
//! Longer ones are a compact length followed by deflate data, inflated in
//! [`ZLIB_BUFFER_SIZE`] chunks; whole rows are filtered and flushed to the
//! screen as they become available, and partial-row leftovers move to the
//! front of the scratch buffer for the next chunk.

use crate::{rgb_to_pixel, RectDecoder, BUFFER_SIZE, TIGHT_MAX_WIDTH, TIGHT_STREAM_BASE, ZLIB_BUFFER_SIZE};
use anyhow::{bail, Context, Result};
use flate2::Status;
use proctor_protocol::WireReader;
use proctor_screen::format::{CHANNEL_MAXES, CHANNEL_SHIFTS};
use proctor_screen::ScreenBuffer;
use tokio::io::AsyncRead;

// Control byte values after the reset bits are shifted out.
const TIGHT_FILL: u8 = 0x08;
const TIGHT_JPEG: u8 = 0x09;
const TIGHT_MAX_SUBENCODING: u8 = 0x09;
const TIGHT_EXPLICIT_FILTER: u8 = 0x04;

// Filter ids following the control byte when the explicit-filter bit is set.
const TIGHT_FILTER_COPY: u8 = 0x00;
const TIGHT_FILTER_PALETTE: u8 = 0x01;
const TIGHT_FILTER_GRADIENT: u8 = 0x02;

/// Payloads below this byte count are never compressed.
pub const TIGHT_MIN_TO_COMPRESS: usize = 12;

/// The filter applied to basic-mode pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TightFilter {
    Copy,
    Palette,
    Gradient,
}

impl RectDecoder {
    /// Decode a Tight rectangle.
    pub async fn decode_tight<R: AsyncRead + Unpin>(
        &mut self,
        stream: &mut WireReader<R>,
        screen: &mut ScreenBuffer,
        x: u16,
        y: u16,
        w: u16,
        h: u16,
    ) -> Result<()> {
        let comp_ctl = stream
            .read_u8()
            .await
            .context("failed to read Tight control byte")?;

        // Server-requested stream resets come first, whatever follows.
        for id in 0..4 {
            if comp_ctl & (1 << id) != 0 {
                self.streams.reset(TIGHT_STREAM_BASE + id);
            }
        }

        let ctl = comp_ctl >> 4;

        if ctl == TIGHT_FILL {
            let mut pixel = [0u8; 4];
            stream
                .read_bytes(&mut pixel)
                .await
                .context("failed to read Tight fill pixel")?;
            screen.fill_rect(x, y, w, h, u32::from_ne_bytes(pixel));
            return Ok(());
        }

        if ctl == TIGHT_JPEG {
            return self.decode_tight_jpeg(stream, screen, x, y, w, h).await;
        }

        if ctl > TIGHT_MAX_SUBENCODING {
            bail!("Tight: bad subencoding value {:#04x}", comp_ctl);
        }

        if w as usize > TIGHT_MAX_WIDTH {
            bail!("Tight: rectangle too wide ({} > {})", w, TIGHT_MAX_WIDTH);
        }

        let stream_index = TIGHT_STREAM_BASE + (ctl & 0x03) as usize;

        let filter = if ctl & TIGHT_EXPLICIT_FILTER != 0 {
            match stream
                .read_u8()
                .await
                .context("failed to read Tight filter id")?
            {
                TIGHT_FILTER_COPY => TightFilter::Copy,
                TIGHT_FILTER_PALETTE => TightFilter::Palette,
                TIGHT_FILTER_GRADIENT => TightFilter::Gradient,
                other => bail!("Tight: unknown filter id {}", other),
            }
        } else {
            TightFilter::Copy
        };

        let bits_per_pixel: usize = match filter {
            TightFilter::Copy => 32,
            TightFilter::Gradient => {
                self.prev_row[..w as usize * 3].fill(0);
                32
            }
            TightFilter::Palette => {
                let colors = stream
                    .read_u8()
                    .await
                    .context("failed to read Tight palette size")? as usize
                    + 1;
                let mut entry = [0u8; 4];
                for slot in self.palette.iter_mut().take(colors) {
                    stream
                        .read_bytes(&mut entry)
                        .await
                        .context("failed to read Tight palette entry")?;
                    *slot = u32::from_ne_bytes(entry);
                }
                self.palette_colors = colors;
                if colors == 2 {
                    1
                } else {
                    8
                }
            }
        };

        let row_size = (w as usize * bits_per_pixel + 7) / 8;

        let Self {
            buffer,
            zlib_buffer,
            streams,
            palette,
            palette_colors,
            prev_row,
            row_out,
            ..
        } = self;

        // Short payloads come through uncompressed.
        if h as usize * row_size < TIGHT_MIN_TO_COMPRESS {
            let len = h as usize * row_size;
            stream
                .read_bytes(&mut buffer[..len])
                .await
                .context("failed to read uncompressed Tight data")?;
            apply_filter(
                filter,
                &buffer[..len],
                h as usize,
                w as usize,
                palette,
                *palette_colors,
                prev_row,
                row_out,
            );
            screen.copy_rect_from(x, y, w, h, row_out);
            return Ok(());
        }

        let compressed_len = stream
            .read_compact_len()
            .await
            .context("failed to read Tight compressed length")? as usize;
        if compressed_len == 0 {
            bail!("Tight: zero-length compressed data");
        }

        // Room in the scratch buffer for inflated filter input. Sized so the
        // widest permitted row always fits, which guarantees each inflate
        // pass frees space once whole rows are flushed.
        let buffer_size = (BUFFER_SIZE * bits_per_pixel / (bits_per_pixel + 32)) & !3;
        if row_size > buffer_size {
            bail!("Tight: internal scratch buffer too small for row size {}", row_size);
        }

        let mut rows_processed: u16 = 0;
        let mut filled = 0usize;
        let mut remaining = compressed_len;

        while remaining > 0 {
            let portion = remaining.min(ZLIB_BUFFER_SIZE);
            stream
                .read_bytes(&mut zlib_buffer[..portion])
                .await
                .context("failed to read Tight compressed data")?;
            remaining -= portion;

            let mut consumed = 0usize;
            while consumed < portion {
                let (c, p, status) = streams.inflate(
                    stream_index,
                    &zlib_buffer[consumed..portion],
                    &mut buffer[filled..buffer_size],
                )?;
                consumed += c;
                filled += p;

                let num_rows = filled / row_size;
                if num_rows > (h - rows_processed) as usize {
                    bail!("Tight: more scan lines than the rectangle holds");
                }
                if num_rows > 0 {
                    apply_filter(
                        filter,
                        &buffer[..num_rows * row_size],
                        num_rows,
                        w as usize,
                        palette,
                        *palette_colors,
                        prev_row,
                        row_out,
                    );
                    screen.copy_rect_from(x, y + rows_processed, w, num_rows as u16, row_out);
                    rows_processed += num_rows as u16;

                    // Carry the partial-row tail to the front of the scratch.
                    buffer.copy_within(num_rows * row_size..filled, 0);
                    filled -= num_rows * row_size;
                }

                if c == 0 && p == 0 {
                    bail!("Tight: inflate ran out of buffer space (status {:?})", status);
                }
                if status == Status::StreamEnd {
                    break;
                }
            }
        }

        if rows_processed != h {
            bail!(
                "Tight: incorrect number of scan lines after decompression ({} != {})",
                rows_processed,
                h
            );
        }

        Ok(())
    }

    #[cfg(feature = "jpeg")]
    async fn decode_tight_jpeg<R: AsyncRead + Unpin>(
        &mut self,
        stream: &mut WireReader<R>,
        screen: &mut ScreenBuffer,
        x: u16,
        y: u16,
        w: u16,
        h: u16,
    ) -> Result<()> {
        use anyhow::anyhow;

        let len = stream
            .read_compact_len()
            .await
            .context("failed to read Tight JPEG length")? as usize;
        let mut data = vec![0u8; len];
        stream
            .read_bytes(&mut data)
            .await
            .context("failed to read Tight JPEG data")?;

        let mut decoder = jpeg_decoder::Decoder::new(std::io::Cursor::new(&data[..]));
        let rgb = decoder.decode().context("Tight: JPEG decode failed")?;
        let info = decoder
            .info()
            .ok_or_else(|| anyhow!("Tight: JPEG decoder produced no metadata"))?;

        if info.width != w || info.height != h {
            bail!(
                "Tight: JPEG dimensions {}x{} do not match rectangle {}x{}",
                info.width,
                info.height,
                w,
                h
            );
        }
        if info.pixel_format != jpeg_decoder::PixelFormat::RGB24 {
            bail!("Tight: JPEG is not 3-component RGB");
        }

        let row_out = &mut self.row_out;
        for row in 0..h {
            row_out.clear();
            let src = &rgb[row as usize * w as usize * 3..];
            for px in 0..w as usize {
                row_out.push(rgb_to_pixel(
                    src[px * 3] as u32,
                    src[px * 3 + 1] as u32,
                    src[px * 3 + 2] as u32,
                ));
            }
            screen.copy_rect_from(x, y + row, w, 1, row_out);
        }

        Ok(())
    }

    #[cfg(not(feature = "jpeg"))]
    async fn decode_tight_jpeg<R: AsyncRead + Unpin>(
        &mut self,
        _stream: &mut WireReader<R>,
        _screen: &mut ScreenBuffer,
        _x: u16,
        _y: u16,
        _w: u16,
        _h: u16,
    ) -> Result<()> {
        bail!("Tight: JPEG rectangle received but JPEG support is not compiled in")
    }
}

/// Expand `num_rows` rows of filter input into local-format pixels.
#[allow(clippy::too_many_arguments)]
fn apply_filter(
    filter: TightFilter,
    src: &[u8],
    num_rows: usize,
    width: usize,
    palette: &[u32; 256],
    palette_colors: usize,
    prev_row: &mut [u16],
    out: &mut Vec<u32>,
) {
    out.clear();
    match filter {
        TightFilter::Copy => filter_copy(src, num_rows, width, out),
        TightFilter::Palette => filter_palette(src, num_rows, width, palette, palette_colors, out),
        TightFilter::Gradient => filter_gradient(src, num_rows, width, prev_row, out),
    }
}

/// Copy filter: rows are packed local-format pixels already.
fn filter_copy(src: &[u8], num_rows: usize, width: usize, out: &mut Vec<u32>) {
    out.extend(
        src.chunks_exact(4)
            .take(num_rows * width)
            .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]])),
    );
}

/// Palette filter: expand indices through the palette.
fn filter_palette(
    src: &[u8],
    num_rows: usize,
    width: usize,
    palette: &[u32; 256],
    palette_colors: usize,
    out: &mut Vec<u32>,
) {
    if palette_colors == 2 {
        // 1 bpp, MSB first, rows padded to whole bytes.
        let bytes_per_row = (width + 7) / 8;
        for row in 0..num_rows {
            for px in 0..width {
                let bit = (src[row * bytes_per_row + px / 8] >> (7 - (px % 8))) & 1;
                out.push(palette[bit as usize]);
            }
        }
    } else {
        for row in 0..num_rows {
            for px in 0..width {
                out.push(palette[src[row * width + px] as usize]);
            }
        }
    }
}

/// Gradient filter: per-channel prediction from the left, upper and
/// upper-left neighbours, delta-corrected by the wire data.
///
/// `prev_row` carries the reconstructed channel values of the previous scan
/// line across batches within one rectangle; the caller zeroes it when the
/// filter is selected.
fn filter_gradient(
    src: &[u8],
    num_rows: usize,
    width: usize,
    prev_row: &mut [u16],
    out: &mut Vec<u32>,
) {
    let mut this_row = vec![0u16; width * 3];
    for row in 0..num_rows {
        let mut left = [0u16; 3];
        for px in 0..width {
            let idx = (row * width + px) * 4;
            let raw = u32::from_ne_bytes([src[idx], src[idx + 1], src[idx + 2], src[idx + 3]]);
            let mut pix = [0u16; 3];
            for c in 0..3 {
                let predicted = if px == 0 {
                    prev_row[c] as i32
                } else {
                    let estimate = prev_row[px * 3 + c] as i32 + left[c] as i32
                        - prev_row[(px - 1) * 3 + c] as i32;
                    estimate.clamp(0, CHANNEL_MAXES[c] as i32)
                };
                let delta = raw >> CHANNEL_SHIFTS[c];
                pix[c] =
                    (delta.wrapping_add(predicted as u32) & CHANNEL_MAXES[c] as u32) as u16;
                this_row[px * 3 + c] = pix[c];
            }
            out.push(rgb_to_pixel(pix[0] as u32, pix[1] as u32, pix[2] as u32));
            left = pix;
        }
        prev_row[..width * 3].copy_from_slice(&this_row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn compact_len(mut len: usize) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let mut byte = (len & 0x7F) as u8;
            len >>= 7;
            if len != 0 {
                byte |= 0x80;
            }
            out.push(byte);
            if len == 0 {
                return out;
            }
        }
    }

    #[tokio::test]
    async fn test_fill_is_idempotent_over_prior_contents() {
        let mut decoder = RectDecoder::new();
        let mut screen = ScreenBuffer::new(10, 10);
        screen.fill_rect(0, 0, 10, 10, 0xDEAD);

        // control 0x80 = Fill, then the 4-byte pixel.
        let mut data = vec![0x80u8];
        data.extend_from_slice(&0x123456u32.to_ne_bytes());
        let mut stream = WireReader::new(Cursor::new(data));

        decoder
            .decode_tight(&mut stream, &mut screen, 0, 0, 10, 10)
            .await
            .unwrap();
        assert!(screen.data().iter().all(|&p| p == 0x123456));
    }

    #[tokio::test]
    async fn test_palette_two_colors_inline() {
        // control 0x40 = explicit filter on stream 0; Palette filter with
        // {black, white}; 3x1 bits 101 (MSB first) arrive uncompressed
        // because 1 byte < TIGHT_MIN_TO_COMPRESS.
        let mut decoder = RectDecoder::new();
        let mut screen = ScreenBuffer::new(3, 1);
        let mut data = vec![0x40u8, TIGHT_FILTER_PALETTE, 1];
        data.extend_from_slice(&0x000000u32.to_ne_bytes());
        data.extend_from_slice(&0xFFFFFFu32.to_ne_bytes());
        data.push(0xA0);
        let mut stream = WireReader::new(Cursor::new(data));

        decoder
            .decode_tight(&mut stream, &mut screen, 0, 0, 3, 1)
            .await
            .unwrap();
        assert_eq!(screen.row(0), &[0xFFFFFF, 0x000000, 0xFFFFFF]);
    }

    #[tokio::test]
    async fn test_palette_indexed_compressed() {
        // An 8-bpp palette rectangle large enough to take the compressed
        // path: 4x4 indices alternating between two of three colors.
        let mut decoder = RectDecoder::new();
        let mut screen = ScreenBuffer::new(4, 4);
        let palette = [0x111111u32, 0x222222, 0x333333];
        let indices: Vec<u8> = (0..16).map(|i| (i % 3) as u8).collect();
        let compressed = deflate(&indices);

        let mut data = vec![0x40u8, TIGHT_FILTER_PALETTE, 2];
        for color in palette {
            data.extend_from_slice(&color.to_ne_bytes());
        }
        data.extend_from_slice(&compact_len(compressed.len()));
        data.extend_from_slice(&compressed);
        let mut stream = WireReader::new(Cursor::new(data));

        decoder
            .decode_tight(&mut stream, &mut screen, 0, 0, 4, 4)
            .await
            .unwrap();
        let expected: Vec<u32> = indices.iter().map(|&i| palette[i as usize]).collect();
        assert_eq!(screen.data(), &expected[..]);
    }

    #[tokio::test]
    async fn test_copy_filter_compressed() {
        let mut decoder = RectDecoder::new();
        let mut screen = ScreenBuffer::new(4, 2);
        let pixels: Vec<u32> = (1..=8).collect();
        let raw: Vec<u8> = pixels.iter().flat_map(|p| p.to_ne_bytes()).collect();
        let compressed = deflate(&raw);

        // Basic mode, stream 0, no explicit filter byte -> Copy.
        let mut data = vec![0x00u8];
        data.extend_from_slice(&compact_len(compressed.len()));
        data.extend_from_slice(&compressed);
        let mut stream = WireReader::new(Cursor::new(data));

        decoder
            .decode_tight(&mut stream, &mut screen, 0, 0, 4, 2)
            .await
            .unwrap();
        assert_eq!(screen.data(), &pixels[..]);
    }

    #[tokio::test]
    async fn test_gradient_zero_deltas_stay_zero() {
        // All-zero deltas against a zero previous row must leave the
        // rectangle zero, and the previous-row state must equal the last
        // scan line afterwards.
        let mut decoder = RectDecoder::new();
        let mut screen = ScreenBuffer::new(4, 3);
        screen.fill_rect(0, 0, 4, 3, 0xFFFFFF); // must be overwritten to zero
        let raw = vec![0u8; 4 * 3 * 4];
        let compressed = deflate(&raw);

        let mut data = vec![0x40u8, TIGHT_FILTER_GRADIENT];
        data.extend_from_slice(&compact_len(compressed.len()));
        data.extend_from_slice(&compressed);
        let mut stream = WireReader::new(Cursor::new(data));

        decoder
            .decode_tight(&mut stream, &mut screen, 0, 0, 4, 3)
            .await
            .unwrap();
        assert!(screen.data().iter().all(|&p| p == 0));
        assert!(decoder.prev_row[..4 * 3].iter().all(|&c| c == 0));
    }

    #[tokio::test]
    async fn test_gradient_horizontal_ramp() {
        // Deltas of +1 on every channel of every pixel produce a ramp along
        // each row: prediction carries the left neighbour forward.
        let mut decoder = RectDecoder::new();
        let mut screen = ScreenBuffer::new(4, 1);
        let delta = 0x00010101u32;
        let raw: Vec<u8> = std::iter::repeat(delta)
            .take(4)
            .flat_map(|p| p.to_ne_bytes())
            .collect();
        let compressed = deflate(&raw);

        let mut data = vec![0x40u8, TIGHT_FILTER_GRADIENT];
        data.extend_from_slice(&compact_len(compressed.len()));
        data.extend_from_slice(&compressed);
        let mut stream = WireReader::new(Cursor::new(data));

        decoder
            .decode_tight(&mut stream, &mut screen, 0, 0, 4, 1)
            .await
            .unwrap();
        assert_eq!(
            screen.row(0),
            &[0x00010101, 0x00020202, 0x00030303, 0x00040404]
        );
    }

    #[tokio::test]
    async fn test_stream_reset_bit_releases_context() {
        let mut decoder = RectDecoder::new();
        let mut screen = ScreenBuffer::new(4, 2);

        // Prime Tight stream 0 with a compressed rectangle.
        let raw: Vec<u8> = (1u32..=8).flat_map(|p| p.to_ne_bytes()).collect();
        let compressed = deflate(&raw);
        let mut data = vec![0x00u8];
        data.extend_from_slice(&compact_len(compressed.len()));
        data.extend_from_slice(&compressed);
        let mut stream = WireReader::new(Cursor::new(data));
        decoder
            .decode_tight(&mut stream, &mut screen, 0, 0, 4, 2)
            .await
            .unwrap();
        assert!(decoder.streams().is_active(TIGHT_STREAM_BASE));

        // Reset bit 0 plus a fresh full deflate stream: decoding succeeds
        // only if the old context was discarded.
        let compressed = deflate(&raw);
        let mut data = vec![0x01u8];
        data.extend_from_slice(&compact_len(compressed.len()));
        data.extend_from_slice(&compressed);
        let mut stream = WireReader::new(Cursor::new(data));
        decoder
            .decode_tight(&mut stream, &mut screen, 0, 0, 4, 2)
            .await
            .unwrap();
        let expected: Vec<u32> = (1..=8).collect();
        assert_eq!(screen.data(), &expected[..]);
    }

    #[tokio::test]
    async fn test_bad_subencoding_fails() {
        let mut decoder = RectDecoder::new();
        let mut screen = ScreenBuffer::new(4, 4);
        let mut stream = WireReader::new(Cursor::new(vec![0xA0u8]));

        let err = decoder
            .decode_tight(&mut stream, &mut screen, 0, 0, 4, 4)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("bad subencoding"));
    }

    #[tokio::test]
    async fn test_too_wide_rectangle_fails() {
        let mut decoder = RectDecoder::new();
        let mut screen = ScreenBuffer::new(4096, 1);
        let mut stream = WireReader::new(Cursor::new(vec![0x00u8]));

        let err = decoder
            .decode_tight(&mut stream, &mut screen, 0, 0, 2049, 1)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("too wide"));
    }

    #[tokio::test]
    async fn test_row_count_mismatch_fails() {
        // Compressed data inflating to fewer rows than the rectangle
        // declares must be rejected.
        let mut decoder = RectDecoder::new();
        let mut screen = ScreenBuffer::new(4, 4);
        let raw = vec![0u8; 4 * 2 * 4]; // only 2 of 4 rows
        let compressed = deflate(&raw);
        let mut data = vec![0x00u8];
        data.extend_from_slice(&compact_len(compressed.len()));
        data.extend_from_slice(&compressed);
        let mut stream = WireReader::new(Cursor::new(data));

        let err = decoder
            .decode_tight(&mut stream, &mut screen, 0, 0, 4, 4)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("scan lines"));
    }
}
