//! Cursor shape decoding for the RichCursor and XCursor pseudo-encodings.
//!
//! Both carry the cursor size in the rectangle dimensions and the hotspot in
//! the rectangle position, followed by pixel data and then a 1-bpp
//! transparency mask as two separate reads:
//!
//! - **RichCursor**: `w * h` pixels in the local format.
//! - **XCursor**: 6 bytes of foreground/background RGB, then a `⌈w/8⌉ * h`
//!   bit plane selecting between the two colours.
//!
//! The mask rows are padded to whole bytes, MSB first; a set bit makes the
//! pixel opaque. The decoded shape is handed back as an ARGB [`CursorImage`]
//! and the caller swaps it in under the cursor lock.

use anyhow::{bail, Context, Result};
use proctor_protocol::messages::types::{ENCODING_RICH_CURSOR, ENCODING_X_CURSOR};
use proctor_protocol::WireReader;
use proctor_screen::format::rgb24_to_pixel;
use proctor_screen::CursorImage;
use tokio::io::AsyncRead;

/// Decode a cursor shape rectangle.
///
/// Returns `None` for a zero-area shape (the cursor stays as it was).
pub async fn decode_cursor_shape<R: AsyncRead + Unpin>(
    stream: &mut WireReader<R>,
    encoding: i32,
    width: u16,
    height: u16,
) -> Result<Option<CursorImage>> {
    if width as u32 * height as u32 == 0 {
        return Ok(None);
    }

    let n_pixels = width as usize * height as usize;
    let bytes_per_row = (width as usize + 7) / 8;
    let mask_len = bytes_per_row * height as usize;

    let mut pixels = vec![0u32; n_pixels];
    match encoding {
        ENCODING_X_CURSOR => {
            let mut rgb = [0u8; 6];
            stream
                .read_bytes(&mut rgb)
                .await
                .context("failed to read XCursor colours")?;
            let foreground = rgb24_to_pixel(rgb[0], rgb[1], rgb[2]);
            let background = rgb24_to_pixel(rgb[3], rgb[4], rgb[5]);
            let colours = [background, foreground];

            let mut bitmap = vec![0u8; mask_len];
            stream
                .read_bytes(&mut bitmap)
                .await
                .context("failed to read XCursor bitmap")?;

            for y in 0..height as usize {
                for x in 0..width as usize {
                    let bit = (bitmap[y * bytes_per_row + x / 8] >> (7 - (x % 8))) & 1;
                    pixels[y * width as usize + x] = colours[bit as usize];
                }
            }
        }
        ENCODING_RICH_CURSOR => {
            let mut raw = vec![0u8; n_pixels * 4];
            stream
                .read_bytes(&mut raw)
                .await
                .context("failed to read RichCursor pixels")?;
            for (pixel, chunk) in pixels.iter_mut().zip(raw.chunks_exact(4)) {
                *pixel = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            }
        }
        other => bail!("not a cursor shape encoding: {}", other),
    }

    // The transparency mask always follows the pixel data as its own read.
    let mut mask = vec![0u8; mask_len];
    stream
        .read_bytes(&mut mask)
        .await
        .context("failed to read cursor mask")?;

    Ok(Some(CursorImage::from_pixels_and_mask(
        width, height, &pixels, &mask,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_rich_cursor() {
        // 2x2 cursor; mask marks the main diagonal opaque.
        let mut data = Vec::new();
        for pixel in [0x00AA0000u32, 0x0000BB00, 0x0000CC00, 0x000000DD] {
            data.extend_from_slice(&pixel.to_ne_bytes());
        }
        data.extend_from_slice(&[0b1000_0000, 0b0100_0000]);
        let mut stream = WireReader::new(Cursor::new(data));

        let cursor = decode_cursor_shape(&mut stream, ENCODING_RICH_CURSOR, 2, 2)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            cursor.data(),
            &[0xFFAA0000, 0x00000000, 0x00000000, 0xFF0000DD]
        );
    }

    #[tokio::test]
    async fn test_x_cursor_full_conversion() {
        // 9x1 cursor exercises the byte-spanning bit plane: fore, back
        // alternating, all opaque. Every pixel of the index array must be
        // converted (no early exit).
        let mut data = Vec::new();
        data.extend_from_slice(&[0xFF, 0x00, 0x00]); // foreground red
        data.extend_from_slice(&[0x00, 0x00, 0xFF]); // background blue
        data.extend_from_slice(&[0b1010_1010, 0b1000_0000]); // bit plane
        data.extend_from_slice(&[0xFF, 0x80]); // mask: all opaque
        let mut stream = WireReader::new(Cursor::new(data));

        let cursor = decode_cursor_shape(&mut stream, ENCODING_X_CURSOR, 9, 1)
            .await
            .unwrap()
            .unwrap();
        let red = 0xFFFF0000u32;
        let blue = 0xFF0000FFu32;
        assert_eq!(
            cursor.data(),
            &[red, blue, red, blue, red, blue, red, blue, red]
        );
    }

    #[tokio::test]
    async fn test_zero_area_shape_is_none() {
        let mut stream = WireReader::new(Cursor::new(Vec::new()));
        let cursor = decode_cursor_shape(&mut stream, ENCODING_RICH_CURSOR, 0, 4)
            .await
            .unwrap();
        assert!(cursor.is_none());
    }

    #[tokio::test]
    async fn test_non_cursor_encoding_rejected() {
        let mut stream = WireReader::new(Cursor::new(Vec::new()));
        assert!(decode_cursor_shape(&mut stream, 0, 2, 2).await.is_err());
    }

    #[tokio::test]
    async fn test_truncated_mask_fails() {
        let mut data = Vec::new();
        for pixel in [0u32; 4] {
            data.extend_from_slice(&pixel.to_ne_bytes());
        }
        data.push(0xFF); // only one of two mask rows
        let mut stream = WireReader::new(Cursor::new(data));

        assert!(decode_cursor_shape(&mut stream, ENCODING_RICH_CURSOR, 2, 2)
            .await
            .is_err());
    }
}
