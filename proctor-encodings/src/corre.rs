//! CoRRE encoding: background fill plus compact subrectangles.
//!
//! Wire format: `u32 n_subrects; u32 bg_pixel;` then per subrectangle a
//! 4-byte pixel and four u8 fields `x, y, w, h` relative to the enclosing
//! rectangle. CoRRE rectangles never exceed 255 pixels per side, which is
//! what lets the subrectangle geometry fit in single bytes.

use crate::RectDecoder;
use anyhow::{bail, Context, Result};
use proctor_protocol::WireReader;
use proctor_screen::ScreenBuffer;
use tokio::io::AsyncRead;

impl RectDecoder {
    /// Decode a CoRRE rectangle.
    pub async fn decode_corre<R: AsyncRead + Unpin>(
        &mut self,
        stream: &mut WireReader<R>,
        screen: &mut ScreenBuffer,
        x: u16,
        y: u16,
        w: u16,
        h: u16,
    ) -> Result<()> {
        let n_subrects = stream
            .read_u32()
            .await
            .context("failed to read CoRRE header")?;

        let mut bg = [0u8; 4];
        stream
            .read_bytes(&mut bg)
            .await
            .context("failed to read CoRRE background pixel")?;
        screen.fill_rect(x, y, w, h, u32::from_ne_bytes(bg));

        for _ in 0..n_subrects {
            let mut group = [0u8; 8];
            stream
                .read_bytes(&mut group)
                .await
                .context("failed to read CoRRE subrectangle")?;
            let pixel = u32::from_ne_bytes([group[0], group[1], group[2], group[3]]);
            let (sx, sy, sw, sh) = (
                group[4] as u16,
                group[5] as u16,
                group[6] as u16,
                group[7] as u16,
            );

            if sx + sw > w || sy + sh > h {
                bail!(
                    "CoRRE subrectangle {}x{} at ({}, {}) leaves its {}x{} rectangle",
                    sw,
                    sh,
                    sx,
                    sy,
                    w,
                    h
                );
            }
            screen.fill_rect(x + sx, y + sy, sw, sh, pixel);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn corre_payload(n_subrects: u32, bg: u32, subrects: &[(u32, u8, u8, u8, u8)]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&n_subrects.to_be_bytes());
        data.extend_from_slice(&bg.to_ne_bytes());
        for &(pixel, x, y, w, h) in subrects {
            data.extend_from_slice(&pixel.to_ne_bytes());
            data.extend_from_slice(&[x, y, w, h]);
        }
        data
    }

    #[tokio::test]
    async fn test_minimal_corre() {
        // 2x2 rect, green background, one red 1x1 subrect at (1, 0).
        let mut decoder = RectDecoder::new();
        let mut screen = ScreenBuffer::new(2, 2);
        let data = corre_payload(1, 0x00FF00, &[(0xFF0000, 1, 0, 1, 1)]);
        let mut stream = WireReader::new(Cursor::new(data));

        decoder
            .decode_corre(&mut stream, &mut screen, 0, 0, 2, 2)
            .await
            .unwrap();

        assert_eq!(screen.row(0), &[0x00FF00, 0xFF0000]);
        assert_eq!(screen.row(1), &[0x00FF00, 0x00FF00]);
    }

    #[tokio::test]
    async fn test_background_only() {
        let mut decoder = RectDecoder::new();
        let mut screen = ScreenBuffer::new(3, 3);
        let data = corre_payload(0, 0xABCDEF, &[]);
        let mut stream = WireReader::new(Cursor::new(data));

        decoder
            .decode_corre(&mut stream, &mut screen, 1, 1, 2, 2)
            .await
            .unwrap();
        assert_eq!(screen.row(0), &[0, 0, 0]);
        assert_eq!(screen.row(1), &[0, 0xABCDEF, 0xABCDEF]);
    }

    #[tokio::test]
    async fn test_subrects_paint_in_order() {
        // Later subrectangles overwrite earlier ones.
        let mut decoder = RectDecoder::new();
        let mut screen = ScreenBuffer::new(2, 1);
        let data = corre_payload(2, 0, &[(0x111111, 0, 0, 2, 1), (0x222222, 1, 0, 1, 1)]);
        let mut stream = WireReader::new(Cursor::new(data));

        decoder
            .decode_corre(&mut stream, &mut screen, 0, 0, 2, 1)
            .await
            .unwrap();
        assert_eq!(screen.row(0), &[0x111111, 0x222222]);
    }

    #[tokio::test]
    async fn test_subrect_escaping_rect_fails() {
        let mut decoder = RectDecoder::new();
        let mut screen = ScreenBuffer::new(4, 4);
        let data = corre_payload(1, 0, &[(0xFF, 3, 0, 2, 1)]);
        let mut stream = WireReader::new(Cursor::new(data));

        let err = decoder
            .decode_corre(&mut stream, &mut screen, 0, 0, 4, 4)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("leaves its"));
    }
}
