//! CopyRect encoding: move a rectangle already on the screen.
//!
//! The payload is just the source position; the destination and size come
//! from the rectangle header. Source and destination may overlap (window
//! scrolls produce exactly that), which the screen buffer's self-copy
//! handles.

use crate::RectDecoder;
use anyhow::{bail, Context, Result};
use proctor_protocol::WireReader;
use proctor_screen::ScreenBuffer;
use tokio::io::AsyncRead;

impl RectDecoder {
    /// Decode a CopyRect rectangle: read `(src_x, src_y)` and copy.
    pub async fn decode_copy_rect<R: AsyncRead + Unpin>(
        &mut self,
        stream: &mut WireReader<R>,
        screen: &mut ScreenBuffer,
        x: u16,
        y: u16,
        w: u16,
        h: u16,
    ) -> Result<()> {
        let src_x = stream
            .read_u16()
            .await
            .context("failed to read CopyRect source")?;
        let src_y = stream
            .read_u16()
            .await
            .context("failed to read CopyRect source")?;

        if src_x as u32 + w as u32 > screen.width() as u32
            || src_y as u32 + h as u32 > screen.height() as u32
        {
            bail!(
                "CopyRect source {}x{} at ({}, {}) outside the framebuffer",
                w,
                h,
                src_x,
                src_y
            );
        }

        screen.copy_self_rect(src_x, src_y, w, h, x, y);
        Ok(())
    }
}
