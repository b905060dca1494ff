//! Shared protocol types and the encoding number tables.

use crate::io::{WireReader, WireWriter};
use tokio::io::{AsyncRead, AsyncWrite};

/// Pixel format specification.
///
/// Describes how pixels are encoded in the framebuffer: storage width, color
/// depth, channel extents and bit positions, and byte order.
///
/// # Wire Format
///
/// 16 bytes:
/// - 1 byte: bits_per_pixel
/// - 1 byte: depth
/// - 1 byte: big_endian (0 or 1)
/// - 1 byte: true_color (0 or 1)
/// - 2 bytes each: red_max, green_max, blue_max
/// - 1 byte each: red_shift, green_shift, blue_shift
/// - 3 bytes: padding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormat {
    pub bits_per_pixel: u8,
    pub depth: u8,
    /// Boolean on the wire: must be 0 or 1.
    pub big_endian: u8,
    /// Boolean on the wire: must be 0 or 1.
    pub true_color: u8,
    pub red_max: u16,
    pub green_max: u16,
    pub blue_max: u16,
    pub red_shift: u8,
    pub green_shift: u8,
    pub blue_shift: u8,
}

impl PixelFormat {
    /// Byte length of the format block on the wire.
    pub const WIRE_LEN: usize = 16;

    /// Storage width of one pixel in bytes, rounded up.
    pub fn bytes_per_pixel(&self) -> u8 {
        self.bits_per_pixel.div_ceil(8)
    }

    /// Read a pixel format block from the stream.
    ///
    /// The whole 16-byte block is read at once and the fields picked out of
    /// it. The two flag bytes must be wire booleans; the three padding bytes
    /// are not inspected (servers have been seen leaving junk in them).
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut WireReader<R>,
    ) -> std::io::Result<Self> {
        let mut block = [0u8; Self::WIRE_LEN];
        stream.read_bytes(&mut block).await?;

        for (value, name) in [(block[2], "big-endian"), (block[3], "true-colour")] {
            if value > 1 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("pixel format {} flag is {}, not a wire boolean", name, value),
                ));
            }
        }

        Ok(Self {
            bits_per_pixel: block[0],
            depth: block[1],
            big_endian: block[2],
            true_color: block[3],
            red_max: u16::from_be_bytes([block[4], block[5]]),
            green_max: u16::from_be_bytes([block[6], block[7]]),
            blue_max: u16::from_be_bytes([block[8], block[9]]),
            red_shift: block[10],
            green_shift: block[11],
            blue_shift: block[12],
        })
    }

    /// Write this pixel format block to the stream, padding zeroed.
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut WireWriter<W>) {
        let mut block = [0u8; Self::WIRE_LEN];
        block[0] = self.bits_per_pixel;
        block[1] = self.depth;
        block[2] = self.big_endian;
        block[3] = self.true_color;
        block[4..6].copy_from_slice(&self.red_max.to_be_bytes());
        block[6..8].copy_from_slice(&self.green_max.to_be_bytes());
        block[8..10].copy_from_slice(&self.blue_max.to_be_bytes());
        block[10] = self.red_shift;
        block[11] = self.green_shift;
        block[12] = self.blue_shift;
        stream.write_bytes(&block);
    }
}

/// Rectangle header for framebuffer updates.
///
/// 12 bytes on the wire: x, y, width, height as u16 followed by the encoding
/// number as i32. The encoding-specific payload follows and is consumed by
/// the matching decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rectangle {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub encoding: i32,
}

impl Rectangle {
    /// Read a rectangle header (header only, never the payload).
    pub async fn read_from<R: AsyncRead + Unpin>(
        stream: &mut WireReader<R>,
    ) -> std::io::Result<Self> {
        Ok(Self {
            x: stream.read_u16().await?,
            y: stream.read_u16().await?,
            width: stream.read_u16().await?,
            height: stream.read_u16().await?,
            encoding: stream.read_i32().await?,
        })
    }

    /// Write a rectangle header.
    pub fn write_to<W: AsyncWrite + Unpin>(&self, stream: &mut WireWriter<W>) {
        stream.write_u16(self.x);
        stream.write_u16(self.y);
        stream.write_u16(self.width);
        stream.write_u16(self.height);
        stream.write_i32(self.encoding);
    }

    /// Pixel area covered by this rectangle.
    pub const fn area(&self) -> u32 {
        self.width as u32 * self.height as u32
    }
}

//
// Encoding numbers
//

/// Raw encoding: uncompressed pixel data.
pub const ENCODING_RAW: i32 = 0;

/// CopyRect encoding: copy from another screen region.
pub const ENCODING_COPY_RECT: i32 = 1;

/// RRE encoding. Never requested and not decodable; receipt is fatal.
pub const ENCODING_RRE: i32 = 2;

/// CoRRE encoding: background fill plus 8-bit-relative subrectangles.
pub const ENCODING_CORRE: i32 = 4;

/// Zlib encoding: one deflate stream over raw pixel data.
pub const ENCODING_ZLIB: i32 = 6;

/// Tight encoding: filtered zlib streams with optional JPEG sub-mode.
pub const ENCODING_TIGHT: i32 = 7;

/// Custom encoding: LZO1X-compressed run-length pixel data.
pub const ENCODING_ITALC: i32 = 0x4954_4C43;

/// Custom encoding: length-prefixed cursor image with the hotspot in the
/// rectangle position.
pub const ENCODING_ITALC_CURSOR: i32 = 0x4954_4C44;

//
// Pseudo-encodings (advertised with encodings, never carry pixel data)
//

/// Marks the last rectangle of an update; remaining count is abandoned.
pub const ENCODING_LAST_RECT: i32 = -224; // 0xFFFFFF20

/// Cursor position update; coordinates ride in the rectangle header.
pub const ENCODING_POINTER_POS: i32 = -232; // 0xFFFFFF18

/// Cursor shape in the client pixel format with a 1-bpp mask.
pub const ENCODING_RICH_CURSOR: i32 = -239; // 0xFFFFFF11

/// Cursor shape as a two-color X11 bitmap with a 1-bpp mask.
pub const ENCODING_X_CURSOR: i32 = -240; // 0xFFFFFF10

/// JPEG quality level hint, level 4.
pub const ENCODING_QUALITY_LEVEL_4: i32 = -28; // 0xFFFFFFE4

/// JPEG quality level hint, level 9.
pub const ENCODING_QUALITY_LEVEL_9: i32 = -23; // 0xFFFFFFE9

/// Compression level hint, level 4.
pub const ENCODING_COMPRESS_LEVEL_4: i32 = -252; // 0xFFFFFF04
