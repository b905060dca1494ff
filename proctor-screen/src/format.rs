//! The fixed local pixel format.
//!
//! The client always requests the same format from the server: 32 bits per
//! pixel, 32-bit depth, true colour, 8 bits per channel with red at bit 16,
//! green at bit 8 and blue at bit 0, in host byte order. The screen buffer
//! and every decoder assume this layout, which is why pixels can be handled
//! as plain `u32` values throughout.

use proctor_protocol::messages::PixelFormat;

/// Bit position of the red channel.
pub const RED_SHIFT: u32 = 16;
/// Bit position of the green channel.
pub const GREEN_SHIFT: u32 = 8;
/// Bit position of the blue channel.
pub const BLUE_SHIFT: u32 = 0;

/// Maximum value of each colour channel.
pub const CHANNEL_MAX: u32 = 255;

/// Channel maxima indexed R, G, B, the layout the Tight gradient filter
/// iterates over.
pub const CHANNEL_MAXES: [u16; 3] = [255, 255, 255];
/// Channel shifts indexed R, G, B.
pub const CHANNEL_SHIFTS: [u32; 3] = [RED_SHIFT, GREEN_SHIFT, BLUE_SHIFT];

/// The pixel format this client requests from the server.
///
/// `big_endian` reflects the host, so the 4-byte pixels the server sends can
/// be reassembled with native byte order.
pub fn local_pixel_format() -> PixelFormat {
    PixelFormat {
        bits_per_pixel: 32,
        depth: 32,
        big_endian: cfg!(target_endian = "big") as u8,
        true_color: 1,
        red_max: CHANNEL_MAX as u16,
        green_max: CHANNEL_MAX as u16,
        blue_max: CHANNEL_MAX as u16,
        red_shift: RED_SHIFT as u8,
        green_shift: GREEN_SHIFT as u8,
        blue_shift: BLUE_SHIFT as u8,
    }
}

/// Pack channel values that are already in the local range (0..=255) into a
/// pixel by masking and shifting.
#[inline]
pub fn rgb_to_pixel(r: u32, g: u32, b: u32) -> u32 {
    ((r & CHANNEL_MAX) << RED_SHIFT)
        | ((g & CHANNEL_MAX) << GREEN_SHIFT)
        | ((b & CHANNEL_MAX) << BLUE_SHIFT)
}

/// Pack 8-bit-per-channel RGB into a pixel, scaling each channel to the
/// local maximum with round-to-nearest.
#[inline]
pub fn rgb24_to_pixel(r: u8, g: u8, b: u8) -> u32 {
    let scale = |c: u8| (c as u32 * CHANNEL_MAX + 127) / 255;
    (scale(r) << RED_SHIFT) | (scale(g) << GREEN_SHIFT) | (scale(b) << BLUE_SHIFT)
}
