//! Pixel-format conversion between RGB565, RGB888 and Gray.
//!
//! The camera delivers RGB565 with its two bytes swapped, so a little-endian
//! `u16` read lays the channels out as:
//!
//! ```text
//! bit  15..13   12..8   7..3   2..0
//!      g[4:2]   b[7:3]  r[7:3] g[7:5]
//! ```
//!
//! Expanding to 8 bits zero-fills the low bits (`v << 3` for 5-bit channels,
//! `v << 2` for green), it does not rescale by `255 / 31`.

use crate::error::{NanoError, NanoResult};

/// `(38r + 75g + 15b) >> 7`: luma weights (0.299, 0.587, 0.114) at scale 128.
#[inline]
pub fn rgb888_to_gray(red: i32, green: i32, blue: i32) -> u8 {
    let gray = (red * 38 + green * 75 + blue * 15) >> 7;
    gray.clamp(0, 255) as u8
}

/// Returns `[b, g, r]`.
#[inline]
pub fn rgb565_to_rgb888(input: u16) -> [u8; 3] {
    let blue = (input & 0x1F00) >> 5;
    let green = ((input & 0x7) << 5) | ((input & 0xE000) >> 11);
    let red = input & 0xF8;
    [blue as u8, green as u8, red as u8]
}

#[inline]
pub fn rgb565_to_gray(input: u16) -> u8 {
    let [b, g, r] = rgb565_to_rgb888(input);
    rgb888_to_gray(r as i32, g as i32, b as i32)
}

/// Packs 8-bit channels into the camera's RGB565 layout, dropping low bits.
#[inline]
pub fn rgb888_to_rgb565(blue: u8, green: u8, red: u8) -> u16 {
    let (b, g, r) = (blue as u16, green as u16, red as u16);
    (r & 0xF8) | ((b & 0xF8) << 5) | ((g & 0xE0) >> 5) | ((g & 0x1C) << 11)
}

/// Converts a whole RGB565 frame into interleaved `[b, g, r]` bytes.
pub fn convert_rgb565_to_rgb888(src: &[u16], dst: &mut [u8]) -> NanoResult<()> {
    if dst.len() < src.len() * 3 {
        return Err(NanoError::BufferTooSmall { required: src.len() * 3, available: dst.len() });
    }
    for (&px, out) in src.iter().zip(dst.chunks_exact_mut(3)) {
        out.copy_from_slice(&rgb565_to_rgb888(px));
    }
    Ok(())
}

/// Converts a whole RGB565 frame into one gray byte per pixel.
pub fn convert_rgb565_to_gray(src: &[u16], dst: &mut [u8]) -> NanoResult<()> {
    if dst.len() < src.len() {
        return Err(NanoError::BufferTooSmall { required: src.len(), available: dst.len() });
    }
    for (&px, out) in src.iter().zip(dst.iter_mut()) {
        *out = rgb565_to_gray(px);
    }
    Ok(())
}
