//! Camera-frame preprocessing: pixel conversion, crop/resize/pad, affine warp.
//!
//! Image buffers are caller-owned slices wrapped in [`ImageView`] /
//! [`ImageViewMut`]; nothing in this module allocates. Pixels are stored
//! row-major and interleaved, 3-channel data in `[b, g, r]` order.

pub mod convert;
pub mod resize;
pub mod warp;

use crate::error::{NanoError, NanoResult};
use crate::math::rescale;
use crate::tensor::Element;

/// Interpolation policy shared by resize and warp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResizeMode {
    /// Weighted sum of the four enclosing pixels.
    Bilinear,
    /// Plain average of the 2×2 block at the floor coordinate.
    Mean,
    /// Closest pixel by pixel-centre mapping, ties rounded up.
    #[default]
    Nearest,
}

/// Half-open rectangle `[x_start, x_end) × [y_start, y_end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rect {
    pub x_start: i32,
    pub x_end: i32,
    pub y_start: i32,
    pub y_end: i32,
}

impl Rect {
    pub const fn new(x_start: i32, y_start: i32, x_end: i32, y_end: i32) -> Self {
        Self { x_start, x_end, y_start, y_end }
    }

    /// The whole `width × height` frame.
    pub const fn full(width: usize, height: usize) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    pub const fn width(&self) -> i32 {
        self.x_end.saturating_sub(self.x_start)
    }

    pub const fn height(&self) -> i32 {
        self.y_end.saturating_sub(self.y_start)
    }

    pub const fn is_degenerate(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub const fn fits_in(&self, width: usize, height: usize) -> bool {
        self.x_start >= 0 && self.y_start >= 0 && self.x_end as i64 <= width as i64 && self.y_end as i64 <= height as i64
    }
}

/// Decodes one channel of a stored pixel.
///
/// Implemented once per source encoding so the resize and warp loops stay
/// generic over 8-bit interleaved and 16-bit packed frames.
pub trait PixelFormat: Copy + Send + Sync + 'static {
    /// Stored samples per pixel for an image of `channels` logical channels.
    fn samples_per_pixel(channels: usize) -> usize;

    /// Validates a logical channel count for this encoding.
    fn check_channels(channels: usize) -> NanoResult<()>;

    /// `pixel` holds exactly `samples_per_pixel` samples.
    fn read_channel(pixel: &[Self], channel: usize) -> u8;
}

impl PixelFormat for u8 {
    #[inline(always)]
    fn samples_per_pixel(channels: usize) -> usize {
        channels
    }

    fn check_channels(channels: usize) -> NanoResult<()> {
        if channels == 0 {
            return Err(NanoError::ChannelMismatch { src: 0, dst: 0 });
        }
        Ok(())
    }

    #[inline(always)]
    fn read_channel(pixel: &[u8], channel: usize) -> u8 {
        pixel[channel]
    }
}

/// RGB565 as delivered by the camera, one `u16` per pixel, three channels.
impl PixelFormat for u16 {
    #[inline(always)]
    fn samples_per_pixel(_channels: usize) -> usize {
        1
    }

    fn check_channels(channels: usize) -> NanoResult<()> {
        if channels != 3 {
            return Err(NanoError::ChannelMismatch { src: channels, dst: 3 });
        }
        Ok(())
    }

    #[inline(always)]
    fn read_channel(pixel: &[u16], channel: usize) -> u8 {
        convert::rgb565_to_rgb888(pixel[0])[channel]
    }
}

/// Read-only view over a caller-owned frame.
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a, P: PixelFormat> {
    data: &'a [P],
    height: usize,
    width: usize,
    channels: usize,
}

/// Samples needed for a `height × width` frame, or `BufferTooSmall` when the
/// frame cannot be addressed: either the count overflows `usize` or a side
/// exceeds the `i32` coordinate range.
fn required_samples(height: usize, width: usize, samples_per_pixel: usize, available: usize) -> NanoResult<usize> {
    let required = height
        .checked_mul(width)
        .and_then(|n| n.checked_mul(samples_per_pixel))
        .filter(|_| height <= i32::MAX as usize && width <= i32::MAX as usize)
        .unwrap_or(usize::MAX);
    if available < required {
        return Err(NanoError::BufferTooSmall { required, available });
    }
    Ok(required)
}

impl<'a, P: PixelFormat> ImageView<'a, P> {
    pub fn new(data: &'a [P], height: usize, width: usize, channels: usize) -> NanoResult<Self> {
        if height == 0 || width == 0 {
            return Err(NanoError::DegenerateRect);
        }
        P::check_channels(channels)?;
        required_samples(height, width, P::samples_per_pixel(channels), data.len())?;
        Ok(Self { data, height, width, channels })
    }

    pub fn height(&self) -> usize {
        self.height
    }
    pub fn width(&self) -> usize {
        self.width
    }
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Samples of the pixel at `(x, y)` after clamping into the frame.
    #[inline(always)]
    fn pixel_clamped(&self, x: i32, y: i32) -> &[P] {
        let x = x.clamp(0, self.width as i32 - 1) as usize;
        let y = y.clamp(0, self.height as i32 - 1) as usize;
        let spp = P::samples_per_pixel(self.channels);
        let start = (y * self.width + x) * spp;
        &self.data[start..start + spp]
    }
}

/// Mutable view over a caller-owned destination buffer.
#[derive(Debug)]
pub struct ImageViewMut<'a, T: Element> {
    data: &'a mut [T],
    height: usize,
    width: usize,
    channels: usize,
}

impl<'a, T: Element> ImageViewMut<'a, T> {
    pub fn new(data: &'a mut [T], height: usize, width: usize, channels: usize) -> NanoResult<Self> {
        if height == 0 || width == 0 || channels == 0 {
            return Err(NanoError::DegenerateRect);
        }
        required_samples(height, width, channels, data.len())?;
        Ok(Self { data, height, width, channels })
    }

    pub fn height(&self) -> usize {
        self.height
    }
    pub fn width(&self) -> usize {
        self.width
    }
    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data[..self.height * self.width * self.channels]
    }

    #[inline(always)]
    fn pixel_mut(&mut self, x: usize, y: usize) -> &mut [T] {
        let start = (y * self.width + x) * self.channels;
        &mut self.data[start..start + self.channels]
    }
}

/// How destination channels are produced from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelMap {
    /// Channel `c` reads source channel `c`.
    Direct,
    /// Single destination channel from a `[b, g, r]` source.
    Gray,
}

fn channel_map(src_channels: usize, dst_channels: usize) -> NanoResult<ChannelMap> {
    if src_channels == dst_channels {
        Ok(ChannelMap::Direct)
    } else if dst_channels == 1 && src_channels == 3 {
        Ok(ChannelMap::Gray)
    } else {
        Err(NanoError::ChannelMismatch { src: src_channels, dst: dst_channels })
    }
}

/// Reads one (possibly gray-converted) channel at a clamped coordinate.
#[inline(always)]
fn fetch<P: PixelFormat>(src: &ImageView<'_, P>, map: ChannelMap, x: i32, y: i32, c: usize) -> i64 {
    let px = src.pixel_clamped(x, y);
    match map {
        ChannelMap::Direct => P::read_channel(px, c) as i64,
        ChannelMap::Gray => {
            let b = P::read_channel(px, 0);
            let g = P::read_channel(px, 1);
            let r = P::read_channel(px, 2);
            convert::rgb888_to_gray(r as i32, g as i32, b as i32) as i64
        }
    }
}

/// Fixed-point scale of bilinear weights: 8 bits per axis.
const WEIGHT_BITS: i32 = 8;
const WEIGHT_ONE: i64 = 1 << WEIGHT_BITS;

/// A real-valued source coordinate split for sampling.
#[derive(Debug, Clone, Copy)]
struct Coord {
    /// `floor(pos)`
    base: i32,
    /// `base + 1`
    next: i32,
    /// `floor(pos + 0.5)`, or the pixel-centre match from [`Coord::scaled`]
    nearest: i32,
    /// `round((pos - base) * 256)`, in `0..=256`
    weight: i64,
}

impl Coord {
    #[inline(always)]
    fn new(pos: f32) -> Self {
        let base = libm::floorf(pos);
        let nearest = libm::floorf(pos + 0.5) as i32;
        let weight = libm::floorf((pos - base) * WEIGHT_ONE as f32 + 0.5) as i64;
        let base = base as i32;
        Self { base, next: base.saturating_add(1), nearest, weight: weight.clamp(0, WEIGHT_ONE) }
    }

    /// Coordinate of destination offset `d` along an axis that starts at
    /// `start` and advances `scale` source pixels per destination pixel.
    ///
    /// Mean and Bilinear read the corner-aligned position `start + d * scale`.
    /// Nearest matches pixel centres instead, `start + (d + 0.5) * scale - 0.5`,
    /// so an integer upscale repeats every source pixel equally.
    #[inline(always)]
    fn scaled(start: i32, d: i32, scale: f32) -> Self {
        let mut coord = Self::new(start as f32 + d as f32 * scale);
        coord.nearest = libm::floorf(start as f32 + (d as f32 + 0.5) * scale) as i32;
        coord
    }
}

/// Samples every destination channel at `(sx, sy)` and writes `out`.
///
/// Each mode accumulates at a fixed scale `2^k` (Nearest 0, Mean 2,
/// Bilinear 16); `shift_left` is applied before the single final rounding.
#[inline(always)]
fn sample_into<P: PixelFormat, T: Element>(
    src: &ImageView<'_, P>,
    map: ChannelMap,
    sx: Coord,
    sy: Coord,
    mode: ResizeMode,
    shift_left: i32,
    out: &mut [T],
) {
    for (c, slot) in out.iter_mut().enumerate() {
        let (acc, scale_bits) = match mode {
            ResizeMode::Nearest => (fetch(src, map, sx.nearest, sy.nearest, c), 0),
            ResizeMode::Mean => {
                let sum = fetch(src, map, sx.base, sy.base, c)
                    + fetch(src, map, sx.next, sy.base, c)
                    + fetch(src, map, sx.base, sy.next, c)
                    + fetch(src, map, sx.next, sy.next, c);
                (sum, 2)
            }
            ResizeMode::Bilinear => {
                let (wx1, wy1) = (sx.weight, sy.weight);
                let (wx0, wy0) = (WEIGHT_ONE - wx1, WEIGHT_ONE - wy1);
                let top = fetch(src, map, sx.base, sy.base, c) * wx0 + fetch(src, map, sx.next, sy.base, c) * wx1;
                let bottom =
                    fetch(src, map, sx.base, sy.next, c) * wx0 + fetch(src, map, sx.next, sy.next, c) * wx1;
                (top * wy0 + bottom * wy1, 2 * WEIGHT_BITS)
            }
        };
        *slot = T::saturate(rescale(acc, shift_left.saturating_sub(scale_bits)));
    }
}

pub use convert::{
    convert_rgb565_to_gray, convert_rgb565_to_rgb888, rgb565_to_gray, rgb565_to_rgb888, rgb888_to_gray, rgb888_to_rgb565,
};
pub use resize::{crop_and_resize, resize};
pub use warp::{warp_affine, AffineTransform};
