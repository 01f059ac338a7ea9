//! Crop, resize and pad in one pass.
//!
//! `src_rect` of the source is scaled onto `dst_rect` of the destination.
//! Destination pixels outside `dst_rect` are clamped onto its border before
//! mapping, so they repeat the nearest edge sample:
//!
//! ```text
//!   +-----------------+        x outside dst_rect is clamped to the
//!   | pad | rect | pad|        rect's first / last column, then mapped
//!   +-----------------+        sx = src.x_start + dx * (src_w / dst_w)
//! ```
//!
//! Nearest samples from pixel centres, `(dx + 0.5) * scale - 0.5`, so a 2×
//! upscale of `[a, b]` is `[a, a, b, b]`.

use super::{channel_map, sample_into, Coord, ImageView, ImageViewMut, PixelFormat, Rect, ResizeMode};
use crate::error::{NanoError, NanoResult};
use crate::tensor::Element;

/// Maps `src_rect` of `src` onto `dst_rect` of `dst`, edge-padding the rest.
///
/// Every destination pixel is written. Rectangles are half-open; `dst_rect`
/// must lie inside `dst`, `src_rect` may extend past the source (reads clamp).
pub fn crop_and_resize<P: PixelFormat, T: Element>(
    dst: &mut ImageViewMut<'_, T>,
    dst_rect: Rect,
    src: &ImageView<'_, P>,
    src_rect: Rect,
    mode: ResizeMode,
    shift_left: i32,
) -> NanoResult<()> {
    if dst_rect.is_degenerate() || src_rect.is_degenerate() {
        tracing::error!(?dst_rect, ?src_rect, "degenerate resize rectangle");
        return Err(NanoError::DegenerateRect);
    }
    if !dst_rect.fits_in(dst.width(), dst.height()) {
        tracing::error!(?dst_rect, width = dst.width(), height = dst.height(), "destination rectangle out of bounds");
        return Err(NanoError::RectOutOfBounds);
    }
    let map = channel_map(src.channels(), dst.channels())?;

    let scale_x = src_rect.width() as f32 / dst_rect.width() as f32;
    let scale_y = src_rect.height() as f32 / dst_rect.height() as f32;
    tracing::trace!(?src_rect, ?dst_rect, scale_x, scale_y, ?mode, shift_left, "crop_and_resize");

    for y in 0..dst.height() {
        let dy = (y as i32).clamp(dst_rect.y_start, dst_rect.y_end - 1) - dst_rect.y_start;
        let sy = Coord::scaled(src_rect.y_start, dy, scale_y);
        for x in 0..dst.width() {
            let dx = (x as i32).clamp(dst_rect.x_start, dst_rect.x_end - 1) - dst_rect.x_start;
            let sx = Coord::scaled(src_rect.x_start, dx, scale_x);
            sample_into(src, map, sx, sy, mode, shift_left, dst.pixel_mut(x, y));
        }
    }
    Ok(())
}

/// Scales the whole of `src` onto the whole of `dst`.
pub fn resize<P: PixelFormat, T: Element>(
    dst: &mut ImageViewMut<'_, T>,
    src: &ImageView<'_, P>,
    mode: ResizeMode,
    shift_left: i32,
) -> NanoResult<()> {
    let dst_rect = Rect::full(dst.width(), dst.height());
    let src_rect = Rect::full(src.width(), src.height());
    crop_and_resize(dst, dst_rect, src, src_rect, mode, shift_left)
}
