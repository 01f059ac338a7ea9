//! Affine warp: sample the source through an inverse 3×3 transform.
//!
//! Used for face alignment: the detector's landmarks give a similarity
//! transform onto a canonical pose, its inverse is handed to [`warp_affine`].

use super::{channel_map, sample_into, Coord, ImageView, ImageViewMut, PixelFormat, ResizeMode};
use crate::error::{NanoError, NanoResult};
use crate::tensor::Element;

/// Row-major 3×3 matrix acting on homogeneous `(x, y, 1)` columns.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AffineTransform {
    pub m: [[f32; 3]; 3],
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineTransform {
    pub const fn identity() -> Self {
        Self::from_rows([1.0, 0.0, 0.0], [0.0, 1.0, 0.0])
    }

    /// Top two rows; the third is `[0, 0, 1]`.
    pub const fn from_rows(row0: [f32; 3], row1: [f32; 3]) -> Self {
        Self { m: [row0, row1, [0.0, 0.0, 1.0]] }
    }

    pub const fn translation(tx: f32, ty: f32) -> Self {
        Self::from_rows([1.0, 0.0, tx], [0.0, 1.0, ty])
    }

    pub const fn scaling(sx: f32, sy: f32) -> Self {
        Self::from_rows([sx, 0.0, 0.0], [0.0, sy, 0.0])
    }

    /// Counter-clockwise rotation by `radians` (y pointing down) about `(cx, cy)`.
    pub fn rotation(radians: f32, cx: f32, cy: f32) -> Self {
        let (sin, cos) = (libm::sinf(radians), libm::cosf(radians));
        Self::from_rows([cos, sin, cx - cos * cx - sin * cy], [-sin, cos, cy + sin * cx - cos * cy])
    }

    /// `self` followed by `next`.
    pub fn then(&self, next: &AffineTransform) -> Self {
        let (a, b) = (&next.m, &self.m);
        let mut m = [[0.0f32; 3]; 3];
        for (i, row) in m.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
            }
        }
        Self { m }
    }

    pub fn inverse(&self) -> NanoResult<Self> {
        let m = &self.m;
        let cof = |r0: usize, r1: usize, c0: usize, c1: usize| m[r0][c0] * m[r1][c1] - m[r0][c1] * m[r1][c0];

        let det = m[0][0] * cof(1, 2, 1, 2) - m[0][1] * cof(1, 2, 0, 2) + m[0][2] * cof(1, 2, 0, 1);
        if !det.is_finite() || libm::fabsf(det) <= f32::EPSILON {
            return Err(NanoError::Singular);
        }
        let inv = 1.0 / det;
        Ok(Self {
            m: [
                [cof(1, 2, 1, 2) * inv, -cof(0, 2, 1, 2) * inv, cof(0, 1, 1, 2) * inv],
                [-cof(1, 2, 0, 2) * inv, cof(0, 2, 0, 2) * inv, -cof(0, 1, 0, 2) * inv],
                [cof(1, 2, 0, 1) * inv, -cof(0, 2, 0, 1) * inv, cof(0, 1, 0, 1) * inv],
            ],
        })
    }

    /// Maps `(x, y)` through the top two rows.
    #[inline(always)]
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let [r0, r1, _] = &self.m;
        (r0[0] * x + r0[1] * y + r0[2], r1[0] * x + r1[1] * y + r1[2])
    }

    fn is_finite(&self) -> bool {
        self.m.iter().flatten().all(|v| v.is_finite())
    }
}

/// Fills every pixel of `dst` by sampling `src` at `m_inv · (x, y, 1)`.
///
/// Source coordinates are clamped to `[0, dim - 1]` before sampling, so
/// destination pixels that map outside the source repeat its border.
pub fn warp_affine<P: PixelFormat, T: Element>(
    dst: &mut ImageViewMut<'_, T>,
    src: &ImageView<'_, P>,
    m_inv: &AffineTransform,
    mode: ResizeMode,
    shift_left: i32,
) -> NanoResult<()> {
    if !m_inv.is_finite() {
        tracing::error!(m = ?m_inv.m, "non-finite warp matrix");
        return Err(NanoError::NonFinite);
    }
    let map = channel_map(src.channels(), dst.channels())?;
    let max_x = (src.width() - 1) as f32;
    let max_y = (src.height() - 1) as f32;
    tracing::trace!(m = ?m_inv.m, ?mode, shift_left, "warp_affine");

    for y in 0..dst.height() {
        for x in 0..dst.width() {
            let (sx, sy) = m_inv.apply(x as f32, y as f32);
            let sx = Coord::new(sx.clamp(0.0, max_x));
            let sy = Coord::new(sy.clamp(0.0, max_y));
            sample_into(src, map, sx, sy, mode, shift_left, dst.pixel_mut(x, y));
        }
    }
    Ok(())
}
