//! Quantized buffer: fixed-point samples sharing one exponent.
//!
//! A stored integer `v` represents the real value `v × 2^exponent`. The
//! exponent belongs to the whole buffer; there is no per-element scale.
//!
//! Storage is allocated lazily. A layer sets the shape during `build` and
//! the element block only appears on the first `call`, so a graph can be
//! built and shape-checked without touching the heap.

use alloc::vec::Vec;
use core::fmt;

use crate::error::{NanoError, NanoResult};

/// Integer sample types a [`Tensor`] or an image destination can hold.
///
/// Intermediate arithmetic is done in `i64` and brought back with
/// [`Element::saturate`], which clamps instead of wrapping.
pub trait Element: Copy + Default + PartialOrd + fmt::Debug + Send + Sync + 'static {
    const MIN: i32;
    const MAX: i32;

    fn to_i32(self) -> i32;

    fn saturate(value: i64) -> Self;
}

macro_rules! impl_element {
    ($($ty:ty),*) => {$(
        impl Element for $ty {
            const MIN: i32 = <$ty>::MIN as i32;
            const MAX: i32 = <$ty>::MAX as i32;

            #[inline(always)]
            fn to_i32(self) -> i32 {
                self as i32
            }

            #[inline(always)]
            fn saturate(value: i64) -> Self {
                value.clamp(Self::MIN as i64, Self::MAX as i64) as $ty
            }
        }
    )*};
}

impl_element!(i8, i16, u8);

/// Up to four dimensions. Three-dimensional shapes are `[height, width, channel]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Shape {
    pub dims: [usize; 4],
    pub ndim: usize,
}

impl Shape {
    /// Shape of a tensor that has not been built yet.
    pub const UNSET: Shape = Shape { dims: [0; 4], ndim: 0 };

    pub const fn d1(size: usize) -> Self {
        Self { dims: [size, 0, 0, 0], ndim: 1 }
    }
    pub const fn d2(d0: usize, d1: usize) -> Self {
        Self { dims: [d0, d1, 0, 0], ndim: 2 }
    }
    pub const fn hwc(height: usize, width: usize, channel: usize) -> Self {
        Self { dims: [height, width, channel, 0], ndim: 3 }
    }

    /// Builds a shape from a dimension list of length 1 to 4.
    pub fn from_dims(dims: &[usize]) -> NanoResult<Self> {
        if dims.is_empty() || dims.len() > 4 {
            return Err(NanoError::DimensionMismatch { expected: 4, actual: dims.len() });
        }
        let mut shape = Shape { dims: [0; 4], ndim: dims.len() };
        shape.dims[..dims.len()].copy_from_slice(dims);
        Ok(shape)
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.dims[..self.ndim]
    }

    /// Element count, saturating at `usize::MAX`.
    pub fn total(&self) -> usize {
        self.checked_total().unwrap_or(usize::MAX)
    }

    /// Element count, or `None` if it does not fit in `usize`.
    pub fn checked_total(&self) -> Option<usize> {
        self.as_slice().iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    /// True when the shape has at least one dimension, none of them is zero
    /// and the element count fits in `usize`.
    pub fn is_defined(&self) -> bool {
        self.ndim > 0 && self.as_slice().iter().all(|&d| d > 0) && self.checked_total().is_some()
    }

    pub fn height(&self) -> usize {
        if self.ndim == 3 { self.dims[0] } else { 0 }
    }
    pub fn width(&self) -> usize {
        if self.ndim == 3 { self.dims[1] } else { 0 }
    }

    /// Size of the innermost axis; per-channel parameters broadcast along it.
    pub fn channels(&self) -> usize {
        if self.ndim == 0 { 0 } else { self.dims[self.ndim - 1] }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, d) in self.as_slice().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, ")")
    }
}

/// Quantized buffer with a lazily allocated element block.
#[derive(Clone)]
pub struct Tensor<T: Element> {
    shape: Shape,
    exponent: i32,
    element: Option<Vec<T>>,
}

impl<T: Element> Default for Tensor<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> Tensor<T> {
    /// Empty tensor: no shape, no storage.
    pub const fn new() -> Self {
        Self { shape: Shape::UNSET, exponent: 0, element: None }
    }

    /// Tensor with a shape and exponent but no storage yet.
    pub const fn with_shape(shape: Shape, exponent: i32) -> Self {
        Self { shape, exponent, element: None }
    }

    /// Takes ownership of `data`, which must hold exactly `shape.total()` elements.
    pub fn from_vec(shape: Shape, exponent: i32, data: Vec<T>) -> NanoResult<Self> {
        if !shape.is_defined() {
            return Err(NanoError::ShapeUndefined);
        }
        if data.len() != shape.total() {
            return Err(NanoError::DimensionMismatch { expected: shape.total(), actual: data.len() });
        }
        Ok(Self { shape, exponent, element: Some(data) })
    }

    /// Zero-filled realized tensor.
    pub fn zeros(shape: Shape, exponent: i32) -> NanoResult<Self> {
        if !shape.is_defined() {
            return Err(NanoError::ShapeUndefined);
        }
        let mut tensor = Self::with_shape(shape, exponent);
        tensor.apply_element()?;
        Ok(tensor)
    }

    /// Quantizes real values at the given exponent, rounding to nearest and
    /// saturating to the element range.
    pub fn quantize(shape: Shape, exponent: i32, values: &[f32]) -> NanoResult<Self> {
        if values.len() != shape.total() {
            return Err(NanoError::DimensionMismatch { expected: shape.total(), actual: values.len() });
        }
        let mut data = try_alloc::<T>(values.len())?;
        for (dst, &v) in data.iter_mut().zip(values.iter()) {
            *dst = T::saturate(libm::roundf(libm::ldexpf(v, exponent.saturating_neg())) as i64);
        }
        Self::from_vec(shape, exponent, data)
    }

    #[inline(always)]
    pub fn shape(&self) -> Shape {
        self.shape
    }

    #[inline(always)]
    pub fn exponent(&self) -> i32 {
        self.exponent
    }

    pub fn set_exponent(&mut self, exponent: i32) -> &mut Self {
        self.exponent = exponent;
        self
    }

    /// Changes the shape. Storage survives when the element count is
    /// unchanged and is released otherwise.
    pub fn set_shape(&mut self, shape: Shape) -> &mut Self {
        if shape.total() != self.shape.total() {
            self.free_element();
        }
        self.shape = shape;
        self
    }

    /// Number of elements the shape describes.
    pub fn size(&self) -> usize {
        if self.shape.ndim == 0 { 0 } else { self.shape.total() }
    }

    pub fn is_realized(&self) -> bool {
        self.element.is_some()
    }

    /// Allocates zero-initialized storage if none exists.
    ///
    /// Returns `Ok(true)` when memory was allocated and `Ok(false)` when
    /// storage was already present.
    pub fn apply_element(&mut self) -> NanoResult<bool> {
        if self.element.is_some() {
            return Ok(false);
        }
        if !self.shape.is_defined() {
            return Err(NanoError::ShapeUndefined);
        }
        self.element = Some(try_alloc::<T>(self.shape.total())?);
        Ok(true)
    }

    pub fn free_element(&mut self) {
        self.element = None;
    }

    /// Element block; empty while unrealized.
    #[inline(always)]
    pub fn as_slice(&self) -> &[T] {
        self.element.as_deref().unwrap_or(&[])
    }

    #[inline(always)]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.element.as_deref_mut().unwrap_or(&mut [])
    }

    /// Address of the element block, or null while unrealized.
    pub fn as_ptr(&self) -> *const T {
        match &self.element {
            Some(data) => data.as_ptr(),
            None => core::ptr::null(),
        }
    }

    fn hwc_index(&self, y: usize, x: usize, c: usize) -> Option<usize> {
        if self.shape.ndim != 3 || y >= self.shape.dims[0] || x >= self.shape.dims[1] || c >= self.shape.dims[2] {
            return None;
        }
        Some((y * self.shape.dims[1] + x) * self.shape.dims[2] + c)
    }

    /// Stored value at `[y, x, c]` of a 3-d tensor.
    pub fn get(&self, y: usize, x: usize, c: usize) -> Option<T> {
        let idx = self.hwc_index(y, x, c)?;
        self.as_slice().get(idx).copied()
    }

    pub fn set(&mut self, y: usize, x: usize, c: usize, value: T) -> NanoResult<()> {
        let idx = self.hwc_index(y, x, c).ok_or(NanoError::DimensionMismatch {
            expected: self.size(),
            actual: y
                .saturating_mul(self.shape.width())
                .saturating_add(x)
                .saturating_mul(self.shape.channels())
                .saturating_add(c),
        })?;
        let slot = self.as_mut_slice().get_mut(idx).ok_or(NanoError::Unrealized)?;
        *slot = value;
        Ok(())
    }

    /// Real value of the element at flat `index`.
    pub fn real_value(&self, index: usize) -> Option<f32> {
        let v = self.as_slice().get(index)?;
        Some(libm::ldexpf(v.to_i32() as f32, self.exponent))
    }
}

impl<T: Element> fmt::Debug for Tensor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("exponent", &self.exponent)
            .field("realized", &self.is_realized())
            .finish()
    }
}

/// Zero-filled vector, reporting allocator failure instead of aborting.
pub(crate) fn try_alloc<T: Element>(len: usize) -> NanoResult<Vec<T>> {
    let mut data = Vec::new();
    data.try_reserve_exact(len).map_err(|_| NanoError::AllocationFailed {
        requested: len.saturating_mul(core::mem::size_of::<T>()),
    })?;
    data.resize(len, T::default());
    Ok(data)
}
