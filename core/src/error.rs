//! Error types for nano-vision-core.
//!
//! Every fallible function in this `no_std` crate returns `NanoResult<T>`.
//! A panic on the MCU halts the whole device, so precondition violations are
//! reported as values and logged, never asserted.

use thiserror::Error;

/// All error conditions raised by the layer contract and the image engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NanoError {
    #[error("buffer too small: {required} elements required, {available} available")]
    BufferTooSmall { required: usize, available: usize },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("allocation of {requested} bytes failed")]
    AllocationFailed { requested: usize },

    #[error("layer `{layer}` called before build")]
    NotBuilt { layer: &'static str },

    #[error("layer `{layer}` was built for a different input shape")]
    ShapeMismatch { layer: &'static str },

    #[error("input shape is undefined or has a zero dimension")]
    ShapeUndefined,

    #[error("tensor has no storage")]
    Unrealized,

    #[error("input exponents differ: {left} vs {right}")]
    ExponentMismatch { left: i32, right: i32 },

    #[error("parameter count {actual} does not match {expected} channels")]
    ParameterMismatch { expected: usize, actual: usize },

    #[error("quantized parameter {value} does not fit the feature type")]
    ParameterOutOfRange { value: i32 },

    #[error("stride must be non-zero")]
    InvalidStride,

    #[error("rectangle has zero width or height")]
    DegenerateRect,

    #[error("rectangle lies outside the destination buffer")]
    RectOutOfBounds,

    #[error("cannot map {src} source channels onto {dst} destination channels")]
    ChannelMismatch { src: usize, dst: usize },

    #[error("transform is not invertible")]
    Singular,

    #[error("transform has non-finite coefficients")]
    NonFinite,
}

pub type NanoResult<T> = Result<T, NanoError>;
