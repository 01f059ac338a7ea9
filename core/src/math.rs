//! Fixed-point kernels behind the layer contract.
//!
//! Every kernel takes `(output, input, parameter, parameter_exponent,
//! assign_core)` in that order. Layers only sequence these calls and keep the
//! buffer bookkeeping around them.
//!
//! Numeric rules shared by all kernels:
//! - products and sums are formed in `i64`, so no intermediate can overflow
//!   for i8/i16 features;
//! - rescaling by `2^e` with `e < 0` is an arithmetic right shift rounded half
//!   toward positive infinity; `e > 0` is an exact left shift;
//! - the result saturates to the feature type's range.

use crate::error::{NanoError, NanoResult};
use crate::layers::{AssignCore, Padding};
use crate::tensor::Element;

/// Multiplies `value` by `2^exponent` in fixed point.
///
/// Right shifts round half toward +∞: `rescale(3, -1) == 2`,
/// `rescale(-3, -1) == -1`.
#[inline]
pub fn rescale(value: i64, exponent: i32) -> i64 {
    let shift = exponent.unsigned_abs();
    if exponent < 0 {
        let shift = shift.min(63);
        let half = 1i64 << (shift - 1);
        value.saturating_add(half) >> shift
    } else if exponent > 0 {
        value.saturating_mul(1i64 << shift.min(62))
    } else {
        value
    }
}

#[inline(always)]
fn leaky<T: Element>(x: T, alpha: i64, alpha_exponent: i32) -> T {
    let v = x.to_i32() as i64;
    if v >= 0 {
        x
    } else {
        T::saturate(rescale(v * alpha, alpha_exponent))
    }
}

fn check_same_len(output: usize, input: usize) -> NanoResult<()> {
    if output != input {
        return Err(NanoError::DimensionMismatch { expected: input, actual: output });
    }
    Ok(())
}

// =============================================================================
// Activations
// =============================================================================

/// `out = in >= 0 ? in : in * alpha * 2^alpha_exponent`.
pub fn leaky_relu<T: Element>(
    output: &mut [T],
    input: &[T],
    alpha: T,
    alpha_exponent: i32,
    _assign_core: AssignCore,
) -> NanoResult<()> {
    check_same_len(output.len(), input.len())?;
    let a = alpha.to_i32() as i64;
    for (o, &x) in output.iter_mut().zip(input.iter()) {
        *o = leaky(x, a, alpha_exponent);
    }
    Ok(())
}

pub fn leaky_relu_inplace<T: Element>(data: &mut [T], alpha: T, alpha_exponent: i32, _assign_core: AssignCore) {
    let a = alpha.to_i32() as i64;
    for x in data.iter_mut() {
        *x = leaky(*x, a, alpha_exponent);
    }
}

/// PReLU with one alpha per channel; channels are the innermost axis.
pub fn prelu<T: Element>(
    output: &mut [T],
    input: &[T],
    alpha: &[T],
    alpha_exponent: i32,
    _assign_core: AssignCore,
) -> NanoResult<()> {
    check_same_len(output.len(), input.len())?;
    if alpha.is_empty() || input.len() % alpha.len() != 0 {
        return Err(NanoError::ParameterMismatch { expected: input.len(), actual: alpha.len() });
    }
    for (out_px, in_px) in output.chunks_exact_mut(alpha.len()).zip(input.chunks_exact(alpha.len())) {
        for ((o, &x), &a) in out_px.iter_mut().zip(in_px.iter()).zip(alpha.iter()) {
            *o = leaky(x, a.to_i32() as i64, alpha_exponent);
        }
    }
    Ok(())
}

pub fn prelu_inplace<T: Element>(
    data: &mut [T],
    alpha: &[T],
    alpha_exponent: i32,
    _assign_core: AssignCore,
) -> NanoResult<()> {
    if alpha.is_empty() || data.len() % alpha.len() != 0 {
        return Err(NanoError::ParameterMismatch { expected: data.len(), actual: alpha.len() });
    }
    for px in data.chunks_exact_mut(alpha.len()) {
        for (x, &a) in px.iter_mut().zip(alpha.iter()) {
            *x = leaky(*x, a.to_i32() as i64, alpha_exponent);
        }
    }
    Ok(())
}

pub fn relu<T: Element>(output: &mut [T], input: &[T], _assign_core: AssignCore) -> NanoResult<()> {
    check_same_len(output.len(), input.len())?;
    let zero = T::saturate(0);
    for (o, &x) in output.iter_mut().zip(input.iter()) {
        *o = if x < zero { zero } else { x };
    }
    Ok(())
}

pub fn relu_inplace<T: Element>(data: &mut [T], _assign_core: AssignCore) {
    let zero = T::saturate(0);
    for x in data.iter_mut() {
        if *x < zero {
            *x = zero;
        }
    }
}

// =============================================================================
// Elementwise binary
// =============================================================================

pub fn min2d<T: Element>(output: &mut [T], input0: &[T], input1: &[T], _assign_core: AssignCore) -> NanoResult<()> {
    check_same_len(input1.len(), input0.len())?;
    check_same_len(output.len(), input0.len())?;
    for ((o, &a), &b) in output.iter_mut().zip(input0.iter()).zip(input1.iter()) {
        *o = if b < a { b } else { a };
    }
    Ok(())
}

pub fn min2d_inplace<T: Element>(input0: &mut [T], input1: &[T], _assign_core: AssignCore) -> NanoResult<()> {
    check_same_len(input1.len(), input0.len())?;
    for (a, &b) in input0.iter_mut().zip(input1.iter()) {
        if b < *a {
            *a = b;
        }
    }
    Ok(())
}

// =============================================================================
// Spatial
// =============================================================================

/// Zero padding around an HWC feature map, `[top, bottom, left, right]`.
pub type PadSize = [usize; 4];

/// Output extent along one axis. `padded` selects SAME (ceil) over VALID.
pub fn window_output_size(input: usize, filter: usize, stride: usize, padded: bool) -> usize {
    if stride == 0 {
        return 0;
    }
    if padded {
        (input + stride - 1) / stride
    } else if input < filter {
        0
    } else {
        (input - filter) / stride + 1
    }
}

/// Effective extent of a filter tap span with `dilation - 1` holes between taps.
pub fn dilated_extent(filter: usize, dilation: usize) -> usize {
    match filter {
        0 => 0,
        k => (k - 1).saturating_mul(dilation).saturating_add(1),
    }
}

/// Padding needed so that `output` windows of the (dilated) `filter` fit.
/// [`Padding::Same`] puts the odd row/column at the bottom/right,
/// [`Padding::SameMxnet`] at the top/left; [`Padding::Valid`] pads nothing.
pub fn pad_size(
    output: (usize, usize),
    input: (usize, usize),
    filter: (usize, usize),
    stride: (usize, usize),
    padding: Padding,
) -> PadSize {
    let total = |out: usize, inp: usize, k: usize, s: usize| ((out.max(1) - 1) * s + k).saturating_sub(inp);
    let ph = total(output.0, input.0, filter.0, stride.0);
    let pw = total(output.1, input.1, filter.1, stride.1);
    match padding {
        Padding::Valid => [0; 4],
        Padding::Same => [ph / 2, ph - ph / 2, pw / 2, pw - pw / 2],
        Padding::SameMxnet => [ph - ph / 2, ph / 2, pw - pw / 2, pw / 2],
    }
}

/// Geometry of a sliding-window kernel over an HWC map.
#[derive(Debug, Clone, Copy)]
pub struct Window {
    pub in_h: usize,
    pub in_w: usize,
    pub channels: usize,
    pub filter_h: usize,
    pub filter_w: usize,
    pub stride_y: usize,
    pub stride_x: usize,
    /// Tap spacing; 1 is a dense filter.
    pub dilation_y: usize,
    pub dilation_x: usize,
    pub out_h: usize,
    pub out_w: usize,
    pub padding: PadSize,
}

impl Window {
    /// Input coordinate of filter tap `k` for output index `o`, or `None` if it
    /// falls into the padding.
    #[inline(always)]
    fn tap(o: usize, k: usize, stride: usize, dilation: usize, pad: usize, extent: usize) -> Option<usize> {
        let pos = (o * stride + k * dilation) as isize - pad as isize;
        if pos >= 0 && (pos as usize) < extent {
            Some(pos as usize)
        } else {
            None
        }
    }
}

/// Max pooling over an HWC map. Padded cells never win; a window that lies
/// entirely in padding yields the type minimum.
pub fn max_pool2d<T: Element>(output: &mut [T], input: &[T], window: &Window, _assign_core: AssignCore) -> NanoResult<()> {
    let w = window;
    if w.stride_y == 0 || w.stride_x == 0 {
        return Err(NanoError::InvalidStride);
    }
    check_same_len(input.len(), w.in_h * w.in_w * w.channels)?;
    check_same_len(output.len(), w.out_h * w.out_w * w.channels)?;

    for oy in 0..w.out_h {
        for ox in 0..w.out_w {
            let out_base = (oy * w.out_w + ox) * w.channels;
            for c in 0..w.channels {
                let mut best = T::MIN as i64;
                for ky in 0..w.filter_h {
                    let Some(iy) = Window::tap(oy, ky, w.stride_y, w.dilation_y, w.padding[0], w.in_h) else { continue };
                    for kx in 0..w.filter_w {
                        let Some(ix) = Window::tap(ox, kx, w.stride_x, w.dilation_x, w.padding[2], w.in_w) else { continue };
                        let v = input[(iy * w.in_w + ix) * w.channels + c].to_i32() as i64;
                        if v > best {
                            best = v;
                        }
                    }
                }
                output[out_base + c] = T::saturate(best);
            }
        }
    }
    Ok(())
}

/// Activation fused into a convolution, applied at the output exponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Activation {
    ReLU,
    LeakyReLU { alpha: i32, exponent: i32 },
}

/// Quantized parameters of a convolution.
#[derive(Debug, Clone, Copy)]
pub struct ConvParams<'p, T: Element> {
    /// `[filter_h, filter_w, in_channels, out_channels]`
    pub filter: &'p [T],
    pub filter_exponent: i32,
    pub out_channels: usize,
    pub bias: Option<(&'p [T], i32)>,
    pub activation: Option<Activation>,
    pub output_exponent: i32,
}

/// HWC convolution with zero padding.
///
/// The accumulator sits at `input_exponent + filter_exponent`; the bias is
/// aligned to it before the sum is rescaled to `output_exponent`.
pub fn conv2d<T: Element>(
    output: &mut [T],
    input: &[T],
    input_exponent: i32,
    window: &Window,
    params: &ConvParams<'_, T>,
    _assign_core: AssignCore,
) -> NanoResult<()> {
    let w = window;
    let out_c = params.out_channels;
    if w.stride_y == 0 || w.stride_x == 0 || w.dilation_y == 0 || w.dilation_x == 0 {
        return Err(NanoError::InvalidStride);
    }
    check_same_len(input.len(), w.in_h * w.in_w * w.channels)?;
    check_same_len(output.len(), w.out_h * w.out_w * out_c)?;
    check_same_len(params.filter.len(), w.filter_h * w.filter_w * w.channels * out_c)?;
    if let Some((bias, _)) = params.bias {
        if bias.len() != out_c {
            return Err(NanoError::ParameterMismatch { expected: out_c, actual: bias.len() });
        }
    }

    let acc_exponent = input_exponent.saturating_add(params.filter_exponent);
    let to_output = acc_exponent.saturating_sub(params.output_exponent);

    for oy in 0..w.out_h {
        for ox in 0..w.out_w {
            let out_base = (oy * w.out_w + ox) * out_c;
            for oc in 0..out_c {
                let mut acc: i64 = 0;
                for ky in 0..w.filter_h {
                    let Some(iy) = Window::tap(oy, ky, w.stride_y, w.dilation_y, w.padding[0], w.in_h) else { continue };
                    for kx in 0..w.filter_w {
                        let Some(ix) = Window::tap(ox, kx, w.stride_x, w.dilation_x, w.padding[2], w.in_w) else { continue };
                        let in_base = (iy * w.in_w + ix) * w.channels;
                        let f_base = (ky * w.filter_w + kx) * w.channels * out_c;
                        for ic in 0..w.channels {
                            let x = input[in_base + ic].to_i32() as i64;
                            let k = params.filter[f_base + ic * out_c + oc].to_i32() as i64;
                            acc += x * k;
                        }
                    }
                }
                if let Some((bias, bias_exponent)) = params.bias {
                    acc = acc.saturating_add(rescale(bias[oc].to_i32() as i64, bias_exponent.saturating_sub(acc_exponent)));
                }
                let mut v = rescale(acc, to_output);
                match params.activation {
                    Some(Activation::ReLU) => v = v.max(0),
                    Some(Activation::LeakyReLU { alpha, exponent }) if v < 0 => {
                        v = rescale(v.saturating_mul(alpha as i64), exponent);
                    }
                    _ => {}
                }
                output[out_base + oc] = T::saturate(v);
            }
        }
    }
    Ok(())
}

/// Index of the largest element; ties resolve to the first.
pub fn argmax<T: Element>(data: &[T]) -> NanoResult<usize> {
    if data.is_empty() {
        return Err(NanoError::DimensionMismatch { expected: 1, actual: 0 });
    }
    let mut max_idx = 0;
    let mut max_val = data[0];
    for (i, &v) in data.iter().enumerate().skip(1) {
        if v > max_val {
            max_val = v;
            max_idx = i;
        }
    }
    Ok(max_idx)
}
