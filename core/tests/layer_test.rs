//! Layer contract tests: build/call/get_output, owned vs in-place output,
//! fixed-point rounding and saturation.

use nano_vision_core::layers::{Conv2D, Filter, LeakyReLU, MaxPool2D, Min2D, Output, PReLU, Padding, ReLU};
use nano_vision_core::math::Activation;
use nano_vision_core::*;

fn tensor<T: Element>(shape: Shape, exponent: i32, data: &[T]) -> Tensor<T> {
    Tensor::from_vec(shape, exponent, data.to_vec()).unwrap()
}

fn owned_is_realized<T: Element>(output: &Output<T>) -> bool {
    match output {
        Output::Owned(t) => t.is_realized(),
        Output::Aliased => false,
    }
}

// =============================================================================
// Fixed-point rules
// =============================================================================

#[test]
fn test_rescale_rounds_half_up() {
    assert_eq!(rescale(3, -1), 2);
    assert_eq!(rescale(-3, -1), -1);
    assert_eq!(rescale(-5, -2), -1);
    assert_eq!(rescale(6, -2), 2);
    assert_eq!(rescale(5, 2), 20);
    assert_eq!(rescale(7, 0), 7);
}

#[test]
fn test_rescale_extreme_exponents_saturate() {
    assert_eq!(rescale(-1, i32::MIN), 0);
    assert_eq!(rescale(1, i32::MIN), 0);
    assert_eq!(rescale(5, i32::MAX), i64::MAX);
    assert_eq!(rescale(-5, i32::MAX), i64::MIN);
    assert_eq!(rescale(0, i32::MAX), 0);
}

#[test]
fn test_tensor_quantize_and_real_value() {
    let t = Tensor::<i8>::quantize(Shape::d1(3), -2, &[0.5, -0.25, 1.0]).unwrap();
    assert_eq!(t.as_slice(), &[2, -1, 4]);
    assert_eq!(t.real_value(0), Some(0.5));
    assert_eq!(t.real_value(3), None);

    let sat = Tensor::<i8>::quantize(Shape::d1(2), 0, &[1000.0, -1000.0]).unwrap();
    assert_eq!(sat.as_slice(), &[127, -128]);
}

#[test]
fn test_tensor_quantize_extreme_exponents() {
    let tiny = Tensor::<i16>::quantize(Shape::d1(2), i32::MIN, &[0.5, -0.5]).unwrap();
    assert_eq!(tiny.as_slice(), &[i16::MAX, i16::MIN]);
    let huge = Tensor::<i16>::quantize(Shape::d1(1), i32::MAX, &[1000.0]).unwrap();
    assert_eq!(huge.as_slice(), &[0]);
}

#[test]
fn test_tensor_zeros_reports_allocation_failure() {
    // More bytes than any allocation may hold.
    let elements = usize::MAX / 2;
    assert_eq!(
        Tensor::<i16>::zeros(Shape::d1(elements), 0).err(),
        Some(NanoError::AllocationFailed { requested: usize::MAX - 1 })
    );
}

#[test]
fn test_overflowing_shape_is_undefined() {
    let shape = Shape::d2(usize::MAX, 2);
    assert!(!shape.is_defined());
    assert_eq!(shape.checked_total(), None);
    assert_eq!(shape.total(), usize::MAX);
    assert_eq!(Tensor::<i8>::zeros(shape, 0).err(), Some(NanoError::ShapeUndefined));
    assert_eq!(Tensor::<i8>::from_vec(shape, 0, vec![0; 4]).err(), Some(NanoError::ShapeUndefined));

    let mut layer = ReLU::<i8>::new("relu", false);
    assert_eq!(layer.build(&Tensor::with_shape(shape, 0)), Err(NanoError::ShapeUndefined));
}

#[test]
fn test_tensor_lazy_storage() {
    let mut t = Tensor::<i16>::with_shape(Shape::hwc(2, 2, 3), -3);
    assert!(!t.is_realized());
    assert!(t.as_ptr().is_null());
    assert!(t.apply_element().unwrap());
    assert!(!t.apply_element().unwrap());
    assert_eq!(t.size(), 12);

    // Same element count keeps storage, a different one drops it.
    t.set_shape(Shape::hwc(3, 2, 2));
    assert!(t.is_realized());
    t.set_shape(Shape::hwc(1, 1, 1));
    assert!(!t.is_realized());
}

#[test]
fn test_tensor_hwc_access() {
    let mut t = Tensor::<i16>::zeros(Shape::hwc(2, 3, 2), 0).unwrap();
    t.set(1, 2, 1, 42).unwrap();
    assert_eq!(t.get(1, 2, 1), Some(42));
    assert_eq!(t.as_slice()[11], 42);
    assert_eq!(t.get(2, 0, 0), None);
    assert!(t.set(0, 3, 0, 1).is_err());
}

// =============================================================================
// LeakyReLU
// =============================================================================

#[test]
fn test_leaky_relu_owned_leaves_input_untouched() {
    let shape = Shape::hwc(1, 2, 2);
    let mut input = tensor::<i16>(shape, -4, &[-8, -3, 0, 5]);
    // alpha = 64 × 2^-7 = 0.5
    let mut layer = LeakyReLU::new(64i16, -7, "leaky", false);
    layer.build(&input).unwrap();

    let out = layer.call(&mut input, AssignCore::default()).unwrap();
    // -1.5 rounds half up to -1
    assert_eq!(out.as_slice(), &[-4, -1, 0, 5]);
    assert_eq!(out.exponent(), -4);
    assert_eq!(out.shape(), shape);

    assert_eq!(input.as_slice(), &[-8, -3, 0, 5]);
    assert_eq!(input.shape(), shape);
    assert_ne!(layer.get_output(&input).unwrap().as_ptr(), input.as_ptr());
}

#[test]
fn test_leaky_relu_inplace_aliases_input() {
    let mut input = tensor::<i16>(Shape::hwc(1, 2, 2), -4, &[-8, -3, 0, 5]);
    let input_ptr = input.as_ptr();
    let mut layer = LeakyReLU::new(64i16, -7, "leaky", true);
    layer.build(&input).unwrap();
    assert!(layer.is_inplace());

    let out_ptr = layer.call(&mut input, AssignCore::default()).unwrap().as_ptr();
    assert_eq!(out_ptr, input_ptr);
    assert_eq!(input.as_slice(), &[-4, -1, 0, 5]);
    assert_eq!(layer.get_output(&input).unwrap().as_ptr(), input_ptr);
    assert!(matches!(layer.output(), Output::Aliased));
}

#[test]
fn test_leaky_relu_saturates() {
    let mut input = tensor::<i8>(Shape::d1(3), 0, &[-100, -1, 100]);
    let mut layer = LeakyReLU::new(100i8, 0, "leaky", false);
    layer.build(&input).unwrap();
    let out = layer.call(&mut input, AssignCore::default()).unwrap();
    assert_eq!(out.as_slice(), &[-128, -100, 100]);
}

#[test]
fn test_leaky_relu_extreme_alpha_exponent() {
    let mut input = tensor::<i16>(Shape::d1(2), 0, &[-1, 3]);
    let mut vanishing = LeakyReLU::new(1i16, i32::MIN, "leaky", false);
    vanishing.build(&input).unwrap();
    assert_eq!(vanishing.call(&mut input, AssignCore::default()).unwrap().as_slice(), &[0, 3]);

    let mut exploding = LeakyReLU::new(1i16, i32::MAX, "leaky", true);
    exploding.build(&input).unwrap();
    assert_eq!(exploding.call(&mut input, AssignCore::default()).unwrap().as_slice(), &[i16::MIN, 3]);
}

#[test]
fn test_output_exponent_follows_input_each_call() {
    let mut input = tensor::<i16>(Shape::d1(2), -4, &[-2, 2]);
    let mut layer = LeakyReLU::new(64i16, -7, "leaky", false);
    layer.build(&input).unwrap();
    assert_eq!(layer.call(&mut input, AssignCore::default()).unwrap().exponent(), -4);

    input.set_exponent(-6);
    assert_eq!(layer.call(&mut input, AssignCore::default()).unwrap().exponent(), -6);
}

// =============================================================================
// PReLU
// =============================================================================

#[test]
fn test_prelu_broadcasts_alpha_per_channel() {
    let mut input = tensor::<i16>(Shape::hwc(1, 2, 2), 0, &[-4, -4, 6, -2]);
    // 0.5 on channel 0, 1.0 on channel 1
    let mut layer = PReLU::new(vec![64i16, 128], -7, "prelu", false).unwrap();
    layer.build(&input).unwrap();
    let out = layer.call(&mut input, AssignCore::default()).unwrap();
    assert_eq!(out.as_slice(), &[-2, -4, 6, -2]);
}

#[test]
fn test_prelu_zero_alpha_matches_relu() {
    let data = [-7i16, 3, 0, -1, 12, -300, 5, -5];
    let shape = Shape::hwc(2, 2, 2);
    for exponent in [0, -8] {
        let mut a = tensor::<i16>(shape, exponent, &data);
        let mut b = tensor::<i16>(shape, exponent, &data);

        let mut prelu = PReLU::new(vec![0i16, 0], -3, "prelu", false).unwrap();
        let mut relu = ReLU::new("relu", false);
        prelu.build(&a).unwrap();
        relu.build(&b).unwrap();

        let p = prelu.call(&mut a, AssignCore::default()).unwrap();
        let r = relu.call(&mut b, AssignCore::default()).unwrap();
        assert_eq!(p.as_slice(), r.as_slice());
        assert_eq!(p.exponent(), exponent);
        assert_eq!(r.exponent(), exponent);
    }
}

#[test]
fn test_prelu_rejects_wrong_channel_count() {
    let input = tensor::<i16>(Shape::hwc(1, 1, 3), 0, &[1, 2, 3]);
    let mut layer = PReLU::new(vec![1i16, 1], 0, "prelu", false).unwrap();
    assert_eq!(layer.build(&input), Err(NanoError::ParameterMismatch { expected: 3, actual: 2 }));
    assert!(PReLU::<i16>::new(vec![], 0, "empty", false).is_err());
}

// =============================================================================
// Build / call preconditions
// =============================================================================

#[test]
fn test_call_before_build_fails() {
    let mut input = tensor::<i16>(Shape::d1(2), 0, &[1, -1]);
    let mut layer = ReLU::new("relu", false);
    assert_eq!(
        layer.call(&mut input, AssignCore::default()).err(),
        Some(NanoError::NotBuilt { layer: "ReLU" })
    );
    assert!(layer.get_output(&input).is_err());
    assert_eq!(layer.output_spec(), None);
}

#[test]
fn test_call_with_changed_shape_fails() {
    let mut input = tensor::<i16>(Shape::d1(4), 0, &[1, -1, 2, -2]);
    let mut layer = LeakyReLU::new(1i16, 0, "leaky", true);
    layer.build(&input).unwrap();
    input.set_shape(Shape::d2(2, 2));
    assert_eq!(
        layer.call(&mut input, AssignCore::default()).err(),
        Some(NanoError::ShapeMismatch { layer: "LeakyReLU" })
    );
}

#[test]
fn test_build_rejects_undefined_shape() {
    let empty = Tensor::<i16>::new();
    let mut layer = ReLU::new("relu", false);
    assert_eq!(layer.build(&empty), Err(NanoError::ShapeUndefined));
}

#[test]
fn test_rebuild_reuses_or_releases_storage() {
    let mut input = tensor::<i16>(Shape::hwc(2, 2, 1), 0, &[1, -2, 3, -4]);
    let mut layer = ReLU::new("relu", false);
    layer.build(&input).unwrap();
    assert!(!owned_is_realized(layer.output()));

    let first = layer.call(&mut input, AssignCore::default()).unwrap().as_ptr();
    layer.build(&input).unwrap();
    let second = layer.call(&mut input, AssignCore::default()).unwrap().as_ptr();
    assert_eq!(first, second);

    let bigger = tensor::<i16>(Shape::hwc(3, 3, 1), 0, &[0; 9]);
    layer.build(&bigger).unwrap();
    assert!(!owned_is_realized(layer.output()));
    assert_eq!(layer.output_spec(), Some((Shape::hwc(3, 3, 1), 0)));
}

#[test]
fn test_owned_output_allocation_failure_is_reported() {
    let shape = Shape::d1(usize::MAX / 2);
    let mut input = Tensor::<i16>::with_shape(shape, 0);
    let mut layer = ReLU::new("relu", false);
    layer.build(&input).unwrap();
    assert_eq!(
        layer.call(&mut input, AssignCore::default()).err(),
        Some(NanoError::AllocationFailed { requested: usize::MAX - 1 })
    );
    assert!(!owned_is_realized(layer.output()));
}

#[test]
fn test_call_with_unrealized_input_fails() {
    let mut input = Tensor::<i16>::with_shape(Shape::d1(4), 0);
    let mut owned = ReLU::new("relu", false);
    owned.build(&input).unwrap();
    assert_eq!(owned.call(&mut input, AssignCore::default()).err(), Some(NanoError::Unrealized));

    let mut inplace = ReLU::new("relu", true);
    inplace.build(&input).unwrap();
    assert_eq!(inplace.call(&mut input, AssignCore::default()).err(), Some(NanoError::Unrealized));
}

// =============================================================================
// Min2D
// =============================================================================

#[test]
fn test_min2d_owned_and_inplace() {
    let shape = Shape::d1(4);
    let mut a = tensor::<i16>(shape, -2, &[1, 5, -3, 7]);
    let b = tensor::<i16>(shape, -2, &[2, 4, -5, 7]);

    let mut owned = Min2D::new("min", false);
    owned.build(&a, &b).unwrap();
    assert_eq!(owned.call(&mut a, &b, AssignCore::default()).unwrap().as_slice(), &[1, 4, -5, 7]);
    assert_eq!(a.as_slice(), &[1, 5, -3, 7]);

    let mut inplace = Min2D::new("min", true);
    inplace.build(&a, &b).unwrap();
    let ptr = inplace.call(&mut a, &b, AssignCore::default()).unwrap().as_ptr();
    assert_eq!(ptr, a.as_ptr());
    assert_eq!(a.as_slice(), &[1, 4, -5, 7]);
}

#[test]
fn test_min2d_rejects_mismatched_exponents() {
    let a = tensor::<i16>(Shape::d1(2), -2, &[1, 2]);
    let b = tensor::<i16>(Shape::d1(2), -3, &[1, 2]);
    let mut layer = Min2D::new("min", false);
    assert_eq!(layer.build(&a, &b), Err(NanoError::ExponentMismatch { left: -2, right: -3 }));
}

// =============================================================================
// MaxPool2D
// =============================================================================

#[test]
fn test_max_pool2d_valid() {
    let data: Vec<i16> = (0..16).collect();
    let mut input = tensor::<i16>(Shape::hwc(4, 4, 1), -1, &data);
    let mut pool = MaxPool2D::square(2, 2, "pool").unwrap();
    pool.build(&input).unwrap();
    assert_eq!(pool.output_spec(), Some((Shape::hwc(2, 2, 1), -1)));
    let out = pool.call(&mut input, AssignCore::default()).unwrap();
    assert_eq!(out.as_slice(), &[5, 7, 13, 15]);
}

#[test]
fn test_max_pool2d_same_padding() {
    let data: Vec<i16> = (0..9).collect();
    let mut input = tensor::<i16>(Shape::hwc(3, 3, 1), 0, &data);
    let mut pool = MaxPool2D::new([2, 2], Padding::Same, 2, 2, "pool").unwrap();
    pool.build(&input).unwrap();
    let out = pool.call(&mut input, AssignCore::default()).unwrap();
    assert_eq!(out.as_slice(), &[4, 5, 7, 8]);
}

#[test]
fn test_max_pool2d_same_mxnet_pads_top_left() {
    let data: Vec<i16> = (0..9).collect();
    let mut input = tensor::<i16>(Shape::hwc(3, 3, 1), 0, &data);
    let mut pool = MaxPool2D::new([2, 2], Padding::SameMxnet, 2, 2, "pool").unwrap();
    pool.build(&input).unwrap();
    assert_eq!(pool.output_spec(), Some((Shape::hwc(2, 2, 1), 0)));
    let out = pool.call(&mut input, AssignCore::default()).unwrap();
    assert_eq!(out.as_slice(), &[0, 2, 6, 8]);
}

#[test]
fn test_max_pool2d_rejects_zero_stride() {
    assert_eq!(MaxPool2D::<i8>::square(2, 0, "pool").err(), Some(NanoError::InvalidStride));
}

// =============================================================================
// Conv2D
// =============================================================================

#[test]
fn test_conv2d_bias_and_output_exponent() {
    let mut input = tensor::<i16>(Shape::hwc(3, 3, 1), 0, &[1; 9]);
    let filter = Filter::new(vec![1i16; 4], 0, [2, 2, 1, 1]).unwrap();
    // bias 4 × 2^-1 = 2.0, output at 2^1
    let mut conv = Conv2D::new(1, filter, Some((vec![4i16], -1)), None, Padding::Valid, 1, 1, "conv").unwrap();
    conv.build(&input).unwrap();
    assert_eq!(conv.output_spec(), Some((Shape::hwc(2, 2, 1), 1)));
    let out = conv.call(&mut input, AssignCore::default()).unwrap();
    assert_eq!(out.as_slice(), &[3, 3, 3, 3]);
    assert_eq!(out.exponent(), 1);
}

#[test]
fn test_conv2d_fused_relu_per_output_channel() {
    let mut input = tensor::<i16>(Shape::hwc(1, 2, 1), 0, &[3, 5]);
    let filter = Filter::new(vec![1i16, -1], 0, [1, 1, 1, 2]).unwrap();
    let mut conv =
        Conv2D::new(0, filter, None, Some(Activation::ReLU), Padding::Valid, 1, 1, "conv").unwrap();
    conv.build(&input).unwrap();
    let out = conv.call(&mut input, AssignCore::default()).unwrap();
    assert_eq!(out.as_slice(), &[3, 0, 5, 0]);
}

#[test]
fn test_conv2d_dilation_spreads_taps() {
    let mut input = tensor::<i16>(Shape::hwc(1, 5, 1), 0, &[1, 2, 3, 4, 5]);
    let filter = Filter::new(vec![1i16, 1], 0, [1, 2, 1, 1]).unwrap();
    let mut conv = Conv2D::new(0, filter, None, None, Padding::Valid, 1, 1, "conv")
        .and_then(|c| c.with_dilation(1, 2))
        .unwrap();
    assert_eq!(conv.dilation(), [1, 2]);
    conv.build(&input).unwrap();
    assert_eq!(conv.output_spec(), Some((Shape::hwc(1, 3, 1), 0)));
    let out = conv.call(&mut input, AssignCore::default()).unwrap();
    assert_eq!(out.as_slice(), &[4, 6, 8]);
}

#[test]
fn test_conv2d_rejects_zero_dilation() {
    let filter = Filter::new(vec![1i16], 0, [1, 1, 1, 1]).unwrap();
    let conv = Conv2D::new(0, filter, None, None, Padding::Valid, 1, 1, "conv").unwrap();
    assert_eq!(conv.with_dilation(0, 1).err(), Some(NanoError::InvalidStride));
}

#[test]
fn test_conv2d_extreme_exponents_saturate() {
    let mut input = tensor::<i16>(Shape::hwc(1, 1, 1), i32::MAX, &[1]);
    let filter = Filter::new(vec![1i16], i32::MAX, [1, 1, 1, 1]).unwrap();
    let bias = Some((vec![4i16], i32::MIN));
    let mut conv = Conv2D::new(i32::MIN, filter, bias, None, Padding::Valid, 1, 1, "conv").unwrap();
    conv.build(&input).unwrap();
    let out = conv.call(&mut input, AssignCore::default()).unwrap();
    assert_eq!(out.as_slice(), &[i16::MAX]);
    assert_eq!(out.exponent(), i32::MIN);
}

#[test]
fn test_conv2d_rejects_channel_mismatch() {
    let input = tensor::<i16>(Shape::hwc(2, 2, 2), 0, &[0; 8]);
    let filter = Filter::new(vec![1i16; 4], 0, [2, 2, 1, 1]).unwrap();
    let mut conv = Conv2D::new(0, filter, None, None, Padding::Valid, 1, 1, "conv").unwrap();
    assert!(conv.build(&input).is_err());
}
