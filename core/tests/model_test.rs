//! Sequential model tests: chaining owned and in-place layers, config building.

use nano_vision_core::layers::{LeakyReLU, MaxPool2D, PReLU, ReLU};
use nano_vision_core::*;

fn mixed_chain() -> Sequential<i16> {
    let mut model = Sequential::new();
    model
        .push(Box::new(LeakyReLU::<i16>::new(64i16, -7, "leaky", true)))
        .push(Box::new(MaxPool2D::<i16>::square(2, 2, "pool").unwrap()))
        .push(Box::new(ReLU::<i16>::new("relu", true)))
        .push(Box::new(PReLU::<i16>::new(vec![0i16], 0, "prelu", false).unwrap()));
    model
}

#[test]
fn test_forward_through_owned_and_inplace_layers() {
    let mut input = Tensor::from_vec(Shape::hwc(2, 2, 1), -2, vec![-8i16, 4, -2, 6]).unwrap();
    let mut model = mixed_chain();
    model.build(&input).unwrap();
    assert_eq!(model.output_spec(), Some((Shape::hwc(1, 1, 1), -2)));

    let out = model.forward(&mut input, AssignCore::default()).unwrap();
    let (values, exponent) = (out.as_slice().to_vec(), out.exponent());
    assert_eq!(values, vec![6]);
    assert_eq!(exponent, -2);

    // The first layer worked in place on the caller's tensor.
    assert_eq!(input.as_slice(), &[-4, 4, -1, 6]);
}

#[test]
fn test_forward_returns_input_when_chain_is_inplace() {
    let mut input = Tensor::from_vec(Shape::d1(3), 0, vec![-1i16, 2, -3]).unwrap();
    let ptr = input.as_ptr();
    let mut model = Sequential::new();
    model.push(Box::new(ReLU::<i16>::new("relu", true)));
    model.build(&input).unwrap();

    let out = model.forward(&mut input, AssignCore::default()).unwrap();
    assert_eq!(out.as_ptr(), ptr);
    assert_eq!(out.as_slice(), &[0, 2, 0]);
}

#[test]
fn test_forward_before_build_fails() {
    let mut input = Tensor::from_vec(Shape::d1(2), 0, vec![1i16, 2]).unwrap();
    let mut model = mixed_chain();
    assert_eq!(
        model.forward(&mut input, AssignCore::default()).err(),
        Some(NanoError::NotBuilt { layer: "Sequential" })
    );
}

#[test]
fn test_push_invalidates_build() {
    let mut input = Tensor::from_vec(Shape::d1(2), 0, vec![1i16, 2]).unwrap();
    let mut model = Sequential::new();
    model.push(Box::new(ReLU::<i16>::new("relu", false)));
    model.build(&input).unwrap();
    model.push(Box::new(ReLU::<i16>::new("relu2", false)));
    assert!(model.forward(&mut input, AssignCore::default()).is_err());
    assert_eq!(model.output_spec(), None);
}

#[test]
fn test_build_propagates_layer_errors() {
    let input = Tensor::<i16>::with_shape(Shape::hwc(2, 2, 3), 0);
    let mut model = Sequential::new();
    model.push(Box::new(PReLU::<i16>::new(vec![1i16, 1], 0, "prelu", false).unwrap()));
    assert_eq!(model.build(&input), Err(NanoError::ParameterMismatch { expected: 3, actual: 2 }));
}

#[test]
fn test_predict_and_owned_element_estimate() {
    let mut input = Tensor::from_vec(Shape::hwc(1, 1, 4), 0, vec![3i16, -9, 12, 12]).unwrap();
    let mut model = Sequential::new();
    model.push(Box::new(ReLU::<i16>::new("relu", false)));
    model.build(&input).unwrap();
    assert_eq!(model.predict(&mut input, AssignCore::default()).unwrap(), 2);

    let mut chain = mixed_chain();
    chain.build(&Tensor::<i16>::with_shape(Shape::hwc(4, 4, 1), 0)).unwrap();
    // Only the pool and PReLU outputs are owned: 2×2 each.
    assert_eq!(chain.estimate_output_elements(), 8);
    assert_eq!(chain.num_layers(), 4);
    assert_eq!(chain.layer(1).map(|l| l.name()), Some("pool"));
}

#[test]
fn test_from_configs_builds_equivalent_chain() {
    let configs = vec![
        LayerConfig::LeakyRelu { name: "leaky".into(), alpha: 64, exponent: -7, inplace: true },
        LayerConfig::MaxPool2D { name: "pool".into(), filter: [2, 2], padding: Padding::Valid, stride: [2, 2] },
        LayerConfig::Relu { name: "relu".into(), inplace: true },
        LayerConfig::PRelu { name: "prelu".into(), alpha: vec![0], exponent: 0, inplace: false },
    ];
    let mut model = Sequential::<i16>::from_configs(&configs).unwrap();
    let mut input = Tensor::from_vec(Shape::hwc(2, 2, 1), -2, vec![-8i16, 4, -2, 6]).unwrap();
    model.build(&input).unwrap();
    assert_eq!(model.forward(&mut input, AssignCore::default()).unwrap().as_slice(), &[6]);
    assert_eq!(configs[1].name(), "pool");
}

#[test]
fn test_from_configs_rejects_out_of_range_parameters() {
    let configs = vec![LayerConfig::LeakyRelu { name: "leaky".into(), alpha: 300, exponent: -7, inplace: false }];
    assert_eq!(
        Sequential::<i8>::from_configs(&configs).err(),
        Some(NanoError::ParameterOutOfRange { value: 300 })
    );
}

#[test]
fn test_conv_config() {
    let configs = vec![LayerConfig::Conv2D {
        name: "conv".into(),
        output_exponent: 0,
        filter_shape: [1, 1, 1, 2],
        filter: vec![1, -1],
        filter_exponent: 0,
        bias: None,
        activation: Some(Activation::ReLU),
        padding: Padding::Valid,
        stride: [1, 1],
        dilation: [1, 1],
    }];
    let mut model = Sequential::<i16>::from_configs(&configs).unwrap();
    let mut input = Tensor::from_vec(Shape::hwc(1, 2, 1), 0, vec![3i16, 5]).unwrap();
    model.build(&input).unwrap();
    assert_eq!(model.forward(&mut input, AssignCore::default()).unwrap().as_slice(), &[3, 0, 5, 0]);
}
