//! Declarative layer descriptions for the model builder.
//!
//! Quantized parameters come from an offline calibration step; this module
//! only turns them into layer instances. With the `serde` feature the
//! descriptions can be loaded from any serde format.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use crate::error::{NanoError, NanoResult};
use crate::layers::{Conv2D, Filter, Layer, LeakyReLU, MaxPool2D, PReLU, Padding, ReLU};
use crate::math::Activation;
use crate::tensor::Element;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum LayerConfig {
    Relu {
        name: String,
        #[cfg_attr(feature = "serde", serde(default))]
        inplace: bool,
    },
    LeakyRelu {
        name: String,
        alpha: i32,
        exponent: i32,
        #[cfg_attr(feature = "serde", serde(default))]
        inplace: bool,
    },
    #[cfg_attr(feature = "serde", serde(rename = "prelu"))]
    PRelu {
        name: String,
        alpha: Vec<i32>,
        exponent: i32,
        #[cfg_attr(feature = "serde", serde(default))]
        inplace: bool,
    },
    #[cfg_attr(feature = "serde", serde(rename = "max_pool2d"))]
    MaxPool2D {
        name: String,
        filter: [usize; 2],
        #[cfg_attr(feature = "serde", serde(default))]
        padding: Padding,
        stride: [usize; 2],
    },
    #[cfg_attr(feature = "serde", serde(rename = "conv2d"))]
    Conv2D {
        name: String,
        output_exponent: i32,
        /// `[filter_h, filter_w, in_channels, out_channels]`
        filter_shape: [usize; 4],
        filter: Vec<i32>,
        filter_exponent: i32,
        #[cfg_attr(feature = "serde", serde(default))]
        bias: Option<(Vec<i32>, i32)>,
        #[cfg_attr(feature = "serde", serde(default))]
        activation: Option<Activation>,
        #[cfg_attr(feature = "serde", serde(default))]
        padding: Padding,
        stride: [usize; 2],
        #[cfg_attr(feature = "serde", serde(default = "dense_dilation"))]
        dilation: [usize; 2],
    },
}

#[cfg(feature = "serde")]
fn dense_dilation() -> [usize; 2] {
    [1, 1]
}

impl LayerConfig {
    pub fn name(&self) -> &str {
        match self {
            LayerConfig::Relu { name, .. }
            | LayerConfig::LeakyRelu { name, .. }
            | LayerConfig::PRelu { name, .. }
            | LayerConfig::MaxPool2D { name, .. }
            | LayerConfig::Conv2D { name, .. } => name,
        }
    }

    /// Instantiates the layer for feature type `T`. Parameters that do not fit
    /// `T` are rejected rather than saturated.
    pub fn into_layer<T: Element>(&self) -> NanoResult<Box<dyn Layer<T>>> {
        let layer: Box<dyn Layer<T>> = match self {
            LayerConfig::Relu { name, inplace } => Box::new(ReLU::<T>::new(name.clone(), *inplace)),
            LayerConfig::LeakyRelu { name, alpha, exponent, inplace } => {
                Box::new(LeakyReLU::new(narrow::<T>(*alpha)?, *exponent, name.clone(), *inplace))
            }
            LayerConfig::PRelu { name, alpha, exponent, inplace } => {
                Box::new(PReLU::new(narrow_all::<T>(alpha)?, *exponent, name.clone(), *inplace)?)
            }
            LayerConfig::MaxPool2D { name, filter, padding, stride } => {
                Box::new(MaxPool2D::<T>::new(*filter, *padding, stride[0], stride[1], name.clone())?)
            }
            LayerConfig::Conv2D {
                name,
                output_exponent,
                filter_shape,
                filter,
                filter_exponent,
                bias,
                activation,
                padding,
                stride,
                dilation,
            } => {
                let filter = Filter::new(narrow_all::<T>(filter)?, *filter_exponent, *filter_shape)?;
                let bias = match bias {
                    Some((values, exponent)) => Some((narrow_all::<T>(values)?, *exponent)),
                    None => None,
                };
                Box::new(Conv2D::new(
                    *output_exponent,
                    filter,
                    bias,
                    *activation,
                    *padding,
                    stride[0],
                    stride[1],
                    name.clone(),
                )?
                .with_dilation(dilation[0], dilation[1])?)
            }
        };
        Ok(layer)
    }
}

fn narrow<T: Element>(value: i32) -> NanoResult<T> {
    if value < T::MIN || value > T::MAX {
        tracing::error!(value, min = T::MIN, max = T::MAX, "quantized parameter out of range");
        return Err(NanoError::ParameterOutOfRange { value });
    }
    Ok(T::saturate(value as i64))
}

fn narrow_all<T: Element>(values: &[i32]) -> NanoResult<Vec<T>> {
    values.iter().map(|&v| narrow::<T>(v)).collect()
}
