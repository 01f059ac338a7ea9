//! Conv2D with quantized filter, optional bias and fused activation.

use alloc::string::String;
use alloc::vec::Vec;

use super::{AssignCore, Binding, Layer, Padding};
use crate::error::{NanoError, NanoResult};
use crate::math::{self, Activation, ConvParams, Window};
use crate::tensor::{Element, Shape, Tensor};

/// Quantized filter in `[filter_h, filter_w, in_channels, out_channels]` order.
#[derive(Debug, Clone)]
pub struct Filter<T: Element> {
    pub element: Vec<T>,
    pub exponent: i32,
    pub shape: [usize; 4],
}

impl<T: Element> Filter<T> {
    pub fn new(element: Vec<T>, exponent: i32, shape: [usize; 4]) -> NanoResult<Self> {
        let expected: usize = shape.iter().product();
        if expected == 0 {
            return Err(NanoError::ShapeUndefined);
        }
        if element.len() != expected {
            return Err(NanoError::DimensionMismatch { expected, actual: element.len() });
        }
        Ok(Self { element, exponent, shape })
    }
}

pub struct Conv2D<T: Element> {
    name: String,
    output_exponent: i32,
    filter: Filter<T>,
    bias: Option<(Vec<T>, i32)>,
    activation: Option<Activation>,
    padding_type: Padding,
    stride_y: usize,
    stride_x: usize,
    dilation: [usize; 2],
    window: Option<Window>,
    binding: Binding<T>,
}

impl<T: Element> Conv2D<T> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        output_exponent: i32,
        filter: Filter<T>,
        bias: Option<(Vec<T>, i32)>,
        activation: Option<Activation>,
        padding_type: Padding,
        stride_y: usize,
        stride_x: usize,
        name: impl Into<String>,
    ) -> NanoResult<Self> {
        if stride_y == 0 || stride_x == 0 {
            return Err(NanoError::InvalidStride);
        }
        if let Some((b, _)) = &bias {
            if b.len() != filter.shape[3] {
                return Err(NanoError::ParameterMismatch { expected: filter.shape[3], actual: b.len() });
            }
        }
        Ok(Self {
            name: name.into(),
            output_exponent,
            filter,
            bias,
            activation,
            padding_type,
            stride_y,
            stride_x,
            dilation: [1, 1],
            window: None,
            binding: Binding::new("Conv2D", false),
        })
    }

    /// Spaces the filter taps `dilation_y`/`dilation_x` input cells apart.
    pub fn with_dilation(mut self, dilation_y: usize, dilation_x: usize) -> NanoResult<Self> {
        if dilation_y == 0 || dilation_x == 0 {
            return Err(NanoError::InvalidStride);
        }
        self.dilation = [dilation_y, dilation_x];
        Ok(self)
    }

    pub fn dilation(&self) -> [usize; 2] {
        self.dilation
    }

    fn plan(&self, input: Shape) -> NanoResult<Window> {
        if input.ndim != 3 {
            return Err(NanoError::DimensionMismatch { expected: 3, actual: input.ndim });
        }
        let [fh, fw, fc, _] = self.filter.shape;
        let (in_h, in_w, channels) = (input.dims[0], input.dims[1], input.dims[2]);
        if channels != fc {
            return Err(NanoError::DimensionMismatch { expected: fc, actual: channels });
        }
        let [dy, dx] = self.dilation;
        let (eff_h, eff_w) = (math::dilated_extent(fh, dy), math::dilated_extent(fw, dx));
        let same = self.padding_type != Padding::Valid;
        let out_h = math::window_output_size(in_h, eff_h, self.stride_y, same);
        let out_w = math::window_output_size(in_w, eff_w, self.stride_x, same);
        if out_h == 0 || out_w == 0 {
            return Err(NanoError::DimensionMismatch { expected: eff_h.max(eff_w), actual: in_h.min(in_w) });
        }
        let padding =
            math::pad_size((out_h, out_w), (in_h, in_w), (eff_h, eff_w), (self.stride_y, self.stride_x), self.padding_type);
        Ok(Window {
            in_h,
            in_w,
            channels,
            filter_h: fh,
            filter_w: fw,
            stride_y: self.stride_y,
            stride_x: self.stride_x,
            dilation_y: dy,
            dilation_x: dx,
            out_h,
            out_w,
            padding,
        })
    }
}

impl<T: Element> Layer<T> for Conv2D<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_inplace(&self) -> bool {
        false
    }

    fn build(&mut self, input: &Tensor<T>) -> NanoResult<()> {
        let window = self.plan(input.shape())?;
        let out_shape = Shape::hwc(window.out_h, window.out_w, self.filter.shape[3]);
        self.binding.bind(&self.name, input, out_shape, self.output_exponent)?;
        self.window = Some(window);
        Ok(())
    }

    fn call<'t>(&'t mut self, input: &'t mut Tensor<T>, assign_core: AssignCore) -> NanoResult<&'t mut Tensor<T>> {
        let window = self.window.ok_or(NanoError::NotBuilt { layer: "Conv2D" })?;
        let input_exponent = input.exponent();
        let params = ConvParams {
            filter: &self.filter.element,
            filter_exponent: self.filter.exponent,
            out_channels: self.filter.shape[3],
            bias: self.bias.as_ref().map(|(b, e)| (b.as_slice(), *e)),
            activation: self.activation,
            output_exponent: self.output_exponent,
        };
        self.binding.run(
            &self.name,
            input,
            self.output_exponent,
            |out, inp| math::conv2d(out, inp, input_exponent, &window, &params, assign_core),
            |_| Err(NanoError::NotBuilt { layer: "Conv2D" }),
        )
    }

    fn get_output<'t>(&'t self, input: &'t Tensor<T>) -> NanoResult<&'t Tensor<T>> {
        self.binding.resolve(input)
    }

    fn output_spec(&self) -> Option<(Shape, i32)> {
        self.binding.spec()
    }
}
