//! MaxPool2D over HWC feature maps.
//!
//! No parameters; the output keeps the input exponent. Always owns its
//! output since the spatial extent changes.

use alloc::string::String;

use super::{AssignCore, Binding, Layer, Padding};
use crate::error::{NanoError, NanoResult};
use crate::math::{self, Window};
use crate::tensor::{Element, Shape, Tensor};

pub struct MaxPool2D<T: Element> {
    name: String,
    filter_h: usize,
    filter_w: usize,
    stride_y: usize,
    stride_x: usize,
    padding_type: Padding,
    window: Option<Window>,
    binding: Binding<T>,
}

impl<T: Element> MaxPool2D<T> {
    pub fn new(
        filter: [usize; 2],
        padding_type: Padding,
        stride_y: usize,
        stride_x: usize,
        name: impl Into<String>,
    ) -> NanoResult<Self> {
        if stride_y == 0 || stride_x == 0 {
            return Err(NanoError::InvalidStride);
        }
        if filter[0] == 0 || filter[1] == 0 {
            return Err(NanoError::ShapeUndefined);
        }
        Ok(Self {
            name: name.into(),
            filter_h: filter[0],
            filter_w: filter[1],
            stride_y,
            stride_x,
            padding_type,
            window: None,
            binding: Binding::new("MaxPool2D", false),
        })
    }

    /// Square window with equal strides, VALID padding.
    pub fn square(size: usize, stride: usize, name: impl Into<String>) -> NanoResult<Self> {
        Self::new([size, size], Padding::Valid, stride, stride, name)
    }

    fn plan(&self, input: Shape) -> NanoResult<Window> {
        if input.ndim != 3 {
            return Err(NanoError::DimensionMismatch { expected: 3, actual: input.ndim });
        }
        let (in_h, in_w, channels) = (input.dims[0], input.dims[1], input.dims[2]);
        let same = self.padding_type != Padding::Valid;
        let out_h = math::window_output_size(in_h, self.filter_h, self.stride_y, same);
        let out_w = math::window_output_size(in_w, self.filter_w, self.stride_x, same);
        if out_h == 0 || out_w == 0 {
            return Err(NanoError::DimensionMismatch { expected: self.filter_h.max(self.filter_w), actual: in_h.min(in_w) });
        }
        let padding = math::pad_size(
            (out_h, out_w),
            (in_h, in_w),
            (self.filter_h, self.filter_w),
            (self.stride_y, self.stride_x),
            self.padding_type,
        );
        Ok(Window {
            in_h,
            in_w,
            channels,
            filter_h: self.filter_h,
            filter_w: self.filter_w,
            stride_y: self.stride_y,
            stride_x: self.stride_x,
            dilation_y: 1,
            dilation_x: 1,
            out_h,
            out_w,
            padding,
        })
    }
}

impl<T: Element> Layer<T> for MaxPool2D<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_inplace(&self) -> bool {
        false
    }

    fn build(&mut self, input: &Tensor<T>) -> NanoResult<()> {
        let window = self.plan(input.shape())?;
        let out_shape = Shape::hwc(window.out_h, window.out_w, window.channels);
        self.binding.bind(&self.name, input, out_shape, input.exponent())?;
        self.window = Some(window);
        Ok(())
    }

    fn call<'t>(&'t mut self, input: &'t mut Tensor<T>, assign_core: AssignCore) -> NanoResult<&'t mut Tensor<T>> {
        let window = self.window.ok_or(NanoError::NotBuilt { layer: "MaxPool2D" })?;
        let exponent = input.exponent();
        self.binding.run(
            &self.name,
            input,
            exponent,
            |out, inp| math::max_pool2d(out, inp, &window, assign_core),
            |_| Err(NanoError::NotBuilt { layer: "MaxPool2D" }),
        )
    }

    fn get_output<'t>(&'t self, input: &'t Tensor<T>) -> NanoResult<&'t Tensor<T>> {
        self.binding.resolve(input)
    }

    fn output_spec(&self) -> Option<(Shape, i32)> {
        self.binding.spec()
    }
}
