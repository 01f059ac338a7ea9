//! Min2D: elementwise minimum of two tensors.
//!
//! Takes two inputs, so it sits beside the unary [`Layer`](super::Layer)
//! trait with its own `build`/`call` pair. In place, the result is written
//! into `input0`.

use alloc::string::String;

use super::{AssignCore, Binding, Output};
use crate::error::{NanoError, NanoResult};
use crate::math;
use crate::tensor::{Element, Shape, Tensor};

pub struct Min2D<T: Element> {
    name: String,
    binding: Binding<T>,
}

impl<T: Element> Min2D<T> {
    pub fn new(name: impl Into<String>, inplace: bool) -> Self {
        Self { name: name.into(), binding: Binding::new("Min2D", inplace) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_inplace(&self) -> bool {
        self.binding.is_inplace()
    }

    /// Both inputs must share shape and exponent.
    pub fn build(&mut self, input0: &Tensor<T>, input1: &Tensor<T>) -> NanoResult<()> {
        Self::check_pair(input0, input1)?;
        self.binding.bind(&self.name, input0, input0.shape(), input0.exponent())
    }

    pub fn call<'t>(
        &'t mut self,
        input0: &'t mut Tensor<T>,
        input1: &Tensor<T>,
        assign_core: AssignCore,
    ) -> NanoResult<&'t mut Tensor<T>> {
        Self::check_pair(input0, input1)?;
        if !input1.is_realized() {
            return Err(NanoError::Unrealized);
        }
        let exponent = input0.exponent();
        let other = input1.as_slice();
        self.binding.run(
            &self.name,
            input0,
            exponent,
            |out, inp| math::min2d(out, inp, other, assign_core),
            |data| math::min2d_inplace(data, other, assign_core),
        )
    }

    pub fn get_output<'t>(&'t self, input0: &'t Tensor<T>) -> NanoResult<&'t Tensor<T>> {
        self.binding.resolve(input0)
    }

    pub fn output_spec(&self) -> Option<(Shape, i32)> {
        self.binding.spec()
    }

    pub fn output(&self) -> &Output<T> {
        self.binding.output()
    }

    fn check_pair(input0: &Tensor<T>, input1: &Tensor<T>) -> NanoResult<()> {
        if input0.shape() != input1.shape() {
            return Err(NanoError::DimensionMismatch { expected: input0.size(), actual: input1.size() });
        }
        if input0.exponent() != input1.exponent() {
            return Err(NanoError::ExponentMismatch { left: input0.exponent(), right: input1.exponent() });
        }
        Ok(())
    }
}
