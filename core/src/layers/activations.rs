//! Elementwise activations: ReLU, LeakyReLU, PReLU.
//!
//! All three preserve shape and exponent. The quantized alpha carries its own
//! exponent, independent of the activation input, so the output exponent is
//! re-synchronized to the input on every call.

use alloc::string::String;
use alloc::vec::Vec;

use super::{AssignCore, Binding, Layer, Output};
use crate::error::{NanoError, NanoResult};
use crate::math;
use crate::tensor::{Element, Shape, Tensor};

// =============================================================================
// ReLU
// =============================================================================

/// `max(0, x)`. No parameters.
pub struct ReLU<T: Element> {
    name: String,
    binding: Binding<T>,
}

impl<T: Element> ReLU<T> {
    pub fn new(name: impl Into<String>, inplace: bool) -> Self {
        Self { name: name.into(), binding: Binding::new("ReLU", inplace) }
    }

    pub fn output(&self) -> &Output<T> {
        self.binding.output()
    }
}

impl<T: Element> Layer<T> for ReLU<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_inplace(&self) -> bool {
        self.binding.is_inplace()
    }

    fn build(&mut self, input: &Tensor<T>) -> NanoResult<()> {
        self.binding.bind(&self.name, input, input.shape(), input.exponent())
    }

    fn call<'t>(&'t mut self, input: &'t mut Tensor<T>, assign_core: AssignCore) -> NanoResult<&'t mut Tensor<T>> {
        let exponent = input.exponent();
        self.binding.run(
            &self.name,
            input,
            exponent,
            |out, inp| math::relu(out, inp, assign_core),
            |data| {
                math::relu_inplace(data, assign_core);
                Ok(())
            },
        )
    }

    fn get_output<'t>(&'t self, input: &'t Tensor<T>) -> NanoResult<&'t Tensor<T>> {
        self.binding.resolve(input)
    }

    fn output_spec(&self) -> Option<(Shape, i32)> {
        self.binding.spec()
    }
}

// =============================================================================
// LeakyReLU
// =============================================================================

/// `x >= 0 ? x : x * alpha`, with a single quantized alpha.
pub struct LeakyReLU<T: Element> {
    name: String,
    alpha: T,
    alpha_exponent: i32,
    binding: Binding<T>,
}

impl<T: Element> LeakyReLU<T> {
    /// `alpha` represents `alpha × 2^alpha_exponent`.
    pub fn new(alpha: T, alpha_exponent: i32, name: impl Into<String>, inplace: bool) -> Self {
        Self { name: name.into(), alpha, alpha_exponent, binding: Binding::new("LeakyReLU", inplace) }
    }

    pub fn alpha(&self) -> (T, i32) {
        (self.alpha, self.alpha_exponent)
    }

    pub fn output(&self) -> &Output<T> {
        self.binding.output()
    }
}

impl<T: Element> Layer<T> for LeakyReLU<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_inplace(&self) -> bool {
        self.binding.is_inplace()
    }

    fn build(&mut self, input: &Tensor<T>) -> NanoResult<()> {
        self.binding.bind(&self.name, input, input.shape(), input.exponent())
    }

    fn call<'t>(&'t mut self, input: &'t mut Tensor<T>, assign_core: AssignCore) -> NanoResult<&'t mut Tensor<T>> {
        let (alpha, alpha_exponent) = (self.alpha, self.alpha_exponent);
        let exponent = input.exponent();
        self.binding.run(
            &self.name,
            input,
            exponent,
            |out, inp| math::leaky_relu(out, inp, alpha, alpha_exponent, assign_core),
            |data| {
                math::leaky_relu_inplace(data, alpha, alpha_exponent, assign_core);
                Ok(())
            },
        )
    }

    fn get_output<'t>(&'t self, input: &'t Tensor<T>) -> NanoResult<&'t Tensor<T>> {
        self.binding.resolve(input)
    }

    fn output_spec(&self) -> Option<(Shape, i32)> {
        self.binding.spec()
    }
}

// =============================================================================
// PReLU
// =============================================================================

/// LeakyReLU with one alpha per channel, broadcast along the innermost axis.
pub struct PReLU<T: Element> {
    name: String,
    alpha: Vec<T>,
    alpha_exponent: i32,
    binding: Binding<T>,
}

impl<T: Element> PReLU<T> {
    pub fn new(alpha: Vec<T>, alpha_exponent: i32, name: impl Into<String>, inplace: bool) -> NanoResult<Self> {
        if alpha.is_empty() {
            return Err(NanoError::ParameterMismatch { expected: 1, actual: 0 });
        }
        Ok(Self { name: name.into(), alpha, alpha_exponent, binding: Binding::new("PReLU", inplace) })
    }

    pub fn alpha(&self) -> (&[T], i32) {
        (&self.alpha, self.alpha_exponent)
    }

    pub fn output(&self) -> &Output<T> {
        self.binding.output()
    }
}

impl<T: Element> Layer<T> for PReLU<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_inplace(&self) -> bool {
        self.binding.is_inplace()
    }

    fn build(&mut self, input: &Tensor<T>) -> NanoResult<()> {
        let channels = input.shape().channels();
        if channels != self.alpha.len() {
            return Err(NanoError::ParameterMismatch { expected: channels, actual: self.alpha.len() });
        }
        self.binding.bind(&self.name, input, input.shape(), input.exponent())
    }

    fn call<'t>(&'t mut self, input: &'t mut Tensor<T>, assign_core: AssignCore) -> NanoResult<&'t mut Tensor<T>> {
        let alpha = &self.alpha;
        let alpha_exponent = self.alpha_exponent;
        let exponent = input.exponent();
        self.binding.run(
            &self.name,
            input,
            exponent,
            |out, inp| math::prelu(out, inp, alpha, alpha_exponent, assign_core),
            |data| math::prelu_inplace(data, alpha, alpha_exponent, assign_core),
        )
    }

    fn get_output<'t>(&'t self, input: &'t Tensor<T>) -> NanoResult<&'t Tensor<T>> {
        self.binding.resolve(input)
    }

    fn output_spec(&self) -> Option<(Shape, i32)> {
        self.binding.spec()
    }
}
