//! Layer contract: `build` once per input shape, `call` repeatedly.
//!
//! A layer either owns its output tensor or works in place on the tensor
//! handed to `call`. The choice is made at construction and recorded in
//! [`Output`]; an in-place layer never keeps a pointer to its input, it
//! resolves the alias against whatever `call`/`get_output` receives.

pub mod activations;
pub mod conv;
pub mod min2d;
pub mod pooling;

use crate::error::{NanoError, NanoResult};
use crate::tensor::{Element, Shape, Tensor};

/// Core-assignment hint forwarded to the kernels. Not effective yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AssignCore(pub u8);

/// Zero padding policy for windowed layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Padding {
    /// No padding; windows must fit inside the input.
    #[default]
    Valid,
    /// Output extent is `ceil(input / stride)`; odd padding goes bottom/right.
    Same,
    /// As [`Padding::Same`], but odd padding goes top/left.
    SameMxnet,
}

pub trait Layer<T: Element>: Send {
    /// Diagnostic name given at construction.
    fn name(&self) -> &str;

    fn is_inplace(&self) -> bool;

    /// Fixes output shape and exponent for `input`'s shape and exponent.
    fn build(&mut self, input: &Tensor<T>) -> NanoResult<()>;

    /// Runs the layer. Returns the owned output, or `input` itself when the
    /// layer works in place.
    fn call<'t>(&'t mut self, input: &'t mut Tensor<T>, assign_core: AssignCore) -> NanoResult<&'t mut Tensor<T>>;

    /// Last computed output. For in-place layers this is `input`.
    fn get_output<'t>(&'t self, input: &'t Tensor<T>) -> NanoResult<&'t Tensor<T>>;

    /// Shape and exponent established by the last `build`.
    fn output_spec(&self) -> Option<(Shape, i32)>;
}

/// Where a layer's result lives.
#[derive(Debug)]
pub enum Output<T: Element> {
    /// A separate tensor owned by the layer; exactly one allocation.
    Owned(Tensor<T>),
    /// The input tensor passed to `call`, mutated directly.
    Aliased,
}

/// Output slot plus the input spec it was built against.
#[derive(Debug)]
pub(crate) struct Binding<T: Element> {
    kind: &'static str,
    output: Output<T>,
    input: Option<(Shape, i32)>,
}

impl<T: Element> Binding<T> {
    pub(crate) fn new(kind: &'static str, inplace: bool) -> Self {
        let output = if inplace { Output::Aliased } else { Output::Owned(Tensor::new()) };
        Self { kind, output, input: None }
    }

    pub(crate) fn is_inplace(&self) -> bool {
        matches!(self.output, Output::Aliased)
    }

    /// Records `input` and shapes the owned output. Storage is kept when the
    /// element count is stable; `set_shape` releases it otherwise.
    pub(crate) fn bind(&mut self, name: &str, input: &Tensor<T>, out_shape: Shape, out_exponent: i32) -> NanoResult<()> {
        let in_shape = input.shape();
        if !in_shape.is_defined() || !out_shape.is_defined() {
            tracing::error!(layer = name, kind = self.kind, "build with undefined shape");
            return Err(NanoError::ShapeUndefined);
        }
        match &mut self.output {
            Output::Owned(out) => {
                let reuse = out.is_realized() && out.size() == out_shape.total();
                out.set_shape(out_shape).set_exponent(out_exponent);
                tracing::debug!(layer = name, kind = self.kind, shape = %out_shape, exponent = out_exponent, reuse, "build");
            }
            Output::Aliased => {
                if out_shape != in_shape {
                    return Err(NanoError::ShapeMismatch { layer: self.kind });
                }
                tracing::debug!(layer = name, kind = self.kind, shape = %in_shape, "build in place");
            }
        }
        self.input = Some((in_shape, input.exponent()));
        Ok(())
    }

    /// Checks the call preconditions against what `build` recorded. Input
    /// storage is checked separately, after the output is allocated.
    pub(crate) fn check(&self, name: &str, input: &Tensor<T>) -> NanoResult<()> {
        let Some((shape, _)) = self.input else {
            tracing::error!(layer = name, kind = self.kind, "call before build");
            return Err(NanoError::NotBuilt { layer: self.kind });
        };
        if input.shape() != shape {
            tracing::error!(layer = name, kind = self.kind, built = %shape, got = %input.shape(), "input shape changed since build");
            return Err(NanoError::ShapeMismatch { layer: self.kind });
        }
        Ok(())
    }

    fn check_realized(input: &Tensor<T>) -> NanoResult<()> {
        if !input.is_realized() {
            return Err(NanoError::Unrealized);
        }
        Ok(())
    }

    /// Unary dispatch: `separate(out, in)` for an owned output, `inplace(in)`
    /// otherwise. `exponent` is written to the owned output before compute.
    pub(crate) fn run<'t, F, G>(
        &'t mut self,
        name: &str,
        input: &'t mut Tensor<T>,
        exponent: i32,
        separate: F,
        inplace: G,
    ) -> NanoResult<&'t mut Tensor<T>>
    where
        F: FnOnce(&mut [T], &[T]) -> NanoResult<()>,
        G: FnOnce(&mut [T]) -> NanoResult<()>,
    {
        self.check(name, input)?;
        match &mut self.output {
            Output::Owned(out) => {
                if out.apply_element().inspect_err(|e| {
                    tracing::error!(layer = name, kind = self.kind, elements = out.size(), error = %e, "output allocation failed");
                })? {
                    tracing::debug!(layer = name, kind = self.kind, elements = out.size(), "allocated output");
                }
                Self::check_realized(input)?;
                out.set_exponent(exponent);
                tracing::trace!(layer = name, kind = self.kind, exponent, "call");
                separate(out.as_mut_slice(), input.as_slice())?;
                Ok(out)
            }
            Output::Aliased => {
                Self::check_realized(input)?;
                tracing::trace!(layer = name, kind = self.kind, exponent = input.exponent(), "call in place");
                inplace(input.as_mut_slice())?;
                Ok(input)
            }
        }
    }

    pub(crate) fn resolve<'t>(&'t self, input: &'t Tensor<T>) -> NanoResult<&'t Tensor<T>> {
        if self.input.is_none() {
            return Err(NanoError::NotBuilt { layer: self.kind });
        }
        match &self.output {
            Output::Owned(out) => Ok(out),
            Output::Aliased => Ok(input),
        }
    }

    pub(crate) fn spec(&self) -> Option<(Shape, i32)> {
        let input = self.input?;
        match &self.output {
            Output::Owned(out) => Some((out.shape(), out.exponent())),
            Output::Aliased => Some(input),
        }
    }

    pub(crate) fn output(&self) -> &Output<T> {
        &self.output
    }
}

pub use activations::{LeakyReLU, PReLU, ReLU};
pub use conv::{Conv2D, Filter};
pub use min2d::Min2D;
pub use pooling::MaxPool2D;
