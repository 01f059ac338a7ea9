//! Sequential: chain unary layers into a pipeline.
//!
//! ```text
//! Input → Layer[0] → Layer[1] → ... → Layer[N-1] → Output
//! ```
//!
//! `build` walks the chain once, feeding each layer's output spec to the next,
//! so shape errors surface before any data flows. `forward` then threads the
//! tensor through: owned outputs hand over to the next layer, in-place layers
//! mutate whatever they receive.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::config::LayerConfig;
use crate::error::{NanoError, NanoResult};
use crate::layers::{AssignCore, Layer};
use crate::math;
use crate::tensor::{Element, Shape, Tensor};

pub struct Sequential<T: Element> {
    layers: Vec<Box<dyn Layer<T>>>,
    input_spec: Option<(Shape, i32)>,
}

impl<T: Element> Default for Sequential<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> Sequential<T> {
    pub fn new() -> Self {
        Self { layers: Vec::new(), input_spec: None }
    }

    /// Instantiates every layer described by `configs`, in order.
    pub fn from_configs(configs: &[LayerConfig]) -> NanoResult<Self> {
        let mut model = Self::new();
        for config in configs {
            model.push(config.into_layer::<T>()?);
        }
        Ok(model)
    }

    /// Appends a layer. Invalidates any previous build.
    pub fn push(&mut self, layer: Box<dyn Layer<T>>) -> &mut Self {
        self.layers.push(layer);
        self.input_spec = None;
        self
    }

    /// Builds every layer for `input`'s shape and exponent.
    pub fn build(&mut self, input: &Tensor<T>) -> NanoResult<()> {
        let mut shape = input.shape();
        let mut exponent = input.exponent();
        for layer in self.layers.iter_mut() {
            let staged = Tensor::with_shape(shape, exponent);
            layer.build(&staged)?;
            (shape, exponent) = layer.output_spec().ok_or(NanoError::ShapeUndefined)?;
        }
        tracing::debug!(layers = self.layers.len(), input = %input.shape(), output = %shape, "model built");
        self.input_spec = Some((input.shape(), input.exponent()));
        Ok(())
    }

    /// Runs all layers. The result is either a layer-owned tensor or `input`
    /// itself when the last layer producing data worked in place.
    pub fn forward<'t>(&'t mut self, input: &'t mut Tensor<T>, assign_core: AssignCore) -> NanoResult<&'t mut Tensor<T>> {
        let (shape, _) = self.input_spec.ok_or(NanoError::NotBuilt { layer: "Sequential" })?;
        if input.shape() != shape {
            return Err(NanoError::ShapeMismatch { layer: "Sequential" });
        }
        let span = tracing::trace_span!("forward", layers = self.layers.len());
        let _enter = span.enter();

        let mut current = input;
        for layer in self.layers.iter_mut() {
            current = layer.call(current, assign_core)?;
        }
        Ok(current)
    }

    /// Forward pass followed by argmax over the final tensor.
    pub fn predict(&mut self, input: &mut Tensor<T>, assign_core: AssignCore) -> NanoResult<usize> {
        let output = self.forward(input, assign_core)?;
        math::argmax(output.as_slice())
    }

    /// Output spec of the built chain.
    pub fn output_spec(&self) -> Option<(Shape, i32)> {
        self.input_spec?;
        match self.layers.last() {
            Some(layer) => layer.output_spec(),
            None => self.input_spec,
        }
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, idx: usize) -> Option<&dyn Layer<T>> {
        self.layers.get(idx).map(|l| l.as_ref())
    }

    /// Elements held by layer-owned outputs after a full forward pass.
    /// In-place layers contribute nothing.
    pub fn estimate_output_elements(&self) -> usize {
        self.layers
            .iter()
            .filter(|l| !l.is_inplace())
            .filter_map(|l| l.output_spec())
            .map(|(shape, _)| shape.total())
            .sum()
    }
}
