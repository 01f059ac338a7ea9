//! Python bindings for nano-vision-core via PyO3.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use nano_vision_core::{
    image::{self, AffineTransform, ImageView, ImageViewMut, Rect, ResizeMode},
    layers::{AssignCore, LeakyReLU, MaxPool2D, PReLU, ReLU},
    model::Sequential,
    tensor::{Shape, Tensor},
};

fn to_py_err(e: nano_vision_core::NanoError) -> PyErr {
    PyValueError::new_err(format!("{}", e))
}

fn parse_mode(mode: &str) -> PyResult<ResizeMode> {
    match mode {
        "nearest" => Ok(ResizeMode::Nearest),
        "mean" => Ok(ResizeMode::Mean),
        "bilinear" => Ok(ResizeMode::Bilinear),
        _ => Err(PyValueError::new_err(format!("unknown resize mode `{}`", mode))),
    }
}

/// A chain of quantized i16 layers.
#[pyclass]
pub struct PySequential {
    model: Sequential<i16>,
    input_shape: Shape,
    input_exponent: i32,
}

#[pymethods]
impl PySequential {
    #[new]
    fn new(input_shape: Vec<usize>, input_exponent: i32) -> PyResult<Self> {
        let shape = Shape::from_dims(&input_shape).map_err(to_py_err)?;
        Ok(Self { model: Sequential::new(), input_shape: shape, input_exponent })
    }

    #[pyo3(signature = (name, inplace=false))]
    fn add_relu(&mut self, name: String, inplace: bool) {
        self.model.push(Box::new(ReLU::<i16>::new(name, inplace)));
    }

    #[pyo3(signature = (name, alpha, alpha_exponent, inplace=false))]
    fn add_leaky_relu(&mut self, name: String, alpha: i16, alpha_exponent: i32, inplace: bool) {
        self.model.push(Box::new(LeakyReLU::new(alpha, alpha_exponent, name, inplace)));
    }

    #[pyo3(signature = (name, alpha, alpha_exponent, inplace=false))]
    fn add_prelu(&mut self, name: String, alpha: Vec<i16>, alpha_exponent: i32, inplace: bool) -> PyResult<()> {
        let layer = PReLU::new(alpha, alpha_exponent, name, inplace).map_err(to_py_err)?;
        self.model.push(Box::new(layer));
        Ok(())
    }

    fn add_max_pool2d(&mut self, name: String, pool_h: usize, pool_w: usize, stride: usize) -> PyResult<()> {
        let layer = MaxPool2D::<i16>::new([pool_h, pool_w], Default::default(), stride, stride, name).map_err(to_py_err)?;
        self.model.push(Box::new(layer));
        Ok(())
    }

    fn build(&mut self) -> PyResult<()> {
        let template = Tensor::with_shape(self.input_shape, self.input_exponent);
        self.model.build(&template).map_err(to_py_err)
    }

    /// Returns `(values, exponent)` of the final tensor.
    fn forward(&mut self, input: Vec<i16>) -> PyResult<(Vec<i16>, i32)> {
        let mut tensor = Tensor::from_vec(self.input_shape, self.input_exponent, input).map_err(to_py_err)?;
        let output = self.model.forward(&mut tensor, AssignCore::default()).map_err(to_py_err)?;
        Ok((output.as_slice().to_vec(), output.exponent()))
    }

    fn predict(&mut self, input: Vec<i16>) -> PyResult<usize> {
        let mut tensor = Tensor::from_vec(self.input_shape, self.input_exponent, input).map_err(to_py_err)?;
        self.model.predict(&mut tensor, AssignCore::default()).map_err(to_py_err)
    }

    fn output_shape(&self) -> PyResult<Vec<usize>> {
        let (shape, _) = self.model.output_spec().ok_or_else(|| PyValueError::new_err("model is not built"))?;
        Ok(shape.as_slice().to_vec())
    }

    fn num_layers(&self) -> usize {
        self.model.num_layers()
    }

    fn layer_names(&self) -> Vec<String> {
        (0..self.model.num_layers()).filter_map(|i| self.model.layer(i)).map(|l| l.name().to_string()).collect()
    }
}

/// Crops `src_rect` of an 8-bit HWC frame into `dst_rect` of a new frame.
#[pyfunction]
#[pyo3(signature = (src, src_shape, src_rect, dst_shape, dst_rect, mode="nearest", shift_left=0))]
fn crop_and_resize_u8(
    src: Vec<u8>,
    src_shape: (usize, usize, usize),
    src_rect: (i32, i32, i32, i32),
    dst_shape: (usize, usize, usize),
    dst_rect: (i32, i32, i32, i32),
    mode: &str,
    shift_left: i32,
) -> PyResult<Vec<u8>> {
    let mode = parse_mode(mode)?;
    let (sh, sw, sc) = src_shape;
    let (dh, dw, dc) = dst_shape;
    let src = ImageView::new(src.as_slice(), sh, sw, sc).map_err(to_py_err)?;
    let mut out = vec![0u8; dh * dw * dc];
    let mut dst = ImageViewMut::new(out.as_mut_slice(), dh, dw, dc).map_err(to_py_err)?;
    let (sx0, sy0, sx1, sy1) = src_rect;
    let (dx0, dy0, dx1, dy1) = dst_rect;
    image::crop_and_resize(
        &mut dst,
        Rect::new(dx0, dy0, dx1, dy1),
        &src,
        Rect::new(sx0, sy0, sx1, sy1),
        mode,
        shift_left,
    )
    .map_err(to_py_err)?;
    Ok(out)
}

/// Warps an 8-bit HWC frame through the inverse transform `m_inv` (2×3 rows).
#[pyfunction]
#[pyo3(signature = (src, src_shape, dst_shape, m_inv, mode="bilinear", shift_left=0))]
fn warp_affine_u8(
    src: Vec<u8>,
    src_shape: (usize, usize, usize),
    dst_shape: (usize, usize, usize),
    m_inv: ([f32; 3], [f32; 3]),
    mode: &str,
    shift_left: i32,
) -> PyResult<Vec<u8>> {
    let mode = parse_mode(mode)?;
    let (sh, sw, sc) = src_shape;
    let (dh, dw, dc) = dst_shape;
    let src = ImageView::new(src.as_slice(), sh, sw, sc).map_err(to_py_err)?;
    let mut out = vec![0u8; dh * dw * dc];
    let mut dst = ImageViewMut::new(out.as_mut_slice(), dh, dw, dc).map_err(to_py_err)?;
    let m = AffineTransform::from_rows(m_inv.0, m_inv.1);
    image::warp_affine(&mut dst, &src, &m, mode, shift_left).map_err(to_py_err)?;
    Ok(out)
}

/// RGB565 frame to interleaved `[b, g, r]` bytes.
#[pyfunction]
fn rgb565_to_rgb888(src: Vec<u16>) -> PyResult<Vec<u8>> {
    let mut out = vec![0u8; src.len() * 3];
    image::convert_rgb565_to_rgb888(&src, &mut out).map_err(to_py_err)?;
    Ok(out)
}

#[pyfunction]
fn rgb565_to_gray(src: Vec<u16>) -> PyResult<Vec<u8>> {
    let mut out = vec![0u8; src.len()];
    image::convert_rgb565_to_gray(&src, &mut out).map_err(to_py_err)?;
    Ok(out)
}

#[pymodule]
fn nano_vision_py(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PySequential>()?;
    m.add_function(wrap_pyfunction!(crop_and_resize_u8, m)?)?;
    m.add_function(wrap_pyfunction!(warp_affine_u8, m)?)?;
    m.add_function(wrap_pyfunction!(rgb565_to_rgb888, m)?)?;
    m.add_function(wrap_pyfunction!(rgb565_to_gray, m)?)?;
    Ok(())
}
