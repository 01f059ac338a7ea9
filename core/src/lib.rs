//! # nano-vision-core: quantized layers and camera preprocessing
//!
//! A `no_std` library for the front half of an on-device vision pipeline on
//! microcontrollers (ESP32-S3 class): camera frames are converted, cropped,
//! resized or warped into a fixed-point tensor, which then flows through a
//! chain of quantized layers.
//!
//! ## Architecture
//!
//! - **Tensor**: `i8`/`i16`/`u8` samples sharing one power-of-two exponent
//! - **Layer contract**: `build` once, `call` per frame, owned or in-place output
//! - **Kernels**: LeakyReLU, PReLU, ReLU, Min2D, MaxPool2D, Conv2D in `math`
//! - **Image engine**: RGB565/888/Gray conversion, crop+resize+pad, affine warp
//!
//! ## Usage
//!
//! ```ignore
//! use nano_vision_core::*;
//!
//! // RGB565 camera frame → 96×96 gray tensor at exponent 0
//! let src = ImageView::new(&frame, 240, 320, 3)?;
//! let mut input = Tensor::<i16>::zeros(Shape::hwc(96, 96, 1), 0)?;
//! let mut dst = ImageViewMut::new(input.as_mut_slice(), 96, 96, 1)?;
//! resize(&mut dst, &src, ResizeMode::Bilinear, 0)?;
//!
//! let mut model = Sequential::new();
//! model.push(Box::new(LeakyReLU::new(13, -7, "leaky", true)));
//! model.build(&input)?;
//! let output = model.forward(&mut input, AssignCore::default())?;
//! ```

#![no_std]

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

pub mod config;
pub mod error;
pub mod image;
pub mod layers;
pub mod math;
pub mod model;
pub mod tensor;

pub use config::LayerConfig;
pub use error::{NanoError, NanoResult};
pub use image::{
    convert_rgb565_to_gray, convert_rgb565_to_rgb888, crop_and_resize, resize, rgb565_to_gray, rgb565_to_rgb888,
    rgb888_to_gray, rgb888_to_rgb565, warp_affine, AffineTransform, ImageView, ImageViewMut, PixelFormat, Rect,
    ResizeMode,
};
pub use layers::{AssignCore, Conv2D, Filter, Layer, LeakyReLU, MaxPool2D, Min2D, Output, PReLU, Padding, ReLU};
pub use math::{rescale, Activation};
pub use model::Sequential;
pub use tensor::{Element, Shape, Tensor};
