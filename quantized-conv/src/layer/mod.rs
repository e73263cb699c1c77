//! Neural network layers with fake quantization.
//!
//! This module provides:
//! - `QuantizedConv2d`: 2D convolution with `bitW`-bit weights and `bitA`-bit inputs
//! - HWIO convolution and bias primitives shared by the layer

mod activation;
mod conv;
mod qconv2d;

pub use activation::LayerActivation;
pub use conv::{bias_add, conv2d, output_size, same_padding};
pub use qconv2d::QuantizedConv2d;
