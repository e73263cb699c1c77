//! Quantization-aware 2D convolution for candle.
//!
//! Simulates low-bitwidth fixed-point inference while training in full
//! precision ("fake quantization"):
//! - **Weights** are rounded to `bitW` bits over their own dynamic range
//! - **Input activations** are rounded to `bitA` bits over `[0, 1]`
//! - **Gradients** pass straight through both roundings (STE)
//!
//! # Features
//!
//! - `QuantizedConv2d`: convolution layer that re-quantizes on every forward pass
//! - `quantize_weight_overflow` / `quantize_active_overflow`: standalone transforms
//! - SAME / VALID padding, NHWC / NCHW layouts, independent height/width strides
//!
//! # Quick Start
//!
//! ```ignore
//! use candle_core::{DType, Device, Tensor};
//! use candle_nn::{VarBuilder, VarMap};
//! use quantized_conv::{BitWidth, QuantizedConv2d, QuantizedConv2dConfig};
//!
//! let device = Device::Cpu;
//! let varmap = VarMap::new();
//! let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
//!
//! let bits = BitWidth::new(4)?;
//! let config = QuantizedConv2dConfig::new(16, (3, 3)).with_bits(bits, bits);
//! let layer = QuantizedConv2d::new(Some(3), &config, vb)?;
//!
//! let input = Tensor::rand(0f32, 1f32, (4, 28, 28, 3), &device)?;
//! let output = layer.forward(&input)?;
//! ```
//!
//! # Quantization
//!
//! ## Weights (dynamic range)
//!
//! ```text
//! s   = max(|W|)
//! W'  = W / 2s + 0.5
//! W_q = (round(W' * (2^bitW - 1)) / (2^bitW - 1) - 0.5) * 2s
//! ```
//!
//! With `bitW = 1` the output is `sign(W) * s` (or `* mean(|W|)`, see
//! [`BinaryScale`]).
//!
//! ## Activations (fixed range)
//!
//! ```text
//! X_q = round(X * (2^bitA - 1)) / (2^bitA - 1)
//! ```
//!
//! # Feature Flags
//!
//! - `default`: CPU-only
//! - `cuda`: Enable candle CUDA backend

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::doc_markdown)] // Many technical terms don't need backticks

mod config;
mod error;
pub mod layer;
pub mod quantization;

pub use config::{ChannelResolution, DataFormat, Padding, QuantizedConv2dConfig};
pub use error::{QuantConvError, Result};
pub use layer::{LayerActivation, QuantizedConv2d};
pub use quantization::{
    quantize_active_overflow, quantize_active_overflow_with, quantize_weight_overflow,
    quantize_weight_overflow_with, ActivationRange, BinaryScale, BitWidth,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{Padding, QuantizedConv2dConfig};
    pub use crate::error::{QuantConvError, Result};
    pub use crate::layer::QuantizedConv2d;
    pub use crate::quantization::{quantize_active_overflow, quantize_weight_overflow, BitWidth};
}
