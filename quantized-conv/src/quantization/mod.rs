//! Fake-quantization transforms.
//!
//! This module provides:
//! - **Weight quantization**: global max-abs dynamic range -> `2^bitW` levels
//! - **Activation quantization**: fixed `[0, 1]` range -> `2^bitA` levels
//!
//! Both keep full-precision storage and pass gradients straight through.

mod activation;
mod bitwidth;
mod ste;
mod weight;

pub use activation::{quantize_active_overflow, quantize_active_overflow_with, ActivationRange};
pub use bitwidth::BitWidth;
pub use ste::{round_to_levels, straight_through};
pub use weight::{
    max_abs, mean_abs, quantize_weight_overflow, quantize_weight_overflow_with, BinaryScale,
};
