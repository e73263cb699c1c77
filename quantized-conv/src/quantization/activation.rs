//! Activation quantization over a fixed `[0, 1]` range.
//!
//! Unlike weights, activations are not rescaled by their own statistics.
//! The caller bounds them beforehand, typically with a saturating
//! nonlinearity such as hard-tanh or a clipped ReLU.

use candle_core::Tensor;
use serde::{Deserialize, Serialize};

use super::bitwidth::BitWidth;
use super::ste::{round_to_levels, straight_through};
use crate::error::Result;

/// How the activation quantizer treats inputs outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationRange {
    /// Trust the caller. Out-of-range values round off the level lattice.
    #[default]
    Unchecked,
    /// Clamp into `[0, 1]` before rounding. The gradient is still the identity.
    Clip,
}

/// Fake-quantize activations to `bit_a` bits.
///
/// Computes `round(X * n) / n` with `n = 2^bit_a - 1`. Precondition: `X`
/// already lies in `[0, 1]`; nothing is clipped, so values outside that
/// interval produce levels outside the `2^bit_a` lattice. Use
/// [`quantize_active_overflow_with`] with [`ActivationRange::Clip`] to
/// enforce the range instead.
///
/// # Errors
///
/// Returns error if tensor operations fail.
pub fn quantize_active_overflow(input: &Tensor, bit_a: BitWidth) -> Result<Tensor> {
    quantize_active_overflow_with(input, bit_a, ActivationRange::Unchecked)
}

/// Fake-quantize activations to `bit_a` bits with an explicit range policy.
///
/// A 32-bit width returns the input unchanged.
///
/// # Errors
///
/// Returns error if tensor operations fail.
pub fn quantize_active_overflow_with(
    input: &Tensor,
    bit_a: BitWidth,
    range: ActivationRange,
) -> Result<Tensor> {
    if bit_a.is_full_precision() {
        return Ok(input.clone());
    }

    let bounded = match range {
        ActivationRange::Unchecked => input.clone(),
        ActivationRange::Clip => input.clamp(0f32, 1f32)?,
    };
    let quantized = round_to_levels(&bounded, bit_a.max_level())?;

    straight_through(input, &quantized)
}
