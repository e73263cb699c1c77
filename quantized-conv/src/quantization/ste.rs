//! Straight-Through Estimator (STE) for gradient estimation.
//!
//! Rounding has a zero gradient almost everywhere. The STE substitutes the
//! identity in the backward pass so full-precision parameters still learn
//! through a fake-quantized forward pass.

use candle_core::Tensor;

use crate::error::Result;

/// Pair a fake-quantized forward value with an identity backward rule.
///
/// Computes `quantized.detach() + (input - input.detach())`. The second term
/// is exactly zero in value, so the forward result is bit-identical to
/// `quantized`, while the gradient with respect to `input` is the upstream
/// gradient unchanged.
///
/// # Errors
///
/// Returns error if the two tensors have different shapes or dtypes.
pub fn straight_through(input: &Tensor, quantized: &Tensor) -> Result<Tensor> {
    let passthrough = input.sub(&input.detach())?;
    Ok(quantized.detach().add(&passthrough)?)
}

/// Round values in `[0, 1]` onto `levels + 1` evenly spaced points.
///
/// Computes `round(x * levels) / levels`. The division is a true division
/// so the top level lands exactly on `1.0`.
///
/// Ties round away from zero (candle's `round`), not half-to-even: with one
/// level step, `0.5` becomes `1.0`.
///
/// # Errors
///
/// Returns error if tensor operations fail.
pub fn round_to_levels(input: &Tensor, levels: f64) -> Result<Tensor> {
    let scaled = input.affine(levels, 0.0)?.round()?;
    Ok(scaled.broadcast_div(&scalar_like(input, levels)?)?)
}

/// Rank-0 tensor holding `value` with the dtype and device of `like`.
pub(crate) fn scalar_like(like: &Tensor, value: f64) -> Result<Tensor> {
    Ok(Tensor::new(value, like.device())?.to_dtype(like.dtype())?)
}
