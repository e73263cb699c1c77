//! Weight quantization with a data-dependent dynamic range.
//!
//! The range is the global `max(|W|)` of the tensor, recomputed on every
//! call. Values are mapped into `[0, 1]`, rounded onto `2^bitW` levels and
//! mapped back to `[-max|W|, +max|W|]`.

use candle_core::{DType, Tensor};
use serde::{Deserialize, Serialize};

use super::bitwidth::BitWidth;
use super::ste::{round_to_levels, scalar_like, straight_through};
use crate::error::Result;

/// Scale used for 1-bit (sign only) weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryScale {
    /// `sign(W) * max(|W|)`.
    #[default]
    MaxAbs,
    /// `sign(W) * mean(|W|)`, as in binarized-weight networks.
    MeanAbs,
}

/// Global `max(|x|)` of a tensor as an `f64`.
///
/// # Errors
///
/// Returns error if the tensor is empty or the reduction fails.
pub fn max_abs(input: &Tensor) -> Result<f64> {
    let value = input
        .abs()?
        .flatten_all()?
        .max(0)?
        .to_dtype(DType::F64)?
        .to_scalar::<f64>()?;
    Ok(value)
}

/// Global `mean(|x|)` of a tensor as an `f64`.
///
/// # Errors
///
/// Returns error if the reduction fails.
pub fn mean_abs(input: &Tensor) -> Result<f64> {
    let value = input
        .abs()?
        .mean_all()?
        .to_dtype(DType::F64)?
        .to_scalar::<f64>()?;
    Ok(value)
}

/// Fake-quantize weights to `bit_w` bits over their own dynamic range.
///
/// Uses [`BinaryScale::MaxAbs`] for the 1-bit case. See
/// [`quantize_weight_overflow_with`].
///
/// # Errors
///
/// Returns error if tensor operations fail.
pub fn quantize_weight_overflow(weight: &Tensor, bit_w: BitWidth) -> Result<Tensor> {
    quantize_weight_overflow_with(weight, bit_w, BinaryScale::MaxAbs)
}

/// Fake-quantize weights to `bit_w` bits over their own dynamic range.
///
/// # Algorithm
///
/// 1. `s = max(|W|)` over the whole tensor
/// 2. `bit_w == 1`: `sign(W) * c` with `c` chosen by `binary_scale` and
///    `sign(0) = +1`
/// 3. otherwise: `W' = W / 2s + 0.5`, `Q = round(W' * n) / n` with
///    `n = 2^bit_w - 1`, output `(Q - 0.5) * 2s`
///
/// The forward value is the rounded tensor, the gradient is the identity
/// (no clipping). An all-zero tensor yields zeros. A 32-bit width returns
/// the input unchanged.
///
/// # Errors
///
/// Returns error if tensor operations fail.
pub fn quantize_weight_overflow_with(
    weight: &Tensor,
    bit_w: BitWidth,
    binary_scale: BinaryScale,
) -> Result<Tensor> {
    if bit_w.is_full_precision() || weight.elem_count() == 0 {
        return Ok(weight.clone());
    }

    let scale = max_abs(weight)?;
    if scale <= 0.0 {
        return straight_through(weight, &weight.zeros_like()?);
    }

    let quantized = if bit_w.is_binary() {
        let magnitude = match binary_scale {
            BinaryScale::MaxAbs => scale,
            BinaryScale::MeanAbs => mean_abs(weight)?,
        };
        binarize(weight, magnitude)?
    } else {
        let two_s = scalar_like(weight, 2.0 * scale)?;
        let normalized = weight.broadcast_div(&two_s)?.affine(1.0, 0.5)?;
        let rounded = round_to_levels(&normalized, bit_w.max_level())?;
        rounded.affine(1.0, -0.5)?.broadcast_mul(&two_s)?
    };

    straight_through(weight, &quantized)
}

/// `sign(W) * magnitude` with zeros mapped to `+magnitude`.
fn binarize(weight: &Tensor, magnitude: f64) -> Result<Tensor> {
    let positive = weight.ones_like()?.affine(magnitude, 0.0)?;
    let negative = weight.ones_like()?.affine(-magnitude, 0.0)?;
    let mask = weight.ge(&weight.zeros_like()?)?;
    Ok(mask.where_cond(&positive, &negative)?)
}
