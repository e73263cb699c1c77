//! Bit width of a fake-quantization transform.

use serde::{Deserialize, Serialize};

use crate::error::{QuantConvError, Result};

/// Number of bits a quantizer rounds to.
///
/// A bit width `b` produces `2^b` evenly spaced levels. The special value
/// [`BitWidth::FULL_PRECISION`] (32 bits) disables quantization entirely and
/// the quantizers return their input untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct BitWidth(u8);

impl BitWidth {
    /// Largest supported bit width; also means "do not quantize".
    pub const FULL_PRECISION: Self = Self(32);

    /// Create a bit width, rejecting 0 and anything above 32.
    ///
    /// # Errors
    ///
    /// Returns [`QuantConvError::InvalidConfig`] when `bits` is out of range.
    pub fn new(bits: u8) -> Result<Self> {
        if bits == 0 || bits > 32 {
            return Err(QuantConvError::InvalidConfig(format!(
                "bit width must be 1-32, got {bits}"
            )));
        }
        Ok(Self(bits))
    }

    /// Raw number of bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether this width skips quantization.
    #[must_use]
    pub const fn is_full_precision(self) -> bool {
        self.0 >= 32
    }

    /// Whether this is the 1-bit (sign only) case.
    #[must_use]
    pub const fn is_binary(self) -> bool {
        self.0 == 1
    }

    /// Number of representable levels, `2^b`.
    #[must_use]
    pub fn levels(self) -> u64 {
        1u64 << self.0
    }

    /// Index of the top level, `2^b - 1`, as the rounding multiplier.
    #[must_use]
    pub fn max_level(self) -> f64 {
        (self.levels() - 1) as f64
    }
}

impl Default for BitWidth {
    fn default() -> Self {
        Self(8)
    }
}

impl TryFrom<u8> for BitWidth {
    type Error = QuantConvError;

    fn try_from(bits: u8) -> Result<Self> {
        Self::new(bits)
    }
}

impl From<BitWidth> for u8 {
    fn from(width: BitWidth) -> Self {
        width.0
    }
}

impl std::fmt::Display for BitWidth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-bit", self.0)
    }
}
