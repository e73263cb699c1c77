//! Activation functions applied at the end of a layer.

use candle_core::Tensor;
use candle_nn::Module;
use serde::{Deserialize, Serialize};

/// Unary activation applied after the bias add.
///
/// `HardTanh` and `Relu6` saturate, which keeps the next layer's input in a
/// bounded range suitable for activation quantization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerActivation {
    /// `max(x, 0)`.
    Relu,
    /// `min(max(x, 0), 6)`.
    Relu6,
    /// `clamp(x, -1, 1)`.
    HardTanh,
    /// `tanh(x)`.
    Tanh,
    /// `1 / (1 + exp(-x))`.
    Sigmoid,
    /// Gaussian error linear unit (tanh approximation).
    Gelu,
    /// `x * sigmoid(x)`.
    Silu,
}

impl LayerActivation {
    /// Short name used in log lines.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Relu => "relu",
            Self::Relu6 => "relu6",
            Self::HardTanh => "hard_tanh",
            Self::Tanh => "tanh",
            Self::Sigmoid => "sigmoid",
            Self::Gelu => "gelu",
            Self::Silu => "silu",
        }
    }
}

impl Module for LayerActivation {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        match self {
            Self::Relu => xs.relu(),
            Self::Relu6 => xs.clamp(0f32, 6f32),
            Self::HardTanh => xs.clamp(-1f32, 1f32),
            Self::Tanh => xs.tanh(),
            Self::Sigmoid => candle_nn::ops::sigmoid(xs),
            Self::Gelu => xs.gelu(),
            Self::Silu => xs.silu(),
        }
    }
}
