//! Error types for quantized-conv.

use thiserror::Error;

/// Result type alias for quantized-conv operations.
pub type Result<T> = std::result::Result<T, QuantConvError>;

/// Errors that can occur while building or running a quantized convolution.
#[derive(Debug, Error)]
pub enum QuantConvError {
    /// Invalid configuration parameter (strides, padding, bit width, ...).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Requested code path is not implemented.
    #[error("not implemented: {0}")]
    Unimplemented(String),

    /// Shape mismatch in tensor operations.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Expected shape.
        expected: Vec<usize>,
        /// Actual shape.
        actual: Vec<usize>,
    },

    /// Tensor rank mismatch.
    #[error("rank mismatch: expected {expected}D, got {actual}D")]
    RankMismatch {
        /// Expected rank.
        expected: usize,
        /// Actual rank.
        actual: usize,
    },

    /// Candle tensor operation error.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),
}

impl QuantConvError {
    /// Create an invalid config error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

impl From<QuantConvError> for candle_core::Error {
    fn from(err: QuantConvError) -> Self {
        match err {
            QuantConvError::Tensor(inner) => inner,
            other => candle_core::Error::Msg(other.to_string()),
        }
    }
}
