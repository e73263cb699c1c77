//! Configuration for quantized convolution layers.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{QuantConvError, Result};
use crate::layer::LayerActivation;
use crate::quantization::{ActivationRange, BinaryScale, BitWidth};

/// Spatial padding algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Padding {
    /// Zero-pad so the output is `ceil(input / stride)`.
    #[default]
    #[serde(rename = "SAME")]
    Same,
    /// No padding; the output shrinks by the filter extent.
    #[serde(rename = "VALID")]
    Valid,
}

impl FromStr for Padding {
    type Err = QuantConvError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SAME" => Ok(Self::Same),
            "VALID" => Ok(Self::Valid),
            other => Err(QuantConvError::InvalidConfig(format!(
                "padding must be \"SAME\" or \"VALID\", got {other:?}"
            ))),
        }
    }
}

impl std::fmt::Display for Padding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Same => f.write_str("SAME"),
            Self::Valid => f.write_str("VALID"),
        }
    }
}

/// Memory layout of 4D activations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DataFormat {
    /// `[batch, height, width, channels]`.
    #[default]
    #[serde(rename = "NHWC")]
    Nhwc,
    /// `[batch, channels, height, width]`.
    #[serde(rename = "NCHW")]
    Nchw,
}

impl DataFormat {
    /// Axis holding channels in a 4D tensor.
    #[must_use]
    pub const fn channel_axis(self) -> usize {
        match self {
            Self::Nhwc => 3,
            Self::Nchw => 1,
        }
    }
}

/// What to do when the input channel count cannot be determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelResolution {
    /// Assume a single input channel and log a warning.
    #[default]
    FallbackToSingle,
    /// Refuse to build the layer.
    Strict,
}

/// Configuration for [`QuantizedConv2d`](crate::QuantizedConv2d).
///
/// Weights are quantized to `bit_w` bits and the incoming activations to
/// `bit_a` bits on every forward pass. The bias is never quantized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizedConv2dConfig {
    /// Number of output filters.
    pub n_filter: usize,

    /// Filter extent `(height, width)`.
    pub filter_size: (usize, usize),

    /// Spatial strides `(height, width)`. Must have exactly two entries.
    pub strides: Vec<usize>,

    /// Padding algorithm.
    pub padding: Padding,

    /// Weight bit width.
    pub bit_w: BitWidth,

    /// Input activation bit width.
    pub bit_a: BitWidth,

    /// Use a GEMM kernel for inference. Not implemented; must stay `false`.
    pub use_gemm: bool,

    /// Whether to create and add a bias vector.
    pub use_bias: bool,

    /// Layout of input and output tensors.
    pub data_format: DataFormat,

    /// Activation applied after the bias. `None` is the identity.
    pub activation: Option<LayerActivation>,

    /// Scale used by the 1-bit weight branch.
    pub binary_scale: BinaryScale,

    /// Range policy for the activation quantizer.
    pub activation_range: ActivationRange,

    /// Policy for an unknown input channel count.
    pub channel_resolution: ChannelResolution,

    /// Standard deviation of the normal weight initializer.
    pub weight_init_stddev: f64,

    /// Constant bias initializer.
    pub bias_init: f64,

    /// Variable name prefix.
    pub name: String,
}

impl Default for QuantizedConv2dConfig {
    fn default() -> Self {
        Self {
            n_filter: 32,
            filter_size: (3, 3),
            strides: vec![1, 1],
            padding: Padding::Same,
            bit_w: BitWidth::default(),
            bit_a: BitWidth::default(),
            use_gemm: false,
            use_bias: true,
            data_format: DataFormat::Nhwc,
            activation: None,
            binary_scale: BinaryScale::MaxAbs,
            activation_range: ActivationRange::Unchecked,
            channel_resolution: ChannelResolution::FallbackToSingle,
            weight_init_stddev: 0.02,
            bias_init: 0.0,
            name: "quan_cnn2d".to_string(),
        }
    }
}

impl QuantizedConv2dConfig {
    /// Create a configuration with `n_filter` filters of `filter_size`.
    #[must_use]
    pub fn new(n_filter: usize, filter_size: (usize, usize)) -> Self {
        Self {
            n_filter,
            filter_size,
            ..Default::default()
        }
    }

    /// Set the strides.
    #[must_use]
    pub fn with_strides(mut self, strides: &[usize]) -> Self {
        self.strides = strides.to_vec();
        self
    }

    /// Set the padding algorithm.
    #[must_use]
    pub fn with_padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    /// Set weight and activation bit widths.
    #[must_use]
    pub fn with_bits(mut self, bit_w: BitWidth, bit_a: BitWidth) -> Self {
        self.bit_w = bit_w;
        self.bit_a = bit_a;
        self
    }

    /// Request the GEMM inference path.
    #[must_use]
    pub fn with_gemm(mut self, enabled: bool) -> Self {
        self.use_gemm = enabled;
        self
    }

    /// Enable or disable the bias vector.
    #[must_use]
    pub fn with_bias(mut self, enabled: bool) -> Self {
        self.use_bias = enabled;
        self
    }

    /// Set the data format.
    #[must_use]
    pub fn with_data_format(mut self, data_format: DataFormat) -> Self {
        self.data_format = data_format;
        self
    }

    /// Set the activation function.
    #[must_use]
    pub fn with_activation(mut self, activation: Option<LayerActivation>) -> Self {
        self.activation = activation;
        self
    }

    /// Set the 1-bit weight scale.
    #[must_use]
    pub fn with_binary_scale(mut self, binary_scale: BinaryScale) -> Self {
        self.binary_scale = binary_scale;
        self
    }

    /// Set the activation range policy.
    #[must_use]
    pub fn with_activation_range(mut self, range: ActivationRange) -> Self {
        self.activation_range = range;
        self
    }

    /// Set the unknown-channel policy.
    #[must_use]
    pub fn with_channel_resolution(mut self, policy: ChannelResolution) -> Self {
        self.channel_resolution = policy;
        self
    }

    /// Set the variable name prefix.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Strides as `(height, width)`. Only meaningful after [`validate`](Self::validate).
    #[must_use]
    pub fn stride_hw(&self) -> (usize, usize) {
        match self.strides.as_slice() {
            [h, w] => (*h, *w),
            _ => (1, 1),
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`QuantConvError::Unimplemented`] for `use_gemm` and
    /// [`QuantConvError::InvalidConfig`] for any other invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.use_gemm {
            return Err(QuantConvError::Unimplemented(
                "use_gemm: GEMM inference path; use the convolution path".to_string(),
            ));
        }

        if self.strides.len() != 2 {
            return Err(QuantConvError::InvalidConfig(format!(
                "strides must have exactly 2 entries, got {}",
                self.strides.len()
            )));
        }

        if self.strides.contains(&0) {
            return Err(QuantConvError::invalid_config("strides must be > 0"));
        }

        if self.n_filter == 0 {
            return Err(QuantConvError::invalid_config("n_filter must be > 0"));
        }

        if self.filter_size.0 == 0 || self.filter_size.1 == 0 {
            return Err(QuantConvError::invalid_config("filter_size must be > 0"));
        }

        if self.weight_init_stddev < 0.0 {
            return Err(QuantConvError::invalid_config(
                "weight_init_stddev must be >= 0",
            ));
        }

        if self.name.is_empty() {
            return Err(QuantConvError::invalid_config("name must not be empty"));
        }

        Ok(())
    }
}
