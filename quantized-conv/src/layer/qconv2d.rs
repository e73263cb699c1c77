//! QuantizedConv2d layer - 2D convolution with fake-quantized weights and inputs.

use candle_core::Tensor;
use candle_nn::{Init, Module, VarBuilder};
use tracing::{debug, info, warn};

use super::activation::LayerActivation;
use super::conv::{bias_add, conv2d, output_size};
use crate::config::{ChannelResolution, QuantizedConv2dConfig};
use crate::error::{QuantConvError, Result};
use crate::quantization::{quantize_active_overflow_with, quantize_weight_overflow_with};

/// Quantization-aware 2D convolution.
///
/// Simulates a `bit_w`-bit weight, `bit_a`-bit activation convolution while
/// keeping full-precision parameters. Every forward pass:
///
/// 1. quantizes the incoming activations to `bit_a` bits
/// 2. quantizes the stored weight `[kh, kw, in, n_filter]` to `bit_w` bits
/// 3. convolves with the configured strides and padding
/// 4. adds the bias (never quantized)
/// 5. applies the activation function
///
/// Gradients flow straight through both quantizers to the full-precision
/// weight, so an optimizer over [`params`](Self::params) trains the layer.
///
/// # Example
///
/// ```ignore
/// use candle_core::{DType, Device, Tensor};
/// use candle_nn::{VarBuilder, VarMap};
/// use quantized_conv::{BitWidth, QuantizedConv2d, QuantizedConv2dConfig};
///
/// let device = Device::Cpu;
/// let varmap = VarMap::new();
/// let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
///
/// let config = QuantizedConv2dConfig::new(32, (5, 5)).with_name("qcnn1");
/// let layer = QuantizedConv2d::new(Some(3), &config, vb)?;
///
/// let input = Tensor::rand(0f32, 1f32, (8, 32, 32, 3), &device)?;
/// let output = layer.forward(&input)?; // [8, 32, 32, 32]
/// ```
#[derive(Debug, Clone)]
pub struct QuantizedConv2d {
    /// Full-precision weight `[kh, kw, in_channels, n_filter]`.
    weight: Tensor,

    /// Optional bias `[n_filter]` (not quantized).
    bias: Option<Tensor>,

    /// Configuration.
    config: QuantizedConv2dConfig,

    /// Resolved input channel count.
    in_channels: usize,
}

impl QuantizedConv2d {
    /// Create a layer, fetching or creating its parameters through `vb`.
    ///
    /// Parameters live under `{name}.W_conv2d` and `{name}.b_conv2d`.
    /// `in_channels = None` means the channel count is unknown; the
    /// configured [`ChannelResolution`] decides between assuming 1 channel
    /// and failing.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid (checked before any
    /// parameter is created) or parameter creation fails.
    pub fn new(
        in_channels: Option<usize>,
        config: &QuantizedConv2dConfig,
        vb: VarBuilder,
    ) -> Result<Self> {
        config.validate()?;
        let in_channels = resolve_in_channels(in_channels, config)?;
        log_layer(config);

        let (kh, kw) = config.filter_size;
        let vb = vb.pp(&config.name);

        let weight = vb.get_with_hints(
            (kh, kw, in_channels, config.n_filter),
            "W_conv2d",
            Init::Randn {
                mean: 0.0,
                stdev: config.weight_init_stddev,
            },
        )?;

        let bias = if config.use_bias {
            Some(vb.get_with_hints(config.n_filter, "b_conv2d", Init::Const(config.bias_init))?)
        } else {
            None
        };

        Ok(Self {
            weight,
            bias,
            config: config.clone(),
            in_channels,
        })
    }

    /// Create a layer sized for `input`.
    ///
    /// The channel count is read from the channel axis of `data_format`. A
    /// tensor that is not 4D has no readable channel count and goes through
    /// the configured [`ChannelResolution`].
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn for_input(
        input: &Tensor,
        config: &QuantizedConv2dConfig,
        vb: VarBuilder,
    ) -> Result<Self> {
        let in_channels = if input.rank() == 4 {
            Some(input.dim(config.data_format.channel_axis())?)
        } else {
            None
        };
        Self::new(in_channels, config, vb)
    }

    /// Create a layer from existing full-precision parameters.
    ///
    /// # Arguments
    ///
    /// * `weight` - Weight tensor `[kh, kw, in_channels, n_filter]`
    /// * `bias` - Optional bias tensor `[n_filter]`
    /// * `config` - Layer configuration; `filter_size` and `n_filter` must
    ///   match `weight`
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the shapes disagree.
    pub fn from_weight(
        weight: &Tensor,
        bias: Option<&Tensor>,
        config: &QuantizedConv2dConfig,
    ) -> Result<Self> {
        config.validate()?;

        let (kh, kw, in_channels, n_filter) = weight.dims4()?;
        let expected = [config.filter_size.0, config.filter_size.1, in_channels, config.n_filter];
        if [kh, kw, in_channels, n_filter] != expected {
            return Err(QuantConvError::ShapeMismatch {
                expected: expected.to_vec(),
                actual: weight.dims().to_vec(),
            });
        }

        if let Some(bias) = bias {
            if bias.dims() != [n_filter] {
                return Err(QuantConvError::ShapeMismatch {
                    expected: vec![n_filter],
                    actual: bias.dims().to_vec(),
                });
            }
        }

        log_layer(config);

        Ok(Self {
            weight: weight.clone(),
            bias: bias.cloned(),
            config: config.clone(),
            in_channels,
        })
    }

    /// Get the input channel count.
    #[must_use]
    pub const fn in_channels(&self) -> usize {
        self.in_channels
    }

    /// Get the output channel count (`n_filter`).
    #[must_use]
    pub const fn out_channels(&self) -> usize {
        self.config.n_filter
    }

    /// Get the full-precision weight.
    #[must_use]
    pub const fn weight(&self) -> &Tensor {
        &self.weight
    }

    /// Get the bias.
    #[must_use]
    pub const fn bias(&self) -> Option<&Tensor> {
        self.bias.as_ref()
    }

    /// Get reference to the configuration.
    #[must_use]
    pub const fn config(&self) -> &QuantizedConv2dConfig {
        &self.config
    }

    /// Trainable full-precision parameters: the weight, then the bias.
    #[must_use]
    pub fn params(&self) -> Vec<Tensor> {
        std::iter::once(self.weight.clone())
            .chain(self.bias.iter().cloned())
            .collect()
    }

    /// The weight as the forward pass sees it, quantized to `bit_w` bits.
    ///
    /// # Errors
    ///
    /// Returns error if quantization fails.
    pub fn quantized_weight(&self) -> Result<Tensor> {
        quantize_weight_overflow_with(&self.weight, self.config.bit_w, self.config.binary_scale)
    }

    /// Output `(height, width)` for an input of `(height, width)`.
    #[must_use]
    pub fn output_spatial(&self, height: usize, width: usize) -> (usize, usize) {
        let (kh, kw) = self.config.filter_size;
        let (sh, sw) = self.config.stride_hw();
        (
            output_size(height, kh, sh, self.config.padding),
            output_size(width, kw, sw, self.config.padding),
        )
    }

    /// Quantized forward pass.
    ///
    /// # Arguments
    ///
    /// * `input` - 4D tensor in the configured data format, expected to lie
    ///   in `[0, 1]` unless the activation range policy clips it
    ///
    /// # Errors
    ///
    /// Returns error if the convolution or bias add rejects the shapes.
    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let config = &self.config;

        let input = quantize_active_overflow_with(input, config.bit_a, config.activation_range)?;
        let weight = self.quantized_weight()?;

        let output = conv2d(
            &input,
            &weight,
            config.stride_hw(),
            config.padding,
            config.data_format,
        )?;

        let output = if let Some(ref bias) = self.bias {
            bias_add(&output, bias, config.data_format)?
        } else {
            output
        };

        let output = match config.activation {
            Some(activation) => activation.forward(&output)?,
            None => output,
        };

        debug!(layer = %config.name, shape = ?output.dims(), "quantized conv forward");
        Ok(output)
    }
}

impl Module for QuantizedConv2d {
    fn forward(&self, input: &Tensor) -> candle_core::Result<Tensor> {
        Ok(Self::forward(self, input)?)
    }
}

fn resolve_in_channels(in_channels: Option<usize>, config: &QuantizedConv2dConfig) -> Result<usize> {
    match (in_channels, config.channel_resolution) {
        (Some(0), _) => Err(QuantConvError::invalid_config("in_channels must be > 0")),
        (Some(channels), _) => Ok(channels),
        (None, ChannelResolution::FallbackToSingle) => {
            warn!(layer = %config.name, "unknown input channels, set to 1");
            Ok(1)
        }
        (None, ChannelResolution::Strict) => Err(QuantConvError::InvalidConfig(format!(
            "{}: input channel count is unknown",
            config.name
        ))),
    }
}

fn log_layer(config: &QuantizedConv2dConfig) {
    info!(
        "QuantizedConv2d {}: n_filter: {} filter_size: {:?} strides: {:?} pad: {} act: {} bits: {}/{}",
        config.name,
        config.n_filter,
        config.filter_size,
        config.strides,
        config.padding,
        config.activation.map_or("No Activation", LayerActivation::name),
        config.bit_w,
        config.bit_a,
    );
}
