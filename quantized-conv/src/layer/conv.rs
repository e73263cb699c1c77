//! Convolution and bias primitives over HWIO filters.
//!
//! Filters are stored as `[kh, kw, in_channels, out_channels]`. Candle's
//! kernel wants NCHW input and OIHW filters, so both are permuted at this
//! seam and the result is permuted back to the requested layout.

use candle_core::Tensor;

use crate::config::{DataFormat, Padding};
use crate::error::{QuantConvError, Result};

/// `(before, after)` zero padding for one spatial dimension under SAME.
///
/// The total pad is `max((ceil(in / s) - 1) * s + k - in, 0)`, with the
/// extra element (if odd) going after.
#[must_use]
pub fn same_padding(input: usize, kernel: usize, stride: usize) -> (usize, usize) {
    let out = input.div_ceil(stride);
    let needed = (out.saturating_sub(1) * stride + kernel).saturating_sub(input);
    let before = needed / 2;
    (before, needed - before)
}

/// Output extent of one spatial dimension.
///
/// SAME gives `ceil(in / s)`, VALID gives `ceil((in - k + 1) / s)` (zero
/// when the filter does not fit).
#[must_use]
pub fn output_size(input: usize, kernel: usize, stride: usize, padding: Padding) -> usize {
    match padding {
        Padding::Same => input.div_ceil(stride),
        Padding::Valid => (input + 1).saturating_sub(kernel).div_ceil(stride),
    }
}

/// 2D convolution of `input` with an HWIO `filter`.
///
/// Candle takes padding, stride, dilation and groups as single scalars, so
/// SAME padding is applied beforehand with `pad_with_zeros` and unequal
/// strides run a stride-1 convolution followed by row and column
/// subsampling, which gives the same result.
///
/// # Errors
///
/// Returns error if `input` or `filter` is not 4D, or if the underlying
/// convolution rejects the shapes (channel mismatch, ...). A filter larger
/// than the (padded) input is a [`QuantConvError::ShapeMismatch`].
pub fn conv2d(
    input: &Tensor,
    filter: &Tensor,
    strides: (usize, usize),
    padding: Padding,
    data_format: DataFormat,
) -> Result<Tensor> {
    if input.rank() != 4 || filter.rank() != 4 {
        let actual = if input.rank() == 4 {
            filter.rank()
        } else {
            input.rank()
        };
        return Err(QuantConvError::RankMismatch {
            expected: 4,
            actual,
        });
    }

    let nchw = match data_format {
        DataFormat::Nhwc => input.permute((0, 3, 1, 2))?.contiguous()?,
        DataFormat::Nchw => input.contiguous()?,
    };
    let kernel = filter.permute((3, 2, 0, 1))?.contiguous()?;

    let (_, _, kh, kw) = kernel.dims4()?;
    let (_, _, h, w) = nchw.dims4()?;
    let (sh, sw) = strides;

    let padded = match padding {
        Padding::Same => {
            let (top, bottom) = same_padding(h, kh, sh);
            let (left, right) = same_padding(w, kw, sw);
            nchw.pad_with_zeros(2, top, bottom)?
                .pad_with_zeros(3, left, right)?
        }
        Padding::Valid => nchw,
    };

    let (_, _, padded_h, padded_w) = padded.dims4()?;
    if padded_h < kh || padded_w < kw {
        return Err(QuantConvError::ShapeMismatch {
            expected: vec![kh, kw],
            actual: vec![padded_h, padded_w],
        });
    }

    let output = if sh == sw {
        padded.conv2d(&kernel, 0, sh, 1, 1)?
    } else {
        let dense = padded.conv2d(&kernel, 0, 1, 1, 1)?;
        subsample(&subsample(&dense, 2, sh)?, 3, sw)?
    };

    match data_format {
        DataFormat::Nhwc => Ok(output.permute((0, 2, 3, 1))?.contiguous()?),
        DataFormat::Nchw => Ok(output),
    }
}

/// Add a per-channel `bias` to a 4D tensor in `data_format` layout.
///
/// # Errors
///
/// Returns error if the bias length does not match the channel count.
pub fn bias_add(input: &Tensor, bias: &Tensor, data_format: DataFormat) -> Result<Tensor> {
    let channels = input.dim(data_format.channel_axis())?;
    if bias.dims() != [channels] {
        return Err(QuantConvError::ShapeMismatch {
            expected: vec![channels],
            actual: bias.dims().to_vec(),
        });
    }

    let output = match data_format {
        DataFormat::Nhwc => input.broadcast_add(bias)?,
        DataFormat::Nchw => input.broadcast_add(&bias.reshape((1, channels, 1, 1))?)?,
    };
    Ok(output)
}

/// Keep every `step`-th index along `dim`, starting at 0.
fn subsample(input: &Tensor, dim: usize, step: usize) -> Result<Tensor> {
    if step == 1 {
        return Ok(input.clone());
    }
    let len = input.dim(dim)?;
    let indices: Vec<u32> = (0..len).step_by(step).map(|i| i as u32).collect();
    let indices = Tensor::from_vec(indices, len.div_ceil(step), input.device())?;
    Ok(input.index_select(&indices, dim)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn test_same_padding() {
        // 4 wide, 2 kernel, stride 1 -> pad 1 total, after
        assert_eq!(same_padding(4, 2, 1), (0, 1));
        assert_eq!(same_padding(5, 3, 1), (1, 1));
        assert_eq!(same_padding(5, 3, 2), (1, 1));
        assert_eq!(same_padding(6, 3, 2), (0, 1));
        assert_eq!(same_padding(5, 1, 2), (0, 0));
    }

    #[test]
    fn test_output_size() {
        assert_eq!(output_size(4, 2, 1, Padding::Valid), 3);
        assert_eq!(output_size(4, 2, 1, Padding::Same), 4);
        assert_eq!(output_size(7, 3, 2, Padding::Valid), 3);
        assert_eq!(output_size(7, 3, 2, Padding::Same), 4);
        assert_eq!(output_size(2, 3, 1, Padding::Valid), 0);
    }

    #[test]
    fn test_conv2d_identity_filter() {
        let device = Device::Cpu;
        let input = Tensor::arange(0f32, 16f32, &device)
            .unwrap()
            .reshape((1, 4, 4, 1))
            .unwrap();
        let filter = Tensor::ones((1, 1, 1, 1), DType::F32, &device).unwrap();

        let output = conv2d(&input, &filter, (1, 1), Padding::Valid, DataFormat::Nhwc).unwrap();

        assert_eq!(output.dims(), &[1, 4, 4, 1]);
        let a: Vec<f32> = input.flatten_all().unwrap().to_vec1().unwrap();
        let b: Vec<f32> = output.flatten_all().unwrap().to_vec1().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_conv2d_same_shapes() {
        let device = Device::Cpu;
        let input = Tensor::randn(0f32, 1f32, (2, 7, 5, 3), &device).unwrap();
        let filter = Tensor::randn(0f32, 1f32, (3, 2, 3, 4), &device).unwrap();

        let output = conv2d(&input, &filter, (2, 2), Padding::Same, DataFormat::Nhwc).unwrap();
        assert_eq!(output.dims(), &[2, 4, 3, 4]);

        let output = conv2d(&input, &filter, (2, 1), Padding::Same, DataFormat::Nhwc).unwrap();
        assert_eq!(output.dims(), &[2, 4, 5, 4]);

        let output = conv2d(&input, &filter, (1, 2), Padding::Valid, DataFormat::Nhwc).unwrap();
        assert_eq!(output.dims(), &[2, 5, 2, 4]);
    }

    #[test]
    fn test_unequal_strides_match_subsampled_dense() {
        let device = Device::Cpu;
        let input = Tensor::randn(0f32, 1f32, (1, 6, 6, 2), &device).unwrap();
        let filter = Tensor::randn(0f32, 1f32, (2, 2, 2, 3), &device).unwrap();

        let dense = conv2d(&input, &filter, (1, 1), Padding::Valid, DataFormat::Nhwc).unwrap();
        let strided = conv2d(&input, &filter, (2, 3), Padding::Valid, DataFormat::Nhwc).unwrap();
        assert_eq!(strided.dims(), &[1, 3, 2, 3]);

        // strided[0, i, j, c] == dense[0, 2i, 3j, c]
        let d = dense.squeeze(0).unwrap().to_vec3::<f32>().unwrap();
        let s = strided.squeeze(0).unwrap().to_vec3::<f32>().unwrap();
        for i in 0..3 {
            for j in 0..2 {
                for c in 0..3 {
                    assert!((s[i][j][c] - d[2 * i][3 * j][c]).abs() < 1e-5);
                }
            }
        }
    }

    #[test]
    fn test_nchw_matches_nhwc() {
        let device = Device::Cpu;
        let input = Tensor::randn(0f32, 1f32, (1, 5, 5, 2), &device).unwrap();
        let filter = Tensor::randn(0f32, 1f32, (3, 3, 2, 4), &device).unwrap();

        let nhwc = conv2d(&input, &filter, (1, 1), Padding::Same, DataFormat::Nhwc).unwrap();
        let nchw_input = input.permute((0, 3, 1, 2)).unwrap();
        let nchw = conv2d(&nchw_input, &filter, (1, 1), Padding::Same, DataFormat::Nchw).unwrap();

        let a: Vec<f32> = nhwc.flatten_all().unwrap().to_vec1().unwrap();
        let b: Vec<f32> = nchw
            .permute((0, 2, 3, 1))
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1()
            .unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-5);
        }
    }

    #[test]
    fn test_bias_add() {
        let device = Device::Cpu;
        let bias = Tensor::new(&[1.0f32, -1.0], &device).unwrap();

        let nhwc = Tensor::zeros((1, 2, 2, 2), DType::F32, &device).unwrap();
        let out = bias_add(&nhwc, &bias, DataFormat::Nhwc).unwrap();
        let values: Vec<f32> = out.flatten_all().unwrap().to_vec1().unwrap();
        assert_eq!(values, vec![1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0]);

        let nchw = Tensor::zeros((1, 2, 2, 2), DType::F32, &device).unwrap();
        let out = bias_add(&nchw, &bias, DataFormat::Nchw).unwrap();
        let values: Vec<f32> = out.flatten_all().unwrap().to_vec1().unwrap();
        assert_eq!(values, vec![1.0, 1.0, 1.0, 1.0, -1.0, -1.0, -1.0, -1.0]);

        let wrong = Tensor::new(&[1.0f32, 2.0, 3.0], &device).unwrap();
        assert!(bias_add(&nhwc, &wrong, DataFormat::Nhwc).is_err());
    }

    #[test]
    fn test_conv2d_same_pads_bottom_right() {
        let device = Device::Cpu;
        let input = Tensor::arange(0f32, 16f32, &device)
            .unwrap()
            .reshape((1, 4, 4, 1))
            .unwrap();
        let filter = Tensor::ones((2, 2, 1, 1), DType::F32, &device).unwrap();

        let output = conv2d(&input, &filter, (1, 1), Padding::Same, DataFormat::Nhwc).unwrap();
        assert_eq!(output.dims(), &[1, 4, 4, 1]);

        // Last row and column only see zero padding below and to the right.
        let values: Vec<f32> = output.flatten_all().unwrap().to_vec1().unwrap();
        let expected = vec![
            10.0, 14.0, 18.0, 10.0, //
            26.0, 30.0, 34.0, 18.0, //
            42.0, 46.0, 50.0, 26.0, //
            25.0, 27.0, 29.0, 15.0,
        ];
        assert_eq!(values, expected);
    }

    #[test]
    fn test_conv2d_same_stride_two_odd_pad() {
        let device = Device::Cpu;
        let input = Tensor::arange(0f32, 25f32, &device)
            .unwrap()
            .reshape((1, 5, 5, 1))
            .unwrap();
        let filter = Tensor::ones((2, 2, 1, 1), DType::F32, &device).unwrap();

        // 5 wide, 2 kernel, stride 2 -> total pad 1, all after
        let output = conv2d(&input, &filter, (2, 2), Padding::Same, DataFormat::Nhwc).unwrap();
        assert_eq!(output.dims(), &[1, 3, 3, 1]);

        let values: Vec<f32> = output.flatten_all().unwrap().to_vec1().unwrap();
        let expected = vec![
            12.0, 20.0, 13.0, //
            52.0, 60.0, 33.0, //
            41.0, 45.0, 24.0,
        ];
        assert_eq!(values, expected);
    }

    #[test]
    fn test_valid_filter_larger_than_input() {
        let device = Device::Cpu;
        let input = Tensor::zeros((1, 2, 2, 1), DType::F32, &device).unwrap();
        let filter = Tensor::ones((3, 3, 1, 2), DType::F32, &device).unwrap();

        let err = conv2d(&input, &filter, (1, 1), Padding::Valid, DataFormat::Nhwc).unwrap_err();
        assert!(matches!(err, QuantConvError::ShapeMismatch { .. }));

        // one dimension too small is enough
        let tall = Tensor::zeros((1, 5, 2, 1), DType::F32, &device).unwrap();
        assert!(conv2d(&tall, &filter, (1, 1), Padding::Valid, DataFormat::Nhwc).is_err());

        // SAME pads up to the filter, so the same shapes are accepted
        let output = conv2d(&input, &filter, (1, 1), Padding::Same, DataFormat::Nhwc).unwrap();
        assert_eq!(output.dims(), &[1, 2, 2, 2]);
    }

    #[test]
    fn test_rejects_non_4d() {
        let device = Device::Cpu;
        let input = Tensor::zeros((4, 4), DType::F32, &device).unwrap();
        let filter = Tensor::zeros((2, 2, 1, 1), DType::F32, &device).unwrap();
        assert!(conv2d(&input, &filter, (1, 1), Padding::Valid, DataFormat::Nhwc).is_err());
    }
}
