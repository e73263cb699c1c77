//! Weight and activation quantization example.
//!
//! Run with: `cargo run --example quantization`

use candle_core::{Device, Tensor, Var};
use quantized_conv::{
    quantize_active_overflow, quantize_weight_overflow, quantize_weight_overflow_with,
    BinaryScale, BitWidth,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== quantized-conv Quantization Example ===\n");

    let device = Device::Cpu;

    // Weight quantization
    println!("1. Weight Quantization (dynamic range)");
    println!("   Method: W_q = (round((W / 2s + 0.5) * n) / n - 0.5) * 2s, s = max(|W|)\n");

    let weights = Tensor::randn(0.0f32, 0.5, (3, 3, 16, 32), &device)?;
    let weight_vec: Vec<f32> = weights.flatten_all()?.to_vec1()?;
    let orig_max = weight_vec.iter().map(|x| x.abs()).fold(0.0f32, f32::max);
    println!("   Original max(|W|): {:.4}", orig_max);

    for bits in [1u8, 2, 4, 8] {
        let width = BitWidth::new(bits)?;
        let quantized = quantize_weight_overflow(&weights, width)?;

        let diff = weights.sub(&quantized)?;
        let diff_vec: Vec<f32> = diff.flatten_all()?.to_vec1()?;
        let mse: f32 = diff_vec.iter().map(|x| x * x).sum::<f32>() / diff_vec.len() as f32;
        println!("   {width}: reconstruction MSE = {:.6}", mse);
    }

    let binary_mean = quantize_weight_overflow_with(&weights, BitWidth::new(1)?, BinaryScale::MeanAbs)?;
    let first: Vec<f32> = binary_mean.flatten_all()?.to_vec1()?;
    println!("   1-bit with mean(|W|) scale: c = {:.4}", first[0].abs());

    // Activation quantization
    println!("\n2. Activation Quantization (fixed [0, 1] range)");
    let activations = Tensor::rand(0f32, 1f32, (1, 8, 8, 4), &device)?;
    for bits in [1u8, 2, 4] {
        let quantized = quantize_active_overflow(&activations, BitWidth::new(bits)?)?;
        let values: Vec<f32> = quantized.flatten_all()?.to_vec1()?;
        let mut levels: Vec<u32> = values.iter().map(|v| v.to_bits()).collect();
        levels.sort_unstable();
        levels.dedup();
        println!("   {bits}-bit: {} distinct levels", levels.len());
    }

    // Straight-through gradient
    println!("\n3. Straight-Through Estimator");
    let x = Var::new(&[0.1f32, 0.45, 0.8], &device)?;
    let q = quantize_active_overflow(x.as_tensor(), BitWidth::new(2)?)?;
    let grads = q.sum_all()?.backward()?;
    if let Some(grad) = grads.get(x.as_tensor()) {
        println!("   Forward:  {:?}", q.to_vec1::<f32>()?);
        println!("   Gradient: {:?}", grad.to_vec1::<f32>()?);
    }

    println!("\nDone!");
    Ok(())
}
