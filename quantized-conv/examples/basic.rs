//! Basic usage of quantized-conv.
//!
//! Run with: `cargo run --example basic`

use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use quantized_conv::{BitWidth, LayerActivation, QuantizedConv2d, QuantizedConv2dConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("=== quantized-conv Basic Example ===\n");

    let device = Device::Cpu;
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);

    // Create configuration
    println!("1. Configuration");
    let bits = BitWidth::new(4)?;
    let config = QuantizedConv2dConfig::new(16, (3, 3))
        .with_bits(bits, bits)
        .with_activation(Some(LayerActivation::HardTanh))
        .with_name("qcnn1");
    println!("   Filters: {}", config.n_filter);
    println!("   Weight bits: {}", config.bit_w);
    println!("   Activation bits: {}", config.bit_a);
    println!("   Padding: {}", config.padding);

    // Create the layer
    println!("\n2. Creating QuantizedConv2d layer");
    let layer = QuantizedConv2d::new(Some(3), &config, vb.clone())?;
    println!("   Weight shape: {:?}", layer.weight().shape());
    println!("   Trainable parameters: {}", layer.params().len());

    // Forward pass
    println!("\n3. Forward pass");
    let input = Tensor::rand(0f32, 1f32, (4, 28, 28, 3), &device)?;
    println!("   Input shape: {:?}", input.shape());

    let output = layer.forward(&input)?;
    println!("   Output shape: {:?}", output.shape());

    let output_vec: Vec<f32> = output.flatten_all()?.to_vec1()?;
    let mean: f32 = output_vec.iter().sum::<f32>() / output_vec.len() as f32;
    let max = output_vec.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let min = output_vec.iter().cloned().fold(f32::INFINITY, f32::min);
    println!(
        "   Output stats: mean={:.4}, min={:.4}, max={:.4}",
        mean, min, max
    );

    // Stacking: hard-tanh keeps outputs in [-1, 1]; the next layer sees them
    // through its own activation quantizer.
    println!("\n4. Second layer (unknown channels fall back to 1)");
    let second = QuantizedConv2d::new(None, &config.clone().with_name("qcnn2"), vb)?;
    println!("   Assumed input channels: {}", second.in_channels());

    println!("\nDone!");
    Ok(())
}
