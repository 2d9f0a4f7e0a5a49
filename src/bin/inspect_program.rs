use paddleforge::{convert_model_dir, logging, ConverterConfig, Layer};
use std::env;

fn main() -> anyhow::Result<()> {
    logging::init_logging_default();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <model-dir>", args[0]);
        std::process::exit(1);
    }

    let dir = &args[1];
    let config = ConverterConfig::from_env();
    println!("Inspecting model directory: {}", dir);
    println!("Descriptor: {} (block {})", config.descriptor_file, config.block_index);

    let graph = convert_model_dir(dir, &config)?;

    println!("\n=== Layers ({}) ===", graph.len());
    for (kind, count) in graph.kind_counts() {
        println!("{:<20} {}", kind.to_string(), count);
    }

    println!("\n=== Inputs ===");
    for &id in graph.inputs() {
        if let Some(node) = graph.node(id) {
            println!("{} {:?}", node.label(), node.outputs()[0].shape());
        }
    }

    println!("\n=== Outputs ===");
    for &id in graph.outputs() {
        if let Some(node) = graph.node(id) {
            println!("{} {:?}", node.label(), node.inputs()[0].shape());
        }
    }

    println!("\n=== Convolutions ===");
    for node in graph.nodes() {
        match node.layer() {
            Layer::Conv2d(p) | Layer::DepthwiseConv2d(p) => {
                let kernel = p
                    .kernel_size()
                    .map(|(kh, kw)| format!("{}x{}", kh, kw))
                    .unwrap_or_else(|| "?".to_string());
                println!(
                    "{} {} {} weights {:?} stride ({}, {}) {:?}",
                    node.kind(),
                    node.label(),
                    kernel,
                    p.weights.dims(),
                    p.stride_h,
                    p.stride_w,
                    p.padding
                );
            }
            _ => {}
        }
    }

    Ok(())
}
