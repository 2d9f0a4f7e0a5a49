//! Program and payload fixtures
//!
//! Builders for the operator records used across the integration tests and
//! a small MobileNet-shaped network whose weights live either in memory or
//! in a model directory on disk.

use std::fs;
use std::path::Path;

use anyhow::Context;
use paddleforge::loader::encode_to_vec;
use paddleforge::program::AttrValue;
use paddleforge::{
    BlockDescriptor, DenseTensor, MemoryPayloadSource, OperatorDescriptor, ProgramDescriptor,
    VariableDescriptor,
};

// ============================================================================
// Tensors and payload files
// ============================================================================

/// Tensor holding `0, 1, 2, ...` in row-major order
pub fn ramp(dims: &[usize]) -> DenseTensor<f32> {
    let n: usize = dims.iter().product();
    DenseTensor::from_vec(dims, (0..n).map(|v| v as f32).collect()).expect("ramp dims")
}

pub fn filled(dims: &[usize], value: f32) -> DenseTensor<f32> {
    let n: usize = dims.iter().product();
    DenseTensor::from_vec(dims, vec![value; n]).expect("filled dims")
}

/// Write `tensor` as `<dir>/<name>` in payload format.
pub fn write_payload(dir: &Path, name: &str, tensor: &DenseTensor<f32>) -> anyhow::Result<()> {
    let path = dir.join(name);
    fs::write(&path, encode_to_vec(tensor))
        .with_context(|| format!("Failed to write payload {}", path.display()))
}

/// Write the program as JSON plus every payload held by `weights`.
pub fn write_model_dir(
    dir: &Path,
    descriptor_file: &str,
    program: &ProgramDescriptor,
    weights: &[(String, DenseTensor<f32>)],
) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(program).context("Failed to serialize program")?;
    fs::write(dir.join(descriptor_file), json).context("Failed to write descriptor")?;
    for (name, tensor) in weights {
        write_payload(dir, name, tensor)?;
    }
    Ok(())
}

pub fn memory_source(weights: &[(String, DenseTensor<f32>)]) -> MemoryPayloadSource {
    let mut source = MemoryPayloadSource::new();
    for (name, tensor) in weights {
        source.insert_tensor(name.as_str(), tensor);
    }
    source
}

// ============================================================================
// Operator builders
// ============================================================================

pub fn var(name: &str, shape: &[usize]) -> VariableDescriptor {
    VariableDescriptor::new(name, shape.to_vec())
}

pub fn weight_var(name: &str, shape: &[usize]) -> VariableDescriptor {
    VariableDescriptor::new(name, shape.to_vec()).persistable(true)
}

pub fn feed(out: &str) -> OperatorDescriptor {
    OperatorDescriptor::new("feed").with_output("Out", out)
}

pub fn fetch(x: &str) -> OperatorDescriptor {
    OperatorDescriptor::new("fetch").with_input("X", x)
}

pub fn conv2d(
    input: &str,
    filter: &str,
    output: &str,
    paddings: [i64; 2],
    strides: [i64; 2],
    groups: i64,
) -> OperatorDescriptor {
    OperatorDescriptor::new("conv2d")
        .with_input("Input", input)
        .with_input("Filter", filter)
        .with_output("Output", output)
        .with_attr("paddings", AttrValue::Ints(paddings.to_vec()))
        .with_attr("strides", AttrValue::Ints(strides.to_vec()))
        .with_attr("groups", AttrValue::Int(groups))
}

pub fn batch_norm(x: &str, prefix: &str, y: &str) -> OperatorDescriptor {
    OperatorDescriptor::new("batch_norm")
        .with_input("X", x)
        .with_input("Scale", &format!("{}_scale", prefix))
        .with_input("Bias", &format!("{}_offset", prefix))
        .with_input("Mean", &format!("{}_mean", prefix))
        .with_input("Variance", &format!("{}_variance", prefix))
        .with_output("Y", y)
        .with_attr("epsilon", AttrValue::Float(1e-5))
}

pub fn unary(op_type: &str, x: &str, out: &str) -> OperatorDescriptor {
    OperatorDescriptor::new(op_type)
        .with_input("X", x)
        .with_output("Out", out)
}

pub fn add(x: &str, y: &str, out: &str) -> OperatorDescriptor {
    OperatorDescriptor::new("elementwise_add")
        .with_input("X", x)
        .with_input("Y", y)
        .with_output("Out", out)
        .with_attr("axis", AttrValue::Int(-1))
}

pub fn global_avg_pool(x: &str, out: &str) -> OperatorDescriptor {
    unary("pool2d", x, out)
        .with_attr("pooling_type", AttrValue::String("avg".to_string()))
        .with_attr("ksize", AttrValue::Ints(vec![1, 1]))
        .with_attr("strides", AttrValue::Ints(vec![1, 1]))
        .with_attr("global_pooling", AttrValue::Bool(true))
}

pub fn reshape2(x: &str, out: &str, shape: &[i64]) -> OperatorDescriptor {
    unary("reshape2", x, out)
        .with_output("XShape", &format!("{}.xshape", x))
        .with_attr("shape", AttrValue::Ints(shape.to_vec()))
}

// ============================================================================
// Networks
// ============================================================================

/// A compact MobileNet-style block:
///
/// image[1,3,16,16] -> conv3x3/s2 -> bn -> relu -> depthwise3x3 -> relu
///   -> conv1x1 -> (+ bias) -> global avg pool -> reshape2 -> softmax -> fetch
///
/// Returns the block and every payload it needs.
pub fn mobilenet_block() -> (BlockDescriptor, Vec<(String, DenseTensor<f32>)>) {
    let mut weights = vec![
        ("conv1_weights".to_string(), ramp(&[8, 3, 3, 3])),
        ("dw_weights".to_string(), ramp(&[8, 1, 3, 3])),
        ("pw_weights".to_string(), ramp(&[16, 8, 1, 1])),
        ("pw_bias".to_string(), filled(&[16], 0.5)),
    ];
    for (stat, value) in [("scale", 1.0), ("offset", 0.0), ("mean", 0.0), ("variance", 1.0)] {
        weights.push((format!("bn1_{}", stat), filled(&[8], value)));
    }

    let mut block = BlockDescriptor::new()
        .with_var(var("image", &[1, 3, 16, 16]))
        .with_var(weight_var("conv1_weights", &[8, 3, 3, 3]))
        .with_var(var("conv1.out", &[1, 8, 8, 8]))
        .with_var(var("bn1.out", &[1, 8, 8, 8]))
        .with_var(var("relu1.out", &[1, 8, 8, 8]))
        .with_var(weight_var("dw_weights", &[8, 1, 3, 3]))
        .with_var(var("dw.out", &[1, 8, 8, 8]))
        .with_var(var("relu2.out", &[1, 8, 8, 8]))
        .with_var(weight_var("pw_weights", &[16, 8, 1, 1]))
        .with_var(var("pw.out", &[1, 16, 8, 8]))
        .with_var(weight_var("pw_bias", &[16]))
        .with_var(var("pw.biased", &[1, 16, 8, 8]))
        .with_var(var("pool.out", &[1, 16, 1, 1]))
        .with_var(var("flat", &[1, 16]))
        .with_var(var("prob", &[1, 16]));
    for stat in ["scale", "offset", "mean", "variance"] {
        block = block.with_var(weight_var(&format!("bn1_{}", stat), &[8]));
    }

    let block = block
        .with_op(feed("image"))
        .with_op(conv2d("image", "conv1_weights", "conv1.out", [1, 1], [2, 2], 1))
        .with_op(batch_norm("conv1.out", "bn1", "bn1.out"))
        .with_op(unary("relu", "bn1.out", "relu1.out"))
        .with_op(conv2d("relu1.out", "dw_weights", "dw.out", [1, 1], [1, 1], 8))
        .with_op(unary("relu", "dw.out", "relu2.out"))
        .with_op(conv2d("relu2.out", "pw_weights", "pw.out", [0, 0], [1, 1], 1))
        .with_op(add("pw.out", "pw_bias", "pw.biased"))
        .with_op(global_avg_pool("pw.biased", "pool.out"))
        .with_op(reshape2("pool.out", "flat", &[0, -1]))
        .with_op(unary("softmax", "flat", "prob"))
        .with_op(fetch("prob"));

    (block, weights)
}

pub fn program_of(block: BlockDescriptor) -> ProgramDescriptor {
    ProgramDescriptor {
        blocks: vec![block],
    }
}
