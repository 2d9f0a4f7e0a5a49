//! Payload decoding and conversion benchmarks
//!
//! Measures header parsing plus element decoding for weight-sized payloads,
//! the depthwise weight transpose, and end-to-end conversion of a small
//! convolution stack held in memory.
//!
//! Run with: `cargo bench --bench payload_bench`

use std::hint::black_box;
use std::time::{Duration, Instant};

use paddleforge::loader::{decode_payload, encode_payload, encode_to_vec, PayloadHeader};
use paddleforge::program::AttrValue;
use paddleforge::{
    convert, BlockDescriptor, DenseTensor, MemoryPayloadSource, OperatorDescriptor,
    VariableDescriptor,
};

// ============================================================================
// Timing
// ============================================================================

/// Amount of work one iteration does, used to report throughput
#[derive(Clone, Copy)]
enum Work {
    Bytes(usize),
    Operators(usize),
}

/// Sorted per-iteration timings for one case
struct Samples {
    label: String,
    work: Work,
    sorted: Vec<Duration>,
}

/// Time `iterations` calls of `f` after a short warmup.
fn measure<R>(label: &str, iterations: usize, work: Work, mut f: impl FnMut() -> R) -> Samples {
    for _ in 0..iterations / 10 + 1 {
        black_box(f());
    }

    let mut sorted: Vec<Duration> = (0..iterations.max(1))
        .map(|_| {
            let start = Instant::now();
            black_box(f());
            start.elapsed()
        })
        .collect();
    sorted.sort();

    Samples {
        label: label.to_string(),
        work,
        sorted,
    }
}

impl Samples {
    fn median(&self) -> Duration {
        self.sorted[self.sorted.len() / 2]
    }

    fn throughput(&self) -> String {
        let secs = self.median().as_secs_f64();
        if secs == 0.0 {
            return "-".to_string();
        }
        match self.work {
            Work::Bytes(n) => format!("{:.1} MiB/s", n as f64 / secs / (1024.0 * 1024.0)),
            Work::Operators(n) => format!("{:.0} ops/s", n as f64 / secs),
        }
    }

    /// One row: label, median, fastest, slowest, throughput at the median
    fn print(&self) {
        let fastest = self.sorted[0];
        let slowest = self.sorted[self.sorted.len() - 1];
        println!(
            "{:<40} {:>12} {:>12} {:>12} {:>16}",
            self.label,
            format!("{:?}", self.median()),
            format!("{:?}", fastest),
            format!("{:?}", slowest),
            self.throughput()
        );
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn weight_tensor(dims: &[usize]) -> DenseTensor<f32> {
    let n: usize = dims.iter().product();
    let data = (0..n).map(|i| ((i as f32) * 0.001).sin()).collect();
    DenseTensor::from_vec(dims, data).expect("dims match data")
}

/// feed -> N x (conv2d -> batch_norm -> relu) -> pool2d -> fetch
fn conv_stack(layers: usize, channels: usize) -> (BlockDescriptor, MemoryPayloadSource) {
    let spatial = 32;
    let mut source = MemoryPayloadSource::new();
    let mut block = BlockDescriptor::new()
        .with_var(VariableDescriptor::new("image", vec![1, channels, spatial, spatial]))
        .with_op(OperatorDescriptor::new("feed").with_output("Out", "image"));

    let mut current = "image".to_string();
    for i in 0..layers {
        let w = format!("conv{}_weights", i);
        let conv_out = format!("conv{}.out", i);
        let bn_out = format!("bn{}.out", i);
        let relu_out = format!("relu{}.out", i);
        let act = vec![1, channels, spatial, spatial];

        source.insert_tensor(&w, &weight_tensor(&[channels, channels, 3, 3]));
        block = block
            .with_var(VariableDescriptor::new(&w, vec![channels, channels, 3, 3]).persistable(true))
            .with_var(VariableDescriptor::new(&conv_out, act.clone()))
            .with_var(VariableDescriptor::new(&bn_out, act.clone()))
            .with_var(VariableDescriptor::new(&relu_out, act));

        let mut bn = OperatorDescriptor::new("batch_norm")
            .with_input("X", &conv_out)
            .with_output("Y", &bn_out)
            .with_attr("epsilon", AttrValue::Float(1e-5));
        for role in ["Scale", "Bias", "Mean", "Variance"] {
            let name = format!("bn{}_{}", i, role.to_lowercase());
            source.insert_tensor(&name, &weight_tensor(&[channels]));
            block = block.with_var(VariableDescriptor::new(&name, vec![channels]).persistable(true));
            bn = bn.with_input(role, &name);
        }

        block = block
            .with_op(
                OperatorDescriptor::new("conv2d")
                    .with_input("Input", &current)
                    .with_input("Filter", &w)
                    .with_output("Output", &conv_out)
                    .with_attr("paddings", AttrValue::Ints(vec![1, 1]))
                    .with_attr("strides", AttrValue::Ints(vec![1, 1]))
                    .with_attr("groups", AttrValue::Int(1)),
            )
            .with_op(bn)
            .with_op(
                OperatorDescriptor::new("relu")
                    .with_input("X", &bn_out)
                    .with_output("Out", &relu_out),
            );
        current = relu_out;
    }

    block = block
        .with_var(VariableDescriptor::new("pooled", vec![1, channels, 1, 1]))
        .with_op(
            OperatorDescriptor::new("pool2d")
                .with_input("X", &current)
                .with_output("Out", "pooled")
                .with_attr("pooling_type", AttrValue::String("avg".to_string()))
                .with_attr("ksize", AttrValue::Ints(vec![spatial as i64, spatial as i64]))
                .with_attr("strides", AttrValue::Ints(vec![1, 1])),
        )
        .with_op(OperatorDescriptor::new("fetch").with_input("X", "pooled"));

    (block, source)
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_decode() {
    for dims in [[64, 64, 3, 3], [256, 256, 3, 3], [512, 512, 3, 3]] {
        let bytes = encode_to_vec(&weight_tensor(&dims));
        let label = format!("decode f32 {:?}", dims);
        measure(&label, 50, Work::Bytes(bytes.len()), || {
            decode_payload::<f32>(&bytes, &dims)
        })
        .print();
    }
}

fn bench_decode_with_lod() {
    let dims = [256, 256, 3, 3];
    let header = PayloadHeader {
        version: 0,
        lod_lengths: vec![1024; 8],
        tensor_version: 0,
        desc_len: 512,
    };
    let mut bytes = Vec::new();
    encode_payload(&mut bytes, &weight_tensor(&dims), &header).expect("write to Vec");

    measure("decode f32 with 8 LOD levels", 50, Work::Bytes(bytes.len()), || {
        decode_payload::<f32>(&bytes, &dims)
    })
    .print();
}

fn bench_transpose() {
    let weights = weight_tensor(&[512, 1, 3, 3]);
    let bytes = weights.len() * std::mem::size_of::<f32>();
    measure("swap_leading_axes [512, 1, 3, 3]", 200, Work::Bytes(bytes), || {
        weights.swap_leading_axes()
    })
    .print();
}

fn bench_convert() {
    for layers in [4, 16] {
        let (block, source) = conv_stack(layers, 32);
        let label = format!("convert {} conv blocks", layers);
        measure(&label, 20, Work::Operators(block.ops.len()), || {
            convert(&block, Some(&source))
        })
        .print();
    }
}

fn main() {
    println!(
        "{:<40} {:>12} {:>12} {:>12} {:>16}",
        "case", "median", "fastest", "slowest", "throughput"
    );
    bench_decode();
    bench_decode_with_lod();
    bench_transpose();
    bench_convert();
}
