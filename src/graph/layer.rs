//! Layer kinds and their parameters

use std::fmt;

use crate::tensor::DenseTensor;

/// Spatial padding mode for windowed layers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    Valid,
    Same,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conv2dParams {
    /// `[O, I, kh, kw]` for Conv2d, `[I, O, kh, kw]` for DepthwiseConv2d
    pub weights: DenseTensor<f32>,
    pub bias: Option<DenseTensor<f32>>,
    pub padding: Padding,
    pub stride_h: usize,
    pub stride_w: usize,
}

impl Conv2dParams {
    /// `(kh, kw)`, or `None` when the weights are not rank 4
    pub fn kernel_size(&self) -> Option<(usize, usize)> {
        match self.weights.dims() {
            &[_, _, kh, kw] => Some((kh, kw)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchNormParams {
    pub scale: DenseTensor<f32>,
    pub offset: DenseTensor<f32>,
    pub mean: DenseTensor<f32>,
    pub variance: DenseTensor<f32>,
    pub epsilon: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pool2dParams {
    pub padding: Padding,
    pub filter_h: usize,
    pub filter_w: usize,
    pub stride_h: usize,
    pub stride_w: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceToBatchParams {
    pub block_shape: [usize; 2],
    /// `[[top, bottom], [left, right]]`
    pub paddings: [[usize; 2]; 2],
}

impl SpaceToBatchParams {
    /// Output shape for an NCHW input
    pub fn output_shape(&self, input: &[usize]) -> Vec<usize> {
        let [bh, bw] = self.block_shape;
        let [[top, bottom], [left, right]] = self.paddings;
        match input {
            &[n, c, h, w] => vec![
                n.saturating_mul(bh).saturating_mul(bw),
                c,
                h.saturating_add(top + bottom) / bh.max(1),
                w.saturating_add(left + right) / bw.max(1),
            ],
            other => other.to_vec(),
        }
    }
}

/// A graph node's operation
#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    Input,
    Output,
    Constant(DenseTensor<f32>),
    Conv2d(Conv2dParams),
    DepthwiseConv2d(Conv2dParams),
    Add,
    BatchNormalization(BatchNormParams),
    Relu,
    AveragePool2d(Pool2dParams),
    /// Target shape as written in the program (`0` copies, `-1` infers)
    Reshape(Vec<i64>),
    Softmax,
    SpaceToBatch(SpaceToBatchParams),
}

/// Fieldless tag of a [`Layer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LayerKind {
    Input,
    Output,
    Constant,
    Conv2d,
    DepthwiseConv2d,
    Add,
    BatchNormalization,
    Relu,
    AveragePool2d,
    Reshape,
    Softmax,
    SpaceToBatch,
}

impl Layer {
    pub fn kind(&self) -> LayerKind {
        match self {
            Layer::Input => LayerKind::Input,
            Layer::Output => LayerKind::Output,
            Layer::Constant(_) => LayerKind::Constant,
            Layer::Conv2d(_) => LayerKind::Conv2d,
            Layer::DepthwiseConv2d(_) => LayerKind::DepthwiseConv2d,
            Layer::Add => LayerKind::Add,
            Layer::BatchNormalization(_) => LayerKind::BatchNormalization,
            Layer::Relu => LayerKind::Relu,
            Layer::AveragePool2d(_) => LayerKind::AveragePool2d,
            Layer::Reshape(_) => LayerKind::Reshape,
            Layer::Softmax => LayerKind::Softmax,
            Layer::SpaceToBatch(_) => LayerKind::SpaceToBatch,
        }
    }
}

impl LayerKind {
    /// Number of (input, output) ports a layer of this kind owns
    pub fn arity(self) -> (usize, usize) {
        match self {
            LayerKind::Input | LayerKind::Constant => (0, 1),
            LayerKind::Output => (1, 0),
            LayerKind::Add => (2, 1),
            _ => (1, 1),
        }
    }

    pub fn is_boundary(self) -> bool {
        matches!(self, LayerKind::Input | LayerKind::Output)
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
