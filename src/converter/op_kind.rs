//! Closed set of operator types the converter lowers

use std::fmt;

use crate::error::{ConvertError, ConvertResult};
use crate::program::OperatorDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Feed,
    Fetch,
    Conv2d,
    ElementwiseAdd,
    BatchNorm,
    Relu,
    Pool2d,
    Reshape,
    Softmax,
}

impl OpKind {
    /// Map a Paddle type tag to its kind. Aliases share a kind.
    pub fn parse(op_type: &str) -> Option<Self> {
        let kind = match op_type {
            "feed" => OpKind::Feed,
            "fetch" => OpKind::Fetch,
            "conv2d" | "depthwise_conv2d" => OpKind::Conv2d,
            "elementwise_add" => OpKind::ElementwiseAdd,
            "batch_norm" => OpKind::BatchNorm,
            "relu" => OpKind::Relu,
            "pool2d" => OpKind::Pool2d,
            "reshape" | "reshape2" => OpKind::Reshape,
            "softmax" => OpKind::Softmax,
            _ => return None,
        };
        Some(kind)
    }

    /// Kind of the operator at position `index` of its block
    pub fn of(op: &OperatorDescriptor, index: usize) -> ConvertResult<Self> {
        Self::parse(&op.op_type).ok_or_else(|| ConvertError::UnsupportedOperation {
            op_type: op.op_type.clone(),
            index,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OpKind::Feed => "feed",
            OpKind::Fetch => "fetch",
            OpKind::Conv2d => "conv2d",
            OpKind::ElementwiseAdd => "elementwise_add",
            OpKind::BatchNorm => "batch_norm",
            OpKind::Relu => "relu",
            OpKind::Pool2d => "pool2d",
            OpKind::Reshape => "reshape",
            OpKind::Softmax => "softmax",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
