//! paddleforge - Paddle program to layer graph converter
//!
//! Reads a Paddle inference program (operator records over named
//! variables) together with its per-variable tensor payload files and
//! builds a typed, fully wired layer graph.

#![allow(clippy::needless_range_loop)] // Index loops read clearer over tensor axes

pub mod config;
pub mod converter;
pub mod error;
pub mod graph;
pub mod loader;
pub mod logging;
pub mod program;
pub mod tensor;

pub use config::{ConverterConfig, MissingPayloadPolicy};
pub use converter::{convert, convert_model_dir, Converter};
pub use error::{ConvertError, ConvertResult, ErrorCategory, FormatError};
pub use graph::{Graph, Layer, LayerKind, NodeId};
pub use loader::{DirectoryPayloadSource, MemoryPayloadSource, PayloadSource};
pub use program::{BlockDescriptor, OperatorDescriptor, ProgramDescriptor, VariableDescriptor};
pub use tensor::DenseTensor;
