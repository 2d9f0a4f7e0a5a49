//! Program-to-graph conversion
//!
//! [`Converter`] lowers one block of a program into a [`Graph`]. Operators
//! are visited once in descriptor order. Their inputs are bound after the
//! visit, so a block may read a variable before the operator that defines
//! it appears.

mod handlers;
pub mod op_kind;
pub mod resolver;

use std::path::Path;

use tracing::{debug, info};

use crate::config::ConverterConfig;
use crate::error::ConvertResult;
use crate::graph::Graph;
use crate::loader::{DirectoryPayloadSource, PayloadSource};
use crate::program::{BlockDescriptor, ProgramDescriptor};

pub use op_kind::OpKind;
pub use resolver::Resolver;

/// Converts one block into a layer graph
pub struct Converter<'a> {
    block: &'a BlockDescriptor,
    source: Option<&'a dyn PayloadSource>,
    config: ConverterConfig,
}

impl<'a> Converter<'a> {
    /// `source` supplies weight payloads. Without one, variables nobody
    /// produces become graph inputs.
    pub fn new(
        block: &'a BlockDescriptor,
        source: Option<&'a dyn PayloadSource>,
        config: ConverterConfig,
    ) -> Self {
        Self {
            block,
            source,
            config,
        }
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn convert(&self) -> ConvertResult<Graph> {
        self.config.validate()?;
        debug!(
            block = self.block.idx,
            vars = self.block.vars.len(),
            ops = self.block.ops.len(),
            "converting block"
        );

        let graph = Resolver::new(self.block, self.source, &self.config).run()?;

        let summary = graph
            .kind_counts()
            .iter()
            .map(|(kind, count)| format!("{}={}", kind, count))
            .collect::<Vec<_>>()
            .join(" ");
        info!(
            nodes = graph.len(),
            inputs = graph.inputs().len(),
            outputs = graph.outputs().len(),
            kinds = %summary,
            "converted block {}",
            self.block.idx
        );
        Ok(graph)
    }
}

/// Convert `block` with the default configuration.
pub fn convert(block: &BlockDescriptor, source: Option<&dyn PayloadSource>) -> ConvertResult<Graph> {
    Converter::new(block, source, ConverterConfig::default()).convert()
}

/// Convert a model directory holding a JSON program descriptor next to
/// one payload file per persistable variable.
pub fn convert_model_dir(dir: impl AsRef<Path>, config: &ConverterConfig) -> ConvertResult<Graph> {
    let dir = dir.as_ref();
    config.validate()?;

    let program = ProgramDescriptor::from_json_file(dir.join(&config.descriptor_file))?;
    let block = program.block(config.block_index)?;
    let source = DirectoryPayloadSource::new(dir);

    info!(model = %dir.display(), block = config.block_index, "loading model directory");
    Converter::new(block, Some(&source), config.clone()).convert()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MissingPayloadPolicy;
    use crate::error::ConvertError;
    use crate::graph::LayerKind;
    use crate::loader::MemoryPayloadSource;
    use crate::program::{OperatorDescriptor, VariableDescriptor};
    use crate::tensor::DenseTensor;

    /// feed x -> relu -> fetch, with `a` read by an add but never produced
    fn block() -> BlockDescriptor {
        BlockDescriptor::new()
            .with_var(VariableDescriptor::new("x", vec![1, 3]))
            .with_var(VariableDescriptor::new("a", vec![1, 3]).persistable(true))
            .with_var(VariableDescriptor::new("h", vec![1, 3]))
            .with_var(VariableDescriptor::new("y", vec![1, 3]))
            .with_op(OperatorDescriptor::new("feed").with_output("Out", "x"))
            .with_op(
                OperatorDescriptor::new("elementwise_add")
                    .with_input("X", "x")
                    .with_input("Y", "a")
                    .with_output("Out", "h"),
            )
            .with_op(
                OperatorDescriptor::new("relu")
                    .with_input("X", "h")
                    .with_output("Out", "y"),
            )
            .with_op(OperatorDescriptor::new("fetch").with_input("X", "y"))
    }

    #[test]
    fn test_convert_with_payloads() {
        let mut source = MemoryPayloadSource::new();
        source.insert_tensor("a", &DenseTensor::from_vec(&[1, 3], vec![1.0f32, 2.0, 3.0]).unwrap());

        let graph = convert(&block(), Some(&source)).unwrap();
        assert_eq!(graph.len(), 5);
        assert_eq!(graph.inputs().len(), 1);
        assert_eq!(graph.outputs().len(), 1);

        let constant = graph.nodes_of_kind(LayerKind::Constant).next().unwrap();
        assert_eq!(constant.label(), "a");
        match constant.layer() {
            crate::graph::Layer::Constant(t) => assert_eq!(t.data(), &[1.0, 2.0, 3.0]),
            other => panic!("unexpected layer {other:?}"),
        }
    }

    #[test]
    fn test_convert_without_source_makes_inputs() {
        let graph = convert(&block(), None).unwrap();
        let labels: Vec<_> = graph
            .inputs()
            .iter()
            .map(|&id| graph.node(id).unwrap().label().to_string())
            .collect();
        assert_eq!(labels, vec!["x", "a"]);
    }

    #[test]
    fn test_reject_policy() {
        let config = ConverterConfig::new().with_missing_payload(MissingPayloadPolicy::Reject);
        let source = MemoryPayloadSource::new();
        let err = Converter::new(&block(), Some(&source), config)
            .convert()
            .unwrap_err();
        assert!(matches!(err, ConvertError::MissingPayload(name) if name == "a"));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ConverterConfig::new().with_descriptor_file("");
        let err = Converter::new(&block(), None, config).convert().unwrap_err();
        assert!(matches!(err, ConvertError::InvalidConfiguration(_)));
    }
}
