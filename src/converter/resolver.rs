//! Deferred binding of operator inputs to producers
//!
//! Handlers never connect an operator input directly. They record a
//! *pending* binding (input port, variable name) and announce the ports
//! they *produce*. Once every operator is lowered, [`Resolver::finish`]
//! wires each pending input to its producer, substitutes constants or
//! boundary inputs for variables nobody produced, and closes every
//! dangling output with an Output node.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::config::{ConverterConfig, MissingPayloadPolicy};
use crate::converter::handlers;
use crate::converter::op_kind::OpKind;
use crate::error::{ConvertError, ConvertResult};
use crate::graph::{Graph, GraphBuilder, InputRef, Layer, NodeId, OutputRef};
use crate::loader::{decode_or_default, load_payload, PayloadSource};
use crate::program::accessors::BlockIndex;
use crate::program::BlockDescriptor;
use crate::tensor::DenseTensor;

#[derive(Debug, Clone)]
struct PendingBinding {
    port: InputRef,
    name: String,
    op_index: usize,
}

#[derive(Debug, Clone, Copy)]
struct Production {
    port: OutputRef,
    op_index: usize,
}

/// Binding tables for one conversion
#[derive(Debug, Default)]
struct Bindings {
    pending: Vec<PendingBinding>,
    produced: HashMap<String, Vec<Production>>,
    /// Names in first-production order
    order: Vec<String>,
}

impl Bindings {
    fn consume(&mut self, port: InputRef, name: &str, op_index: usize) {
        self.pending.push(PendingBinding {
            port,
            name: name.to_string(),
            op_index,
        });
    }

    fn produce(&mut self, name: &str, port: OutputRef, op_index: usize) {
        let productions = self.produced.entry(name.to_string()).or_default();
        if productions.is_empty() {
            self.order.push(name.to_string());
        } else {
            debug!(variable = name, op_index, "variable redefined");
        }
        productions.push(Production { port, op_index });
    }

    /// Latest producer before `op_index`, else the latest overall
    fn producer_for(&self, name: &str, op_index: usize) -> Option<OutputRef> {
        let productions = self.produced.get(name)?;
        productions
            .iter()
            .rev()
            .find(|p| p.op_index < op_index)
            .or_else(|| productions.last())
            .map(|p| p.port)
    }

    fn latest(&self, name: &str) -> Option<OutputRef> {
        self.produced
            .get(name)
            .and_then(|productions| productions.last())
            .map(|p| p.port)
    }
}

/// Lowering state shared by all handlers of one block
pub struct Resolver<'a> {
    block: &'a BlockDescriptor,
    index: BlockIndex<'a>,
    source: Option<&'a dyn PayloadSource>,
    config: &'a ConverterConfig,
    builder: GraphBuilder,
    bindings: Bindings,
    inputs: Vec<NodeId>,
    outputs: Vec<NodeId>,
    /// Constants and synthesized inputs, one per variable
    substitutes: HashMap<String, OutputRef>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        block: &'a BlockDescriptor,
        source: Option<&'a dyn PayloadSource>,
        config: &'a ConverterConfig,
    ) -> Self {
        Self {
            block,
            index: BlockIndex::new(block),
            source,
            config,
            builder: GraphBuilder::new(),
            bindings: Bindings::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            substitutes: HashMap::new(),
        }
    }

    /// Lower every operator in descriptor order, then resolve.
    pub fn run(mut self) -> ConvertResult<Graph> {
        let block = self.block;
        for (op_index, op) in block.ops.iter().enumerate() {
            let kind = OpKind::of(op, op_index)?;
            trace!(op_index, op_type = %op.op_type, "lowering operator");
            handlers::lower(&mut self, kind, op, op_index)?;
        }
        self.finish()
    }

    pub(crate) fn config(&self) -> &ConverterConfig {
        self.config
    }

    pub(crate) fn source(&self) -> Option<&'a dyn PayloadSource> {
        self.source
    }

    pub(crate) fn var_shape(&self, name: &str) -> ConvertResult<Vec<usize>> {
        self.index.var_shape(name).map(<[usize]>::to_vec)
    }

    pub(crate) fn add_node(
        &mut self,
        layer: Layer,
        label: &str,
        input_shapes: Vec<Vec<usize>>,
        output_shapes: Vec<Vec<usize>>,
    ) -> ConvertResult<NodeId> {
        self.builder
            .add_node(layer, label, input_shapes, output_shapes)
    }

    pub(crate) fn connect(&mut self, from: OutputRef, to: InputRef) -> ConvertResult<()> {
        self.builder.connect(from, to)
    }

    pub(crate) fn output_shape(&self, port: OutputRef) -> ConvertResult<Vec<usize>> {
        self.builder
            .output_port(port)
            .map(|p| p.shape().to_vec())
            .ok_or_else(|| crate::internal_error!("no output port {:?}", port))
    }

    /// Input `slot` of `node` reads variable `name`
    pub(crate) fn consume(&mut self, node: NodeId, slot: usize, name: &str, op_index: usize) {
        self.bindings
            .consume(InputRef::new(node, slot), name, op_index);
    }

    /// Output `slot` of `node` defines variable `name`
    pub(crate) fn produce(&mut self, name: &str, node: NodeId, slot: usize, op_index: usize) {
        self.bindings
            .produce(name, OutputRef::new(node, slot), op_index);
    }

    pub(crate) fn register_input(&mut self, node: NodeId) {
        self.inputs.push(node);
    }

    pub(crate) fn register_output(&mut self, node: NodeId) {
        self.outputs.push(node);
    }

    /// Decode a required f32 payload such as a filter or a statistic.
    pub(crate) fn load_weights(&self, name: &str, dims: &[usize]) -> ConvertResult<DenseTensor<f32>> {
        match self.source {
            Some(source) => load_payload(source, name, dims),
            None => Err(ConvertError::MissingPayload(name.to_string())),
        }
    }

    fn finish(mut self) -> ConvertResult<Graph> {
        self.bind_pending()?;
        self.close_outputs()?;
        self.builder.finish(self.inputs, self.outputs)
    }

    fn bind_pending(&mut self) -> ConvertResult<()> {
        let pending = std::mem::take(&mut self.bindings.pending);
        for binding in pending {
            let source = match self.bindings.producer_for(&binding.name, binding.op_index) {
                Some(port) => port,
                None => self.substitute(&binding.name)?,
            };
            trace!(
                variable = %binding.name,
                consumer = binding.port.node.0,
                producer = source.node.0,
                "binding"
            );
            self.builder.connect(source, binding.port)?;
        }
        Ok(())
    }

    /// Node standing in for a variable no operator produced
    fn substitute(&mut self, name: &str) -> ConvertResult<OutputRef> {
        if let Some(&port) = self.substitutes.get(name) {
            return Ok(port);
        }

        let shape = self.var_shape(name)?;
        let node = match self.source {
            Some(source) => {
                let tensor = match self.config.missing_payload {
                    MissingPayloadPolicy::ZeroFill => decode_or_default(source, name, &shape)?,
                    MissingPayloadPolicy::Reject => load_payload(source, name, &shape)?,
                };
                debug!(variable = name, ?shape, "constant from payload");
                self.builder
                    .add_node(Layer::Constant(tensor), name, vec![], vec![shape])?
            }
            None => {
                debug!(variable = name, ?shape, "unproduced variable becomes an input");
                let node = self.builder.add_node(Layer::Input, name, vec![], vec![shape])?;
                self.inputs.push(node);
                node
            }
        };

        let port = OutputRef::new(node, 0);
        self.substitutes.insert(name.to_string(), port);
        Ok(port)
    }

    fn close_outputs(&mut self) -> ConvertResult<()> {
        let order = std::mem::take(&mut self.bindings.order);
        for name in order {
            let Some(port) = self.bindings.latest(&name) else {
                continue;
            };
            if self.builder.is_consumed(port) {
                continue;
            }
            let shape = self.output_shape(port)?;
            debug!(variable = %name, "closing unconsumed output");
            let node = self.builder.add_node(Layer::Output, &name, vec![shape], vec![])?;
            self.builder.connect(port, InputRef::new(node, 0))?;
            self.outputs.push(node);
        }
        Ok(())
    }
}
