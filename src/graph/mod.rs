//! Layer graph built by the converter.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Ports are
//! addressed by `(node, slot)` pairs: an input port records its single
//! source, an output port records its consumers in connection order.

pub mod layer;

use std::collections::BTreeMap;

use crate::error::ConvertResult;
use crate::internal_error;

pub use layer::{
    BatchNormParams, Conv2dParams, Layer, LayerKind, Padding, Pool2dParams, SpaceToBatchParams,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Input port `slot` of `node`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputRef {
    pub node: NodeId,
    pub slot: usize,
}

/// Output port `slot` of `node`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputRef {
    pub node: NodeId,
    pub slot: usize,
}

impl InputRef {
    pub fn new(node: NodeId, slot: usize) -> Self {
        Self { node, slot }
    }
}

impl OutputRef {
    pub fn new(node: NodeId, slot: usize) -> Self {
        Self { node, slot }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputPort {
    shape: Vec<usize>,
    source: Option<OutputRef>,
}

impl InputPort {
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn source(&self) -> Option<OutputRef> {
        self.source
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputPort {
    shape: Vec<usize>,
    consumers: Vec<InputRef>,
}

impl OutputPort {
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn consumers(&self) -> &[InputRef] {
        &self.consumers
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: NodeId,
    /// Variable or operator the node was created for
    label: String,
    layer: Layer,
    inputs: Vec<InputPort>,
    outputs: Vec<OutputPort>,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    pub fn kind(&self) -> LayerKind {
        self.layer.kind()
    }

    pub fn inputs(&self) -> &[InputPort] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputPort] {
        &self.outputs
    }

    pub fn input(&self, slot: usize) -> Option<&InputPort> {
        self.inputs.get(slot)
    }

    pub fn output(&self, slot: usize) -> Option<&OutputPort> {
        self.outputs.get(slot)
    }
}

/// Mutable arena used while a graph is being wired.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node with one port per given shape.
    pub fn add_node(
        &mut self,
        layer: Layer,
        label: impl Into<String>,
        input_shapes: Vec<Vec<usize>>,
        output_shapes: Vec<Vec<usize>>,
    ) -> ConvertResult<NodeId> {
        let kind = layer.kind();
        if kind.arity() != (input_shapes.len(), output_shapes.len()) {
            return Err(internal_error!(
                "{} expects {:?} ports, got ({}, {})",
                kind,
                kind.arity(),
                input_shapes.len(),
                output_shapes.len()
            ));
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            label: label.into(),
            layer,
            inputs: input_shapes
                .into_iter()
                .map(|shape| InputPort {
                    shape,
                    source: None,
                })
                .collect(),
            outputs: output_shapes
                .into_iter()
                .map(|shape| OutputPort {
                    shape,
                    consumers: Vec::new(),
                })
                .collect(),
        });
        Ok(id)
    }

    /// Connect `from` to `to`. An input port accepts exactly one source.
    pub fn connect(&mut self, from: OutputRef, to: InputRef) -> ConvertResult<()> {
        if self.output_port(from).is_none() {
            return Err(internal_error!("no output port {:?}", from));
        }
        let bound = self
            .input_port(to)
            .ok_or_else(|| internal_error!("no input port {:?}", to))?
            .source;
        if let Some(existing) = bound {
            return Err(internal_error!(
                "input port {:?} already bound to {:?}",
                to,
                existing
            ));
        }
        self.nodes[to.node.0].inputs[to.slot].source = Some(from);

        self.nodes[from.node.0].outputs[from.slot].consumers.push(to);
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn input_port(&self, port: InputRef) -> Option<&InputPort> {
        self.node(port.node).and_then(|node| node.inputs.get(port.slot))
    }

    pub fn output_port(&self, port: OutputRef) -> Option<&OutputPort> {
        self.node(port.node).and_then(|node| node.outputs.get(port.slot))
    }

    pub fn is_consumed(&self, port: OutputRef) -> bool {
        self.output_port(port)
            .is_some_and(|output| !output.consumers.is_empty())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Freeze the arena into a validated [`Graph`].
    pub fn finish(self, inputs: Vec<NodeId>, outputs: Vec<NodeId>) -> ConvertResult<Graph> {
        let graph = Graph {
            nodes: self.nodes,
            inputs,
            outputs,
        };
        graph.validate()?;
        Ok(graph)
    }
}

/// A fully wired layer graph
#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    nodes: Vec<Node>,
    inputs: Vec<NodeId>,
    outputs: Vec<NodeId>,
}

impl Graph {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Boundary Input nodes, in registration order
    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    /// Boundary Output nodes, in registration order
    pub fn outputs(&self) -> &[NodeId] {
        &self.outputs
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes_of_kind(&self, kind: LayerKind) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.iter().filter(move |node| node.kind() == kind)
    }

    pub fn kind_counts(&self) -> BTreeMap<LayerKind, usize> {
        let mut counts = BTreeMap::new();
        for node in &self.nodes {
            *counts.entry(node.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// Node feeding input `slot` of `id`
    pub fn producer(&self, id: NodeId, slot: usize) -> Option<&Node> {
        let source = self.node(id)?.input(slot)?.source?;
        self.node(source.node)
    }

    /// Input ports with no source
    pub fn unbound_inputs(&self) -> Vec<InputRef> {
        let mut unbound = Vec::new();
        for node in &self.nodes {
            for (slot, port) in node.inputs.iter().enumerate() {
                if port.source.is_none() {
                    unbound.push(InputRef::new(node.id, slot));
                }
            }
        }
        unbound
    }

    /// Check structural invariants: every input bound exactly once, both
    /// ends of every edge agree, and the boundary lists hold boundary nodes.
    pub fn validate(&self) -> ConvertResult<()> {
        for node in &self.nodes {
            for (slot, port) in node.inputs.iter().enumerate() {
                let here = InputRef::new(node.id, slot);
                let source = port
                    .source
                    .ok_or_else(|| internal_error!("{} input {} of '{}' is unbound", node.kind(), slot, node.label))?;
                let output = self
                    .node(source.node)
                    .and_then(|producer| producer.output(source.slot))
                    .ok_or_else(|| internal_error!("{:?} reads missing port {:?}", here, source))?;
                let listed = output.consumers.iter().filter(|&&c| c == here).count();
                if listed != 1 {
                    return Err(internal_error!(
                        "{:?} listed {} times by its source {:?}",
                        here,
                        listed,
                        source
                    ));
                }
            }
        }

        let mut listed = vec![false; self.nodes.len()];
        for (ids, kind) in [(&self.inputs, LayerKind::Input), (&self.outputs, LayerKind::Output)] {
            for &id in ids {
                match self.node(id) {
                    Some(node) if node.kind() == kind => {}
                    _ => return Err(internal_error!("boundary {:?} is not an {} node", id, kind)),
                }
                if std::mem::replace(&mut listed[id.0], true) {
                    return Err(internal_error!("boundary {:?} registered twice", id));
                }
            }
        }

        // Every Input/Output node must be reachable through the boundary lists
        if let Some(node) = self
            .nodes
            .iter()
            .find(|node| node.kind().is_boundary() && !listed[node.id.0])
        {
            return Err(internal_error!(
                "{} node '{}' is not registered as a boundary",
                node.kind(),
                node.label
            ));
        }
        Ok(())
    }
}
