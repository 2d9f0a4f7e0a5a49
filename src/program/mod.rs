//! Program descriptor records
//!
//! These mirror the already-parsed contents of a Paddle program container:
//! blocks of variable declarations and operator records. They derive serde
//! so a JSON rendering of a program can be loaded directly.

pub mod accessors;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, ConvertResult};

/// A declared variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDescriptor {
    pub name: String,
    pub shape: Vec<usize>,
    /// Weights and other values that live in payload files
    #[serde(default)]
    pub persistable: bool,
}

impl VariableDescriptor {
    pub fn new(name: impl Into<String>, shape: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            shape,
            persistable: false,
        }
    }

    pub fn persistable(mut self, persistable: bool) -> Self {
        self.persistable = persistable;
        self
    }
}

/// Typed operator attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrValue {
    Int(i64),
    Float(f32),
    String(String),
    Ints(Vec<i64>),
    Floats(Vec<f32>),
    Bool(bool),
}

impl AttrValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            AttrValue::Int(_) => "int",
            AttrValue::Float(_) => "float",
            AttrValue::String(_) => "string",
            AttrValue::Ints(_) => "int list",
            AttrValue::Floats(_) => "float list",
            AttrValue::Bool(_) => "bool",
        }
    }
}

/// One operator record
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OperatorDescriptor {
    #[serde(rename = "type")]
    pub op_type: String,
    #[serde(default)]
    pub inputs: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub outputs: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub attrs: BTreeMap<String, AttrValue>,
}

impl OperatorDescriptor {
    pub fn new(op_type: impl Into<String>) -> Self {
        Self {
            op_type: op_type.into(),
            ..Self::default()
        }
    }

    /// Add an input role bound to a single variable
    pub fn with_input(mut self, role: &str, var: &str) -> Self {
        self.inputs
            .entry(role.to_string())
            .or_default()
            .push(var.to_string());
        self
    }

    /// Add an output role bound to a single variable
    pub fn with_output(mut self, role: &str, var: &str) -> Self {
        self.outputs
            .entry(role.to_string())
            .or_default()
            .push(var.to_string());
        self
    }

    pub fn with_attr(mut self, name: &str, value: AttrValue) -> Self {
        self.attrs.insert(name.to_string(), value);
        self
    }
}

/// A scope of variables and operators
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockDescriptor {
    #[serde(default)]
    pub idx: usize,
    #[serde(default)]
    pub vars: Vec<VariableDescriptor>,
    #[serde(default)]
    pub ops: Vec<OperatorDescriptor>,
}

impl BlockDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, var: VariableDescriptor) -> Self {
        self.vars.push(var);
        self
    }

    pub fn with_op(mut self, op: OperatorDescriptor) -> Self {
        self.ops.push(op);
        self
    }
}

/// A whole program: block 0 is the main block
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgramDescriptor {
    pub blocks: Vec<BlockDescriptor>,
}

impl ProgramDescriptor {
    pub fn from_json_str(json: &str) -> ConvertResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> ConvertResult<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| ConvertError::io(path, e))?;
        Self::from_json_str(&json)
    }

    pub fn block(&self, index: usize) -> ConvertResult<&BlockDescriptor> {
        self.blocks.get(index).ok_or(ConvertError::MissingBlock {
            index,
            available: self.blocks.len(),
        })
    }
}
