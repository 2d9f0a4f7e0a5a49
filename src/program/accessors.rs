//! Lookups over parsed descriptors
//!
//! [`BlockIndex`] builds its name index once and is read-only afterwards,
//! so one index can be shared across threads. Operator lookups are plain
//! methods on [`OperatorDescriptor`].

use std::collections::HashMap;

use crate::error::{ConvertError, ConvertResult};
use crate::program::{AttrValue, BlockDescriptor, OperatorDescriptor, VariableDescriptor};

/// Name index over a block's variables
#[derive(Debug)]
pub struct BlockIndex<'a> {
    vars: HashMap<&'a str, &'a VariableDescriptor>,
}

impl<'a> BlockIndex<'a> {
    pub fn new(block: &'a BlockDescriptor) -> Self {
        let mut vars = HashMap::with_capacity(block.vars.len());
        for var in &block.vars {
            // First declaration wins, like a linear scan would
            vars.entry(var.name.as_str()).or_insert(var);
        }
        Self { vars }
    }

    pub fn var(&self, name: &str) -> ConvertResult<&'a VariableDescriptor> {
        self.vars
            .get(name)
            .copied()
            .ok_or_else(|| ConvertError::MissingVariable(name.to_string()))
    }

    pub fn var_shape(&self, name: &str) -> ConvertResult<&'a [usize]> {
        self.var(name).map(|var| var.shape.as_slice())
    }
}

impl OperatorDescriptor {
    pub fn attr(&self, name: &str) -> ConvertResult<&AttrValue> {
        self.attrs
            .get(name)
            .ok_or_else(|| ConvertError::MissingAttribute {
                op_type: self.op_type.clone(),
                attr: name.to_string(),
            })
    }

    fn attr_type_error(&self, name: &str, expected: &'static str) -> ConvertError {
        ConvertError::AttributeType {
            op_type: self.op_type.clone(),
            attr: name.to_string(),
            expected,
        }
    }

    pub fn attr_int(&self, name: &str) -> ConvertResult<i64> {
        match self.attr(name)? {
            AttrValue::Int(v) => Ok(*v),
            _ => Err(self.attr_type_error(name, "an int")),
        }
    }

    pub fn attr_float(&self, name: &str) -> ConvertResult<f32> {
        match self.attr(name)? {
            AttrValue::Float(v) => Ok(*v),
            AttrValue::Int(v) => Ok(*v as f32),
            _ => Err(self.attr_type_error(name, "a float")),
        }
    }

    pub fn attr_str(&self, name: &str) -> ConvertResult<&str> {
        match self.attr(name)? {
            AttrValue::String(v) => Ok(v.as_str()),
            _ => Err(self.attr_type_error(name, "a string")),
        }
    }

    pub fn attr_ints(&self, name: &str) -> ConvertResult<&[i64]> {
        match self.attr(name)? {
            AttrValue::Ints(v) => Ok(v.as_slice()),
            _ => Err(self.attr_type_error(name, "an int list")),
        }
    }

    /// Two-element int list such as `strides` or `ksize`
    pub fn attr_pair(&self, name: &str) -> ConvertResult<[i64; 2]> {
        match self.attr_ints(name)? {
            &[a, b] => Ok([a, b]),
            _ => Err(self.attr_type_error(name, "a two-element int list")),
        }
    }

    pub fn attr_bool_or(&self, name: &str, default: bool) -> ConvertResult<bool> {
        match self.attrs.get(name) {
            None => Ok(default),
            Some(AttrValue::Bool(v)) => Ok(*v),
            Some(AttrValue::Int(v)) => Ok(*v != 0),
            Some(_) => Err(self.attr_type_error(name, "a bool")),
        }
    }

    /// Sole (first) variable bound to input `role`
    pub fn input(&self, role: &str) -> ConvertResult<&str> {
        self.input_opt(role).ok_or_else(|| ConvertError::MissingArgument {
            op_type: self.op_type.clone(),
            role: role.to_string(),
        })
    }

    pub fn input_opt(&self, role: &str) -> Option<&str> {
        self.inputs
            .get(role)
            .and_then(|args| args.first())
            .map(String::as_str)
    }

    /// Sole (first) variable bound to output `role`
    pub fn output(&self, role: &str) -> ConvertResult<&str> {
        self.outputs
            .get(role)
            .and_then(|args| args.first())
            .map(String::as_str)
            .ok_or_else(|| ConvertError::MissingArgument {
                op_type: self.op_type.clone(),
                role: role.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block() -> BlockDescriptor {
        BlockDescriptor::new()
            .with_var(VariableDescriptor::new("x", vec![1, 3, 4, 4]))
            .with_var(VariableDescriptor::new("x", vec![9]))
            .with_var(VariableDescriptor::new("w", vec![8, 3, 3, 3]).persistable(true))
    }

    #[test]
    fn test_var_lookup() {
        let block = block();
        let index = BlockIndex::new(&block);
        assert_eq!(index.var_shape("w").unwrap(), &[8, 3, 3, 3]);
        // duplicate names resolve to the first declaration
        assert_eq!(index.var_shape("x").unwrap(), &[1, 3, 4, 4]);
        assert!(matches!(
            index.var("missing"),
            Err(ConvertError::MissingVariable(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_attr_accessors() {
        let op = OperatorDescriptor::new("pool2d")
            .with_attr("pooling_type", AttrValue::String("avg".to_string()))
            .with_attr("ksize", AttrValue::Ints(vec![2, 2]))
            .with_attr("epsilon", AttrValue::Float(1e-5))
            .with_attr("global_pooling", AttrValue::Bool(true));

        assert_eq!(op.attr_str("pooling_type").unwrap(), "avg");
        assert_eq!(op.attr_pair("ksize").unwrap(), [2, 2]);
        assert_eq!(op.attr_float("epsilon").unwrap(), 1e-5);
        assert!(op.attr_bool_or("global_pooling", false).unwrap());
        assert!(!op.attr_bool_or("exclusive", false).unwrap());
    }

    #[test]
    fn test_attr_errors() {
        let op = OperatorDescriptor::new("conv2d")
            .with_attr("groups", AttrValue::String("1".to_string()))
            .with_attr("strides", AttrValue::Ints(vec![1, 1, 1]));

        assert!(matches!(
            op.attr_int("groups"),
            Err(ConvertError::AttributeType { expected: "an int", .. })
        ));
        assert!(matches!(
            op.attr_pair("strides"),
            Err(ConvertError::AttributeType { .. })
        ));
        assert!(matches!(
            op.attr("paddings"),
            Err(ConvertError::MissingAttribute { attr, .. }) if attr == "paddings"
        ));
    }

    #[test]
    fn test_arguments() {
        let op = OperatorDescriptor::new("relu")
            .with_input("X", "a")
            .with_output("Out", "b");
        assert_eq!(op.input("X").unwrap(), "a");
        assert_eq!(op.output("Out").unwrap(), "b");
        assert!(op.input_opt("Y").is_none());
        assert!(matches!(
            op.output("XShape"),
            Err(ConvertError::MissingArgument { role, .. }) if role == "XShape"
        ));
    }
}
