//! Source-graph node view consumed by the lowering routines.
//!
//! A node carries its op-type name, a role-keyed operand map (handles into
//! the target IR graph, first-element selection throughout) and a name-keyed
//! attribute bag. Lowering code converts the bag into a statically typed
//! per-op config exactly once before emitting any IR; see `lower::gather_nd`.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::ir::builder::ValueId;

/// A typed scalar or list attribute value.
///
/// Deserializes untagged, so JSON `true`, `3`, `[1, 2]` map naturally.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Ints(Vec<i64>),
}

#[derive(Debug, Clone)]
pub struct OpNode {
    pub op_type: String,
    operands: HashMap<String, Vec<ValueId>>,
    attrs: HashMap<String, AttrValue>,
}

impl OpNode {
    pub fn new(op_type: impl Into<String>) -> Self {
        Self {
            op_type: op_type.into(),
            operands: HashMap::new(),
            attrs: HashMap::new(),
        }
    }

    pub fn with_operand(mut self, role: impl Into<String>, ids: Vec<ValueId>) -> Self {
        self.operands.insert(role.into(), ids);
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: AttrValue) -> Self {
        self.attrs.insert(name.into(), value);
        self
    }

    /// First handle registered under `role`.
    pub fn operand(&self, role: &str) -> Result<ValueId> {
        self.operands
            .get(role)
            .and_then(|ids| ids.first())
            .copied()
            .ok_or_else(|| Error::MissingOperand {
                op: self.op_type.clone(),
                role: role.to_string(),
            })
    }

    pub fn attr_bool(&self, name: &str) -> Result<bool> {
        match self.attr(name)? {
            AttrValue::Bool(v) => Ok(*v),
            _ => Err(self.attr_type_error(name, "a bool")),
        }
    }

    pub fn attr_ints(&self, name: &str) -> Result<&[i64]> {
        match self.attr(name)? {
            AttrValue::Ints(v) => Ok(v),
            _ => Err(self.attr_type_error(name, "an integer list")),
        }
    }

    fn attr(&self, name: &str) -> Result<&AttrValue> {
        self.attrs.get(name).ok_or_else(|| Error::MissingAttr {
            op: self.op_type.clone(),
            attr: name.to_string(),
        })
    }

    fn attr_type_error(&self, name: &str, expected: &'static str) -> Error {
        Error::AttrType {
            op: self.op_type.clone(),
            attr: name.to_string(),
            expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operand_selects_first_handle() {
        let node = OpNode::new("gather_nd").with_operand("x", vec![7, 8]);
        assert_eq!(node.operand("x").unwrap(), 7);
    }

    #[test]
    fn missing_operand_names_op_and_role() {
        let node = OpNode::new("gather_nd");
        let err = node.operand("index").unwrap_err();
        assert_eq!(
            err,
            Error::MissingOperand {
                op: "gather_nd".into(),
                role: "index".into()
            }
        );
    }

    #[test]
    fn typed_attr_accessors() {
        let node = OpNode::new("gather_nd")
            .with_attr("flag", AttrValue::Bool(true))
            .with_attr("dims", AttrValue::Ints(vec![3, 5]));
        assert!(node.attr_bool("flag").unwrap());
        assert_eq!(node.attr_ints("dims").unwrap(), &[3, 5]);
    }

    #[test]
    fn mistyped_attr_is_rejected() {
        let node = OpNode::new("gather_nd").with_attr("flag", AttrValue::Int(1));
        let err = node.attr_bool("flag").unwrap_err();
        assert!(err.to_string().contains("is not a bool"), "got: {err}");
    }

    #[test]
    fn attr_value_deserializes_untagged() {
        let v: AttrValue = serde_json::from_str("true").unwrap();
        assert_eq!(v, AttrValue::Bool(true));
        let v: AttrValue = serde_json::from_str("[1, 2, 3]").unwrap();
        assert_eq!(v, AttrValue::Ints(vec![1, 2, 3]));
    }
}
