//! JSON source-graph frontend.
//!
//! Decodes a serialized op graph (named inputs, a node list with role-keyed
//! operand names and an attribute bag, named outputs), resolves every name
//! reference and drives the lowering registry over the nodes in order. Each
//! node's single result is recorded under the node's name so later nodes and
//! the output list can refer to it.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::ir::builder::{HlirGraph, ValueId};
use crate::ir::types::{ElemType, Type};
use crate::lower::Registry;
use crate::node::{AttrValue, OpNode};

#[derive(Debug, Deserialize)]
struct RawGraph {
    inputs: Vec<RawInput>,
    nodes: Vec<RawNode>,
    outputs: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawInput {
    name: String,
    shape: Vec<i64>,
    dtype: String,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    name: String,
    op_type: String,
    operands: HashMap<String, Vec<String>>,
    #[serde(default)]
    attrs: HashMap<String, AttrValue>,
}

/// A translated graph together with its output handles, in declaration
/// order.
#[derive(Debug)]
pub struct Translated {
    pub graph: HlirGraph,
    pub outputs: Vec<ValueId>,
}

fn parse_elem_type(name: &str) -> Result<ElemType> {
    match name {
        "float32" => Ok(ElemType::F32),
        "float64" => Ok(ElemType::F64),
        "int32" => Ok(ElemType::I32),
        "int64" => Ok(ElemType::I64),
        "bool" => Ok(ElemType::Bool),
        other => Err(Error::Parse(format!("unknown dtype '{other}'"))),
    }
}

/// Decode `src` and lower every node through `registry`.
pub fn translate_json(src: &str, registry: &Registry) -> Result<Translated> {
    let raw: RawGraph =
        serde_json::from_str(src).map_err(|e| Error::Parse(e.to_string()))?;

    let mut graph = HlirGraph::new();
    let mut by_name: HashMap<String, ValueId> = HashMap::new();

    for input in &raw.inputs {
        let ty = Type::ranked(input.shape.clone(), parse_elem_type(&input.dtype)?);
        let id = graph.parameter(ty);
        if by_name.insert(input.name.clone(), id).is_some() {
            return Err(Error::Parse(format!("duplicate name '{}'", input.name)));
        }
    }

    for raw_node in raw.nodes {
        let mut node = OpNode::new(raw_node.op_type);
        for (role, names) in &raw_node.operands {
            let mut ids = Vec::with_capacity(names.len());
            for name in names {
                let id = by_name.get(name).copied().ok_or_else(|| {
                    Error::Parse(format!(
                        "node '{}' refers to unknown value '{name}'",
                        raw_node.name
                    ))
                })?;
                ids.push(id);
            }
            node = node.with_operand(role.clone(), ids);
        }
        for (name, value) in raw_node.attrs {
            node = node.with_attr(name, value);
        }

        let result = registry.lower(&mut graph, &node)?;
        log::debug!("node '{}' lowered to %{result}", raw_node.name);
        if by_name.insert(raw_node.name.clone(), result).is_some() {
            return Err(Error::Parse(format!("duplicate name '{}'", raw_node.name)));
        }
    }

    let mut outputs = Vec::with_capacity(raw.outputs.len());
    for name in &raw.outputs {
        let id = by_name
            .get(name)
            .copied()
            .ok_or_else(|| Error::Parse(format!("unknown output '{name}'")))?;
        outputs.push(id);
    }

    Ok(Translated { graph, outputs })
}
