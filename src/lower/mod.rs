//! Per-op lowering dispatch.
//!
//! Each supported op type maps to a plain function pointer that appends the
//! op's IR expansion to the graph and returns the root handle. The registry
//! is built once by the caller and only read afterwards, so translation can
//! run on any thread without shared mutable state.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::ir::builder::{HlirGraph, ValueId};
use crate::node::OpNode;

pub mod gather_nd;

/// Lowers one source node into the graph, returning its result handle.
pub type LowerFn = fn(&mut HlirGraph, &OpNode) -> Result<ValueId>;

pub struct Registry {
    map: HashMap<&'static str, LowerFn>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Registry with every built-in lowering installed.
    pub fn with_builtin_ops() -> Self {
        let mut r = Self::new();
        r.register(gather_nd::GATHER_ND, gather_nd::lower_gather_nd);
        r.register(gather_nd::GATHER_ND_GRAD, gather_nd::lower_gather_nd_grad);
        r
    }

    pub fn register(&mut self, op_type: &'static str, f: LowerFn) {
        self.map.insert(op_type, f);
    }

    /// Dispatch `node` to its registered lowering.
    pub fn lower(&self, g: &mut HlirGraph, node: &OpNode) -> Result<ValueId> {
        let f = self
            .map
            .get(node.op_type.as_str())
            .ok_or_else(|| Error::UnsupportedOp(node.op_type.clone()))?;
        log::debug!("lowering {} node", node.op_type);
        f(g, node)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
