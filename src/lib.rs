//! Lowering of N-D index-tuple gather ops into a small tensor IR.
//!
//! The pipeline has three stages:
//!
//! 1. [`parse`] decodes a JSON source graph into op nodes and drives the
//!    lowering over them,
//! 2. [`lower`] holds the per-op lowering registry; `lower::gather_nd`
//!    expands `gather_nd` and `gather_nd_grad` into gather, broadcast,
//!    zero-fill, scatter-accumulate and sum-reduce builder nodes,
//! 3. [`ir`] is the target graph, its validating builder, and a reference
//!    evaluator backed by the [`kernels`] module.
//!
//! ```
//! use hlir::lower::Registry;
//! use hlir::parse::translate_json;
//!
//! let src = r#"{
//!     "inputs": [
//!         {"name": "x", "shape": [4, 5], "dtype": "float32"},
//!         {"name": "index", "shape": [3, 2], "dtype": "int64"}
//!     ],
//!     "nodes": [{
//!         "name": "out",
//!         "op_type": "gather_nd",
//!         "operands": {"x": ["x"], "index": ["index"]},
//!         "attrs": {"gather_nd_with_empty_index": false}
//!     }],
//!     "outputs": ["out"]
//! }"#;
//! let translated = translate_json(src, &Registry::with_builtin_ops()).unwrap();
//! println!("{}", translated.graph);
//! ```

pub mod error;
pub mod ir;
pub mod kernels;
pub mod lower;
pub mod node;
pub mod parse;

pub use error::{Error, Result};
pub use ir::{HlirGraph, TensorValue, ValueId};
pub use lower::Registry;
pub use node::{AttrValue, OpNode};
pub use parse::{translate_json, Translated};
