//! Target IR: value types, graph builder, and a reference evaluator.

pub mod builder;
pub mod eval;
pub mod types;

pub use builder::{GatherDimensionNumbers, HlirGraph, Value, ValueId, ValueKind};
pub use eval::TensorValue;
pub use types::{ElemType, Shape, Type};
