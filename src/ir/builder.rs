//! The target IR graph and its builder surface.
//!
//! Lowering routines only ever append values through the builder methods and
//! receive opaque `ValueId` handles back. Each method validates its node
//! before recording it; an inconsistent construction is rejected with a
//! `Shape` error and leaves the graph untouched.

use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::ir::types::{ElemType, Shape, Type};

/// Opaque handle to a value node in the IR graph.
pub type ValueId = usize;

/// Dimension-number metadata for the generalized gather, in the usual
/// HLO vocabulary:
///
/// - `offset_dims`: output axes that hold the copied (non-indexed) data axes
/// - `collapsed_slice_dims`: data axes fully consumed by the index
/// - `start_index_map`: which data axis each index-vector component selects
/// - `index_vector_dim`: the indices axis holding the index-component vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatherDimensionNumbers {
    pub offset_dims: Vec<i64>,
    pub collapsed_slice_dims: Vec<i64>,
    pub start_index_map: Vec<i64>,
    pub index_vector_dim: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ValueKind {
    /// Graph input, fed by the caller at evaluation time
    Parameter { index: usize },
    Gather {
        dims: GatherDimensionNumbers,
        slice_sizes: Vec<i64>,
        indices_are_sorted: bool,
    },
    BroadcastInDim { broadcast_dims: Vec<i64> },
    ZerosLike,
    /// Adds updates into a base tensor at index-named positions, summing on
    /// collisions. Inputs: [base, indices, updates].
    ScatterAdd,
    ReduceSum { axes: Vec<i64>, keep_dims: bool },
}

#[derive(Debug, Clone, Serialize)]
pub struct Value {
    pub kind: ValueKind,
    pub inputs: Vec<ValueId>,
    pub ty: Type,
}

/// The IR graph under construction. Append-only: builder methods add one
/// value each and never mutate earlier values.
#[derive(Debug, Default, Serialize)]
pub struct HlirGraph {
    values: Vec<Value>,
    param_count: usize,
}

impl HlirGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id]
    }

    pub fn ty(&self, id: ValueId) -> &Type {
        &self.values[id].ty
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    fn push(&mut self, kind: ValueKind, inputs: Vec<ValueId>, ty: Type) -> ValueId {
        let id = self.values.len();
        self.values.push(Value { kind, inputs, ty });
        id
    }

    /// Dims of a ranked operand, or a `Shape` error naming the op that asked.
    fn ranked_dims(&self, id: ValueId, op: &str) -> Result<Vec<i64>> {
        match self.ty(id).shape.dims() {
            Some(dims) => Ok(dims.to_vec()),
            None => Err(Error::Shape(format!(
                "{op}: operand %{id} must have a ranked shape"
            ))),
        }
    }

    // -----------------------------------------------------------------------
    // builder methods
    // -----------------------------------------------------------------------

    pub fn parameter(&mut self, ty: Type) -> ValueId {
        let index = self.param_count;
        self.param_count += 1;
        self.push(ValueKind::Parameter { index }, vec![], ty)
    }

    /// Generalized gather. `out_ty` is caller-provided because the output
    /// rank is not statically pinned here.
    pub fn gather(
        &mut self,
        data: ValueId,
        indices: ValueId,
        dims: GatherDimensionNumbers,
        slice_sizes: Vec<i64>,
        indices_are_sorted: bool,
        out_ty: Type,
    ) -> Result<ValueId> {
        let data_dims = self.ranked_dims(data, "gather")?;
        let index_dims = self.ranked_dims(indices, "gather")?;
        let data_rank = data_dims.len() as i64;
        let indices_rank = index_dims.len() as i64;

        if !self.ty(indices).elem.is_integer() {
            return Err(Error::Shape(format!(
                "gather: indices must be an integer tensor, got {:?}",
                self.ty(indices).elem
            )));
        }
        if indices_rank == 0 {
            return Err(Error::Shape(
                "gather: indices tensor must have rank >= 1".into(),
            ));
        }

        let index_vector_len = *index_dims.last().unwrap();
        if index_vector_len > data_rank {
            return Err(Error::Shape(format!(
                "gather: index vector length {index_vector_len} exceeds data rank {data_rank}"
            )));
        }
        if dims.index_vector_dim < 0 || dims.index_vector_dim > indices_rank {
            return Err(Error::Shape(format!(
                "gather: index_vector_dim {} out of range for indices rank {indices_rank}",
                dims.index_vector_dim
            )));
        }
        if slice_sizes.len() as i64 != data_rank {
            return Err(Error::Shape(format!(
                "gather: expected {data_rank} slice sizes, got {}",
                slice_sizes.len()
            )));
        }
        for (axis, (&size, &dim)) in slice_sizes.iter().zip(data_dims.iter()).enumerate() {
            if size < 0 || size > dim {
                return Err(Error::Shape(format!(
                    "gather: slice size {size} out of range for data axis {axis} (extent {dim})"
                )));
            }
        }
        if dims.start_index_map.len() as i64 != index_vector_len {
            return Err(Error::Shape(format!(
                "gather: start_index_map has {} entries, index vector has {index_vector_len}",
                dims.start_index_map.len()
            )));
        }
        check_axis_list(&dims.start_index_map, data_rank, "gather", "start_index_map")?;
        check_sorted_axis_list(
            &dims.collapsed_slice_dims,
            data_rank,
            "gather",
            "collapsed_slice_dims",
        )?;
        for &axis in &dims.collapsed_slice_dims {
            if slice_sizes[axis as usize] != 1 {
                return Err(Error::Shape(format!(
                    "gather: collapsed axis {axis} must have slice size 1, got {}",
                    slice_sizes[axis as usize]
                )));
            }
        }
        if !is_strictly_increasing(&dims.offset_dims) {
            return Err(Error::Shape(
                "gather: offset_dims must be strictly increasing".into(),
            ));
        }

        Ok(self.push(
            ValueKind::Gather {
                dims,
                slice_sizes,
                indices_are_sorted,
            },
            vec![data, indices],
            out_ty,
        ))
    }

    /// Broadcast `operand` into the ranked target shape of `out_ty`.
    /// `broadcast_dims[d]` names the target axis that operand axis `d` maps
    /// onto.
    pub fn broadcast_in_dim(
        &mut self,
        operand: ValueId,
        broadcast_dims: Vec<i64>,
        out_ty: Type,
    ) -> Result<ValueId> {
        let operand_dims = self.ranked_dims(operand, "broadcast_in_dim")?;
        let target_dims = match out_ty.shape.dims() {
            Some(dims) => dims.to_vec(),
            None => {
                return Err(Error::Shape(
                    "broadcast_in_dim: target type must be ranked".into(),
                ))
            }
        };
        if out_ty.elem != self.ty(operand).elem {
            return Err(Error::Shape(format!(
                "broadcast_in_dim: element type mismatch ({:?} vs {:?})",
                self.ty(operand).elem,
                out_ty.elem
            )));
        }
        if broadcast_dims.len() != operand_dims.len() {
            return Err(Error::Shape(format!(
                "broadcast_in_dim: {} mapping entries for operand rank {}",
                broadcast_dims.len(),
                operand_dims.len()
            )));
        }
        if !is_strictly_increasing(&broadcast_dims) {
            return Err(Error::Shape(
                "broadcast_in_dim: broadcast_dims must be strictly increasing".into(),
            ));
        }
        let target_rank = target_dims.len() as i64;
        for (axis, &target_axis) in broadcast_dims.iter().enumerate() {
            if target_axis < 0 || target_axis >= target_rank {
                return Err(Error::Shape(format!(
                    "broadcast_in_dim: mapped axis {target_axis} out of range for target rank {target_rank}"
                )));
            }
            let from = operand_dims[axis];
            let to = target_dims[target_axis as usize];
            if from != to && from != 1 {
                return Err(Error::Shape(format!(
                    "broadcast_in_dim: operand axis {axis} (extent {from}) does not broadcast to target axis {target_axis} (extent {to})"
                )));
            }
        }

        Ok(self.push(
            ValueKind::BroadcastInDim { broadcast_dims },
            vec![operand],
            out_ty,
        ))
    }

    /// Zero-filled value with the operand's exact type.
    pub fn zeros_like(&mut self, operand: ValueId) -> ValueId {
        let ty = self.ty(operand).clone();
        self.push(ValueKind::ZerosLike, vec![operand], ty)
    }

    /// Scatter-accumulate `updates` into `base` at positions named by
    /// `indices`. Colliding index tuples sum their contributions.
    pub fn scatter_add(
        &mut self,
        base: ValueId,
        indices: ValueId,
        updates: ValueId,
    ) -> Result<ValueId> {
        let base_dims = self.ranked_dims(base, "scatter_add")?;
        let index_dims = self.ranked_dims(indices, "scatter_add")?;
        let update_dims = self.ranked_dims(updates, "scatter_add")?;

        if !self.ty(indices).elem.is_integer() {
            return Err(Error::Shape(format!(
                "scatter_add: indices must be an integer tensor, got {:?}",
                self.ty(indices).elem
            )));
        }
        if self.ty(updates).elem != self.ty(base).elem {
            return Err(Error::Shape(format!(
                "scatter_add: element type mismatch ({:?} vs {:?})",
                self.ty(base).elem,
                self.ty(updates).elem
            )));
        }
        if index_dims.is_empty() {
            return Err(Error::Shape(
                "scatter_add: indices tensor must have rank >= 1".into(),
            ));
        }
        let index_vector_len = *index_dims.last().unwrap();
        if index_vector_len > base_dims.len() as i64 {
            return Err(Error::Shape(format!(
                "scatter_add: index vector length {index_vector_len} exceeds base rank {}",
                base_dims.len()
            )));
        }

        // updates shape must be batch dims ++ base tail, mirroring the
        // forward gather's output shape.
        let mut expected: Vec<i64> = index_dims[..index_dims.len() - 1].to_vec();
        expected.extend_from_slice(&base_dims[index_vector_len as usize..]);
        if update_dims != expected {
            return Err(Error::Shape(format!(
                "scatter_add: updates shape {update_dims:?} does not match expected {expected:?}"
            )));
        }

        let ty = self.ty(base).clone();
        Ok(self.push(ValueKind::ScatterAdd, vec![base, indices, updates], ty))
    }

    /// Sum-reduction over `axes`. Reduced axes are dropped unless
    /// `keep_dims`, in which case they survive with extent 1.
    pub fn reduce_sum(
        &mut self,
        operand: ValueId,
        keep_dims: bool,
        axes: Vec<i64>,
    ) -> Result<ValueId> {
        let operand_dims = self.ranked_dims(operand, "reduce_sum")?;
        let rank = operand_dims.len() as i64;
        check_axis_list(&axes, rank, "reduce_sum", "axes")?;

        let mut out_dims = Vec::with_capacity(operand_dims.len());
        for (axis, &dim) in operand_dims.iter().enumerate() {
            if axes.contains(&(axis as i64)) {
                if keep_dims {
                    out_dims.push(1);
                }
            } else {
                out_dims.push(dim);
            }
        }
        let ty = Type::ranked(out_dims, self.ty(operand).elem);
        Ok(self.push(ValueKind::ReduceSum { axes, keep_dims }, vec![operand], ty))
    }
}

/// Axes must be in `[0, rank)` and pairwise distinct.
fn check_axis_list(axes: &[i64], rank: i64, op: &str, field: &str) -> Result<()> {
    for (i, &axis) in axes.iter().enumerate() {
        if axis < 0 || axis >= rank {
            return Err(Error::Shape(format!(
                "{op}: {field} axis {axis} out of range for rank {rank}"
            )));
        }
        if axes[..i].contains(&axis) {
            return Err(Error::Shape(format!("{op}: {field} repeats axis {axis}")));
        }
    }
    Ok(())
}

fn check_sorted_axis_list(axes: &[i64], rank: i64, op: &str, field: &str) -> Result<()> {
    check_axis_list(axes, rank, op, field)?;
    if !is_strictly_increasing(axes) {
        return Err(Error::Shape(format!(
            "{op}: {field} must be strictly increasing"
        )));
    }
    Ok(())
}

fn is_strictly_increasing(axes: &[i64]) -> bool {
    axes.windows(2).all(|w| w[0] < w[1])
}

impl fmt::Display for HlirGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, value) in self.values.iter().enumerate() {
            write!(f, "%{id} = ")?;
            match &value.kind {
                ValueKind::Parameter { index } => write!(f, "parameter({index})")?,
                ValueKind::Gather {
                    dims, slice_sizes, ..
                } => write!(
                    f,
                    "gather(%{}, %{}) offset={:?} collapsed={:?} start_map={:?} ivd={} slice_sizes={:?}",
                    value.inputs[0],
                    value.inputs[1],
                    dims.offset_dims,
                    dims.collapsed_slice_dims,
                    dims.start_index_map,
                    dims.index_vector_dim,
                    slice_sizes
                )?,
                ValueKind::BroadcastInDim { broadcast_dims } => write!(
                    f,
                    "broadcast_in_dim(%{}) dims={broadcast_dims:?}",
                    value.inputs[0]
                )?,
                ValueKind::ZerosLike => write!(f, "zeros_like(%{})", value.inputs[0])?,
                ValueKind::ScatterAdd => write!(
                    f,
                    "scatter_add(%{}, %{}, %{})",
                    value.inputs[0], value.inputs[1], value.inputs[2]
                )?,
                ValueKind::ReduceSum { axes, keep_dims } => write!(
                    f,
                    "reduce_sum(%{}) axes={axes:?} keep_dims={keep_dims}",
                    value.inputs[0]
                )?,
            }
            match &value.ty.shape {
                Shape::Ranked(dims) => writeln!(f, " : {:?}{dims:?}", value.ty.elem)?,
                Shape::UnknownRank => writeln!(f, " : {:?}[?]", value.ty.elem)?,
            }
        }
        Ok(())
    }
}
