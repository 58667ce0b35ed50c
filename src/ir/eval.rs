//! Reference interpreter for lowered graphs.
//!
//! Executes each value with the naive kernels so lowering output can be
//! checked against hand-computed tensors. Supports f32 data and i64 index
//! tensors, which covers every node the built-in lowerings emit. The gather
//! and scatter interpreters only accept the dimension-number pattern those
//! lowerings produce (leading index-mapped axes, all collapsed, trailing
//! index-vector axis); anything else is refused rather than silently
//! misread.

use crate::error::{Error, Result};
use crate::ir::builder::{GatherDimensionNumbers, HlirGraph, ValueId, ValueKind};
use crate::ir::types::Shape;
use crate::kernels::naive;

/// A concrete tensor, row-major.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorValue {
    F32 { shape: Vec<usize>, data: Vec<f32> },
    I64 { shape: Vec<usize>, data: Vec<i64> },
}

impl TensorValue {
    pub fn shape(&self) -> &[usize] {
        match self {
            TensorValue::F32 { shape, .. } => shape,
            TensorValue::I64 { shape, .. } => shape,
        }
    }

    fn as_f32(&self) -> Result<(&[usize], &[f32])> {
        match self {
            TensorValue::F32 { shape, data } => Ok((shape, data)),
            TensorValue::I64 { .. } => {
                Err(Error::Eval("expected an f32 tensor, got i64".into()))
            }
        }
    }

    fn as_i64(&self) -> Result<(&[usize], &[i64])> {
        match self {
            TensorValue::I64 { shape, data } => Ok((shape, data)),
            TensorValue::F32 { .. } => {
                Err(Error::Eval("expected an i64 tensor, got f32".into()))
            }
        }
    }
}

fn element_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

fn usize_dims(shape: &Shape, what: &str) -> Result<Vec<usize>> {
    let dims = shape
        .dims()
        .ok_or_else(|| Error::Eval(format!("{what} has no static shape")))?;
    dims.iter()
        .map(|&d| {
            usize::try_from(d)
                .map_err(|_| Error::Eval(format!("{what} has negative extent {d}")))
        })
        .collect()
}

fn usize_axes(axes: &[i64], what: &str) -> Result<Vec<usize>> {
    axes.iter()
        .map(|&a| {
            usize::try_from(a).map_err(|_| Error::Eval(format!("{what} has negative axis {a}")))
        })
        .collect()
}

/// True when the dimension numbers follow the index-tuple gather pattern the
/// kernels implement.
fn is_nd_pattern(dims: &GatherDimensionNumbers, k: usize, indices_rank: usize) -> bool {
    let expected: Vec<i64> = (0..k as i64).collect();
    dims.start_index_map == expected
        && dims.collapsed_slice_dims == expected
        && dims.index_vector_dim == indices_rank as i64 - 1
        && dims
            .offset_dims
            .first()
            .map_or(true, |&d| d == indices_rank as i64 - 1)
}

impl HlirGraph {
    /// Evaluate every value up to and including `root`, feeding parameter
    /// `i` from `feeds[i]`, and return the root's tensor.
    pub fn evaluate(&self, root: ValueId, feeds: &[TensorValue]) -> Result<TensorValue> {
        if root >= self.len() {
            return Err(Error::Eval(format!("no value %{root} in the graph")));
        }
        let mut computed: Vec<TensorValue> = Vec::with_capacity(root + 1);
        for id in 0..=root {
            let value = self.value(id);
            let result = match &value.kind {
                ValueKind::Parameter { index } => feeds
                    .get(*index)
                    .cloned()
                    .ok_or_else(|| Error::Eval(format!("no feed for parameter {index}")))?,
                ValueKind::Gather {
                    dims, slice_sizes, ..
                } => self.eval_gather(&computed, value.inputs[0], value.inputs[1], dims, slice_sizes)?,
                ValueKind::BroadcastInDim { broadcast_dims } => {
                    let (_, input) = computed[value.inputs[0]].as_f32()?;
                    let in_shape = usize_dims(&self.ty(value.inputs[0]).shape, "broadcast operand")?;
                    let out_shape = usize_dims(&value.ty.shape, "broadcast result")?;
                    let axes = usize_axes(broadcast_dims, "broadcast_dims")?;
                    let mut out = vec![0.0; element_count(&out_shape)];
                    naive::broadcast_in_dim(input, &in_shape, &axes, &mut out, &out_shape);
                    TensorValue::F32 {
                        shape: out_shape,
                        data: out,
                    }
                }
                ValueKind::ZerosLike => {
                    let shape = computed[value.inputs[0]].shape().to_vec();
                    let data = vec![0.0; element_count(&shape)];
                    TensorValue::F32 { shape, data }
                }
                ValueKind::ScatterAdd => {
                    let (base_shape, base) = computed[value.inputs[0]].as_f32()?;
                    let (index_shape, indices) = computed[value.inputs[1]].as_i64()?;
                    let (_, updates) = computed[value.inputs[2]].as_f32()?;
                    let base_shape = base_shape.to_vec();
                    let index_shape = index_shape.to_vec();
                    let mut out = base.to_vec();
                    naive::scatter_nd_add(&mut out, &base_shape, indices, &index_shape, updates);
                    TensorValue::F32 {
                        shape: base_shape,
                        data: out,
                    }
                }
                ValueKind::ReduceSum { axes, keep_dims: _ } => {
                    let (in_shape, input) = computed[value.inputs[0]].as_f32()?;
                    let in_shape = in_shape.to_vec();
                    let axes = usize_axes(axes, "reduce_sum axes")?;
                    let out_shape = usize_dims(&value.ty.shape, "reduce_sum result")?;
                    let mut out = vec![0.0; element_count(&out_shape)];
                    naive::reduce_sum(input, &in_shape, &axes, &mut out);
                    TensorValue::F32 {
                        shape: out_shape,
                        data: out,
                    }
                }
            };
            computed.push(result);
        }
        Ok(computed.pop().unwrap())
    }

    fn eval_gather(
        &self,
        computed: &[TensorValue],
        data_id: ValueId,
        indices_id: ValueId,
        dims: &GatherDimensionNumbers,
        slice_sizes: &[i64],
    ) -> Result<TensorValue> {
        let (data_shape, data) = computed[data_id].as_f32()?;
        let (index_shape, indices) = computed[indices_id].as_i64()?;
        let k = *index_shape
            .last()
            .ok_or_else(|| Error::Eval("gather indices tensor has rank 0".into()))?;
        if !is_nd_pattern(dims, k, index_shape.len()) {
            return Err(Error::Eval(format!(
                "gather dimension numbers {dims:?} are outside the supported pattern"
            )));
        }
        for (axis, &size) in slice_sizes.iter().enumerate() {
            let expected = if axis < k { 1 } else { data_shape[axis] as i64 };
            if size != expected {
                return Err(Error::Eval(format!(
                    "gather slice size {size} on axis {axis} is outside the supported pattern"
                )));
            }
        }

        let mut out_shape: Vec<usize> = index_shape[..index_shape.len() - 1].to_vec();
        out_shape.extend_from_slice(&data_shape[k..]);
        let mut out = vec![0.0; element_count(&out_shape)];
        naive::gather_nd(data, data_shape, indices, index_shape, &mut out);
        Ok(TensorValue::F32 {
            shape: out_shape,
            data: out,
        })
    }
}
