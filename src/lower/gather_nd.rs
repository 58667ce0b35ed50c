//! Lowering of `gather_nd` and `gather_nd_grad` to IR builder primitives.
//!
//! The general path emits one generalized gather (forward) or a zero-fill
//! followed by a scatter-accumulate (gradient). When the index tensor
//! carries zero index components the operation degenerates: the forward
//! becomes a plain broadcast of the data tensor into the recorded result
//! shape, and the gradient becomes a sum-reduction of the upstream gradient
//! over the broadcasted axes.

use crate::error::{Error, Result};
use crate::ir::builder::{GatherDimensionNumbers, HlirGraph, ValueId};
use crate::ir::types::Type;
use crate::node::OpNode;

pub const GATHER_ND: &str = "gather_nd";
pub const GATHER_ND_GRAD: &str = "gather_nd_grad";

// Attribute names fixed by the source-graph contract.
const EMPTY_INDEX: &str = "gather_nd_with_empty_index";
const RESULT_DIMS: &str = "result_dims";
const GRAD_EMPTY_INDEX: &str = "gather_nd_grad_with_empty_index";
const REDUCE_AXES: &str = "reduce_axes";

/// Forward variant, decoded from the node's attributes once up front.
#[derive(Debug, Clone, PartialEq, Eq)]
enum GatherNdMode {
    General,
    EmptyIndex { result_dims: Vec<i64> },
}

impl GatherNdMode {
    fn from_node(node: &OpNode) -> Result<Self> {
        if node.attr_bool(EMPTY_INDEX)? {
            Ok(GatherNdMode::EmptyIndex {
                result_dims: node.attr_ints(RESULT_DIMS)?.to_vec(),
            })
        } else {
            Ok(GatherNdMode::General)
        }
    }
}

/// Gradient variant.
#[derive(Debug, Clone, PartialEq, Eq)]
enum GatherNdGradMode {
    General,
    EmptyIndex { reduce_axes: Vec<i64> },
}

impl GatherNdGradMode {
    fn from_node(node: &OpNode) -> Result<Self> {
        if node.attr_bool(GRAD_EMPTY_INDEX)? {
            Ok(GatherNdGradMode::EmptyIndex {
                reduce_axes: node.attr_ints(REDUCE_AXES)?.to_vec(),
            })
        } else {
            Ok(GatherNdGradMode::General)
        }
    }
}

/// Derive gather dimension numbers and slice sizes from ranks and the data
/// shape. Pure shape arithmetic; the caller guarantees
/// `index_vector_len <= data rank`.
///
/// The first `index_vector_len` data axes are the indexed ones: each is
/// selected by the matching index-vector component, fully collapsed, and
/// sliced with extent 1. The remaining data axes survive as copied slice
/// axes, placed in the output right after the `indices_rank - 1` batch axes.
pub fn gather_dims(
    data_shape: &[i64],
    indices_rank: usize,
    index_vector_len: i64,
) -> (GatherDimensionNumbers, Vec<i64>) {
    let input_rank = data_shape.len() as i64;
    let start_index_map: Vec<i64> = (0..index_vector_len).collect();
    let collapsed_slice_dims = start_index_map.clone();

    let slices_rank = input_rank - index_vector_len;
    let batch_dims = indices_rank as i64 - 1;
    let offset_dims: Vec<i64> = (batch_dims..batch_dims + slices_rank).collect();

    let mut slice_sizes = vec![1i64; index_vector_len as usize];
    slice_sizes.extend_from_slice(&data_shape[index_vector_len as usize..]);

    let dims = GatherDimensionNumbers {
        offset_dims,
        collapsed_slice_dims,
        start_index_map,
        index_vector_dim: indices_rank as i64 - 1,
    };
    (dims, slice_sizes)
}

/// Lower a `gather_nd` node, returning the handle of its result.
pub fn lower_gather_nd(g: &mut HlirGraph, node: &OpNode) -> Result<ValueId> {
    let data = node.operand("x")?;
    let indices = node.operand("index")?;
    let mode = GatherNdMode::from_node(node)?;

    let data_ty = g.ty(data).clone();
    let data_dims = data_ty
        .shape
        .dims()
        .ok_or_else(|| Error::Shape(format!("{GATHER_ND}: data operand must be ranked")))?
        .to_vec();

    match mode {
        GatherNdMode::EmptyIndex { result_dims } => {
            // Zero index components: every output position sees the whole
            // data tensor, so this is a plain right-aligned broadcast.
            if result_dims.len() < data_dims.len() {
                return Err(Error::Shape(format!(
                    "{GATHER_ND}: result shape rank {} is below data rank {}",
                    result_dims.len(),
                    data_dims.len()
                )));
            }
            let leading = result_dims.len() - data_dims.len();
            let broadcast_dims: Vec<i64> =
                (0..data_dims.len()).map(|i| (leading + i) as i64).collect();
            log::debug!(
                "{GATHER_ND}: empty-index broadcast {data_dims:?} -> {result_dims:?} via {broadcast_dims:?}"
            );
            g.broadcast_in_dim(data, broadcast_dims, Type::ranked(result_dims, data_ty.elem))
        }
        GatherNdMode::General => {
            let index_dims = g
                .ty(indices)
                .shape
                .dims()
                .ok_or_else(|| Error::Shape(format!("{GATHER_ND}: index operand must be ranked")))?
                .to_vec();
            let index_vector_len = *index_dims.last().ok_or_else(|| {
                Error::Shape(format!("{GATHER_ND}: index tensor must have rank >= 1"))
            })?;

            let (dims, slice_sizes) = gather_dims(&data_dims, index_dims.len(), index_vector_len);
            log::debug!(
                "{GATHER_ND}: data {data_dims:?} index {index_dims:?} -> {dims:?} slice_sizes {slice_sizes:?}"
            );
            // Output rank depends on runtime shapes; leave it unresolved.
            let out_ty = Type::unknown_rank(data_ty.elem);
            g.gather(data, indices, dims, slice_sizes, false, out_ty)
        }
    }
}

/// Lower a `gather_nd_grad` node to the gradient of the data operand.
pub fn lower_gather_nd_grad(g: &mut HlirGraph, node: &OpNode) -> Result<ValueId> {
    let data = node.operand("x")?;
    let indices = node.operand("index")?;
    let out_grad = node.operand("out_grad")?;
    let mode = GatherNdGradMode::from_node(node)?;

    match mode {
        GatherNdGradMode::EmptyIndex { reduce_axes } => {
            // Adjoint of the forward broadcast: sum over the broadcasted
            // axes, reduced axes dropped.
            log::debug!("{GATHER_ND_GRAD}: empty-index reduction over {reduce_axes:?}");
            g.reduce_sum(out_grad, false, reduce_axes)
        }
        GatherNdGradMode::General => {
            let zeros = g.zeros_like(data);
            g.scatter_add(zeros, indices, out_grad)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::ValueKind;
    use crate::ir::types::{ElemType, Shape};
    use crate::node::AttrValue;

    fn forward_node(data: ValueId, indices: ValueId) -> OpNode {
        OpNode::new(GATHER_ND)
            .with_operand("x", vec![data])
            .with_operand("index", vec![indices])
            .with_attr(EMPTY_INDEX, AttrValue::Bool(false))
    }

    fn grad_node(data: ValueId, indices: ValueId, out_grad: ValueId) -> OpNode {
        OpNode::new(GATHER_ND_GRAD)
            .with_operand("x", vec![data])
            .with_operand("index", vec![indices])
            .with_operand("out_grad", vec![out_grad])
            .with_attr(GRAD_EMPTY_INDEX, AttrValue::Bool(false))
    }

    // --- Dimension-Number Deriver ---

    #[test]
    fn derives_index_maps_from_vector_length() {
        for r in 1..=5i64 {
            let data_shape: Vec<i64> = (0..r).map(|d| d + 2).collect();
            for k in 1..=r {
                let (dims, slice_sizes) = gather_dims(&data_shape, 3, k);
                let expected: Vec<i64> = (0..k).collect();
                assert_eq!(dims.start_index_map, expected);
                assert_eq!(dims.collapsed_slice_dims, expected);
                assert_eq!(dims.index_vector_dim, 2);
                assert_eq!(dims.offset_dims.len() as i64, r - k);
                assert_eq!(dims.offset_dims.first().copied(), (k < r).then_some(2));
                assert_eq!(slice_sizes.len() as i64, r);
            }
        }
    }

    #[test]
    fn slice_sizes_are_ones_then_data_tail() {
        let (_, slice_sizes) = gather_dims(&[4, 5, 6, 7], 2, 2);
        assert_eq!(slice_sizes, vec![1, 1, 6, 7]);
    }

    #[test]
    fn deriver_is_deterministic() {
        let a = gather_dims(&[4, 5, 6], 2, 1);
        let b = gather_dims(&[4, 5, 6], 2, 1);
        assert_eq!(a, b);
    }

    // --- Forward lowering ---

    #[test]
    fn full_index_gather_collapses_all_data_axes() {
        // data [4,5], indices [3,2]: output is batch-only, shape [3]
        let mut g = HlirGraph::new();
        let data = g.parameter(Type::ranked(vec![4, 5], ElemType::F32));
        let indices = g.parameter(Type::ranked(vec![3, 2], ElemType::I64));
        let out = lower_gather_nd(&mut g, &forward_node(data, indices)).unwrap();

        match &g.value(out).kind {
            ValueKind::Gather {
                dims, slice_sizes, ..
            } => {
                assert_eq!(dims.offset_dims, Vec::<i64>::new());
                assert_eq!(dims.collapsed_slice_dims, vec![0, 1]);
                assert_eq!(dims.start_index_map, vec![0, 1]);
                assert_eq!(dims.index_vector_dim, 1);
                assert_eq!(slice_sizes, &vec![1, 1]);
            }
            other => panic!("expected Gather, got {other:?}"),
        }
        assert_eq!(g.ty(out).shape, Shape::UnknownRank);
        assert_eq!(g.ty(out).elem, ElemType::F32);
    }

    #[test]
    fn partial_index_gather_keeps_trailing_axes() {
        // data [4,5,6], indices [3,1]: offset dims [1,2], slices [1,5,6]
        let mut g = HlirGraph::new();
        let data = g.parameter(Type::ranked(vec![4, 5, 6], ElemType::F32));
        let indices = g.parameter(Type::ranked(vec![3, 1], ElemType::I64));
        let out = lower_gather_nd(&mut g, &forward_node(data, indices)).unwrap();

        match &g.value(out).kind {
            ValueKind::Gather {
                dims,
                slice_sizes,
                indices_are_sorted,
            } => {
                assert_eq!(dims.offset_dims, vec![1, 2]);
                assert_eq!(slice_sizes, &vec![1, 5, 6]);
                assert!(!indices_are_sorted);
            }
            other => panic!("expected Gather, got {other:?}"),
        }
    }

    #[test]
    fn empty_index_forward_is_broadcast() {
        // data [5], target [3,5]: right alignment maps axis 0 -> 1
        let mut g = HlirGraph::new();
        let data = g.parameter(Type::ranked(vec![5], ElemType::F32));
        let indices = g.parameter(Type::ranked(vec![3, 0], ElemType::I64));
        let node = OpNode::new(GATHER_ND)
            .with_operand("x", vec![data])
            .with_operand("index", vec![indices])
            .with_attr(EMPTY_INDEX, AttrValue::Bool(true))
            .with_attr(RESULT_DIMS, AttrValue::Ints(vec![3, 5]));
        let out = lower_gather_nd(&mut g, &node).unwrap();

        match &g.value(out).kind {
            ValueKind::BroadcastInDim { broadcast_dims } => {
                assert_eq!(broadcast_dims, &vec![1]);
            }
            other => panic!("expected BroadcastInDim, got {other:?}"),
        }
        assert_eq!(g.ty(out).shape.dims(), Some(&[3, 5][..]));
    }

    #[test]
    fn empty_index_identity_broadcast_keeps_axes_in_place() {
        // target shape equal to data shape: mapping is the identity
        let mut g = HlirGraph::new();
        let data = g.parameter(Type::ranked(vec![4, 5], ElemType::F32));
        let indices = g.parameter(Type::ranked(vec![0], ElemType::I64));
        let node = OpNode::new(GATHER_ND)
            .with_operand("x", vec![data])
            .with_operand("index", vec![indices])
            .with_attr(EMPTY_INDEX, AttrValue::Bool(true))
            .with_attr(RESULT_DIMS, AttrValue::Ints(vec![4, 5]));
        let out = lower_gather_nd(&mut g, &node).unwrap();
        match &g.value(out).kind {
            ValueKind::BroadcastInDim { broadcast_dims } => {
                assert_eq!(broadcast_dims, &vec![0, 1]);
            }
            other => panic!("expected BroadcastInDim, got {other:?}"),
        }
        assert_eq!(g.ty(out).shape.dims(), Some(&[4, 5][..]));
    }

    #[test]
    fn empty_index_rejects_target_below_data_rank() {
        let mut g = HlirGraph::new();
        let data = g.parameter(Type::ranked(vec![4, 5], ElemType::F32));
        let indices = g.parameter(Type::ranked(vec![0], ElemType::I64));
        let node = OpNode::new(GATHER_ND)
            .with_operand("x", vec![data])
            .with_operand("index", vec![indices])
            .with_attr(EMPTY_INDEX, AttrValue::Bool(true))
            .with_attr(RESULT_DIMS, AttrValue::Ints(vec![5]));
        let err = lower_gather_nd(&mut g, &node).unwrap_err();
        assert!(err.to_string().contains("below data rank"), "got: {err}");
    }

    #[test]
    fn forward_requires_empty_index_flag() {
        let mut g = HlirGraph::new();
        let data = g.parameter(Type::ranked(vec![4, 5], ElemType::F32));
        let indices = g.parameter(Type::ranked(vec![3, 2], ElemType::I64));
        let node = OpNode::new(GATHER_ND)
            .with_operand("x", vec![data])
            .with_operand("index", vec![indices]);
        let err = lower_gather_nd(&mut g, &node).unwrap_err();
        assert!(
            err.to_string().contains(EMPTY_INDEX),
            "got: {err}"
        );
    }

    #[test]
    fn forward_propagates_builder_rejection() {
        // index vector longer than the data rank is refused by the builder
        let mut g = HlirGraph::new();
        let data = g.parameter(Type::ranked(vec![4, 5], ElemType::F32));
        let indices = g.parameter(Type::ranked(vec![3, 3], ElemType::I64));
        let err = lower_gather_nd(&mut g, &forward_node(data, indices)).unwrap_err();
        assert!(err.to_string().contains("exceeds data rank"), "got: {err}");
    }

    // --- Gradient lowering ---

    #[test]
    fn gradient_is_zero_fill_plus_scatter() {
        let mut g = HlirGraph::new();
        let data = g.parameter(Type::ranked(vec![4, 5], ElemType::F32));
        let indices = g.parameter(Type::ranked(vec![3, 2], ElemType::I64));
        let out_grad = g.parameter(Type::ranked(vec![3], ElemType::F32));
        let grad = lower_gather_nd_grad(&mut g, &grad_node(data, indices, out_grad)).unwrap();

        assert!(matches!(g.value(grad).kind, ValueKind::ScatterAdd));
        let zeros = g.value(grad).inputs[0];
        assert!(matches!(g.value(zeros).kind, ValueKind::ZerosLike));
        assert_eq!(g.value(grad).inputs[1], indices);
        assert_eq!(g.value(grad).inputs[2], out_grad);
    }

    #[test]
    fn gradient_shape_matches_data_for_any_valid_pair() {
        let cases: &[(&[i64], &[i64], &[i64])] = &[
            (&[4, 5], &[3, 2], &[3]),
            (&[4, 5, 6], &[3, 1], &[3, 5, 6]),
            (&[2, 3, 4], &[5, 1, 3], &[5, 1]),
            (&[7], &[2, 1], &[2]),
        ];
        for &(data_shape, index_shape, grad_shape) in cases {
            let mut g = HlirGraph::new();
            let data = g.parameter(Type::ranked(data_shape.to_vec(), ElemType::F32));
            let indices = g.parameter(Type::ranked(index_shape.to_vec(), ElemType::I64));
            let out_grad = g.parameter(Type::ranked(grad_shape.to_vec(), ElemType::F32));
            let grad = lower_gather_nd_grad(&mut g, &grad_node(data, indices, out_grad)).unwrap();
            assert_eq!(g.ty(grad), g.ty(data), "data shape {data_shape:?}");
        }
    }

    #[test]
    fn empty_index_gradient_is_reduction() {
        // upstream [3,5] reduced over axis 0 -> [5]
        let mut g = HlirGraph::new();
        let data = g.parameter(Type::ranked(vec![5], ElemType::F32));
        let indices = g.parameter(Type::ranked(vec![0], ElemType::I64));
        let out_grad = g.parameter(Type::ranked(vec![3, 5], ElemType::F32));
        let node = OpNode::new(GATHER_ND_GRAD)
            .with_operand("x", vec![data])
            .with_operand("index", vec![indices])
            .with_operand("out_grad", vec![out_grad])
            .with_attr(GRAD_EMPTY_INDEX, AttrValue::Bool(true))
            .with_attr(REDUCE_AXES, AttrValue::Ints(vec![0]));
        let grad = lower_gather_nd_grad(&mut g, &node).unwrap();

        match &g.value(grad).kind {
            ValueKind::ReduceSum { axes, keep_dims } => {
                assert_eq!(axes, &vec![0]);
                assert!(!keep_dims);
            }
            other => panic!("expected ReduceSum, got {other:?}"),
        }
        assert_eq!(g.ty(grad).shape.dims(), Some(&[5][..]));
    }

    #[test]
    fn gradient_requires_out_grad_operand() {
        let mut g = HlirGraph::new();
        let data = g.parameter(Type::ranked(vec![4, 5], ElemType::F32));
        let indices = g.parameter(Type::ranked(vec![3, 2], ElemType::I64));
        let node = OpNode::new(GATHER_ND_GRAD)
            .with_operand("x", vec![data])
            .with_operand("index", vec![indices])
            .with_attr(GRAD_EMPTY_INDEX, AttrValue::Bool(false));
        let err = lower_gather_nd_grad(&mut g, &node).unwrap_err();
        assert!(err.to_string().contains("out_grad"), "got: {err}");
    }
}
