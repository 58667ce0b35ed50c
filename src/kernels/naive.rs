//! Naive reference implementations - correct but slow.
//!
//! All tensors are flat row-major `f32` slices with explicit shapes; index
//! tensors are `i64`. Callers guarantee shape compatibility and in-range
//! indices; these kernels only do the arithmetic.

/// Row-major strides for a shape.
pub fn strides(shape: &[usize]) -> Vec<usize> {
    let mut out = vec![1; shape.len()];
    for d in (0..shape.len().saturating_sub(1)).rev() {
        out[d] = out[d + 1] * shape[d + 1];
    }
    out
}

/// N-D gather by index tuple.
///
/// - `data`:    shape `D[0..r]`
/// - `indices`: shape `I[0..q]`, last axis holds a k-component index vector
/// - `output`:  shape `I[0..q-1] ++ D[k..r]`
///
/// Each index vector selects a slice over the trailing `r - k` data axes;
/// those axes are innermost, so every gathered slice is one contiguous block.
pub fn gather_nd(
    data: &[f32],
    data_shape: &[usize],
    indices: &[i64],
    indices_shape: &[usize],
    output: &mut [f32],
) {
    let k = *indices_shape.last().unwrap();
    let batch: usize = indices_shape[..indices_shape.len() - 1].iter().product();
    let tail: usize = data_shape[k..].iter().product();
    let data_strides = strides(data_shape);

    for b in 0..batch {
        let vector = &indices[b * k..(b + 1) * k];
        let mut offset = 0;
        for (j, &idx) in vector.iter().enumerate() {
            offset += idx as usize * data_strides[j];
        }
        output[b * tail..(b + 1) * tail].copy_from_slice(&data[offset..offset + tail]);
    }
}

/// Scatter-accumulate: the inverse of `gather_nd`.
///
/// - `base`:    shape `D[0..r]`, accumulated into in place
/// - `indices`: shape `I[0..q]`, last axis holds a k-component index vector
/// - `updates`: shape `I[0..q-1] ++ D[k..r]`
///
/// Repeated index vectors sum their contributions.
pub fn scatter_nd_add(
    base: &mut [f32],
    base_shape: &[usize],
    indices: &[i64],
    indices_shape: &[usize],
    updates: &[f32],
) {
    let k = *indices_shape.last().unwrap();
    let batch: usize = indices_shape[..indices_shape.len() - 1].iter().product();
    let tail: usize = base_shape[k..].iter().product();
    let base_strides = strides(base_shape);

    for b in 0..batch {
        let vector = &indices[b * k..(b + 1) * k];
        let mut offset = 0;
        for (j, &idx) in vector.iter().enumerate() {
            offset += idx as usize * base_strides[j];
        }
        for t in 0..tail {
            base[offset + t] += updates[b * tail + t];
        }
    }
}

/// Broadcast into a larger shape.
///
/// `broadcast_dims[d]` is the output axis that input axis `d` maps onto;
/// size-1 input axes replicate along their mapped output axis.
pub fn broadcast_in_dim(
    input: &[f32],
    input_shape: &[usize],
    broadcast_dims: &[usize],
    output: &mut [f32],
    output_shape: &[usize],
) {
    let in_strides = strides(input_shape);
    let out_strides = strides(output_shape);
    let total: usize = output_shape.iter().product();

    for flat in 0..total {
        let mut in_offset = 0;
        for (d, &out_axis) in broadcast_dims.iter().enumerate() {
            let coord = (flat / out_strides[out_axis]) % output_shape[out_axis];
            if input_shape[d] != 1 {
                in_offset += coord * in_strides[d];
            }
        }
        output[flat] = input[in_offset];
    }
}

/// Sum-reduction over `axes` (dropped from the output shape).
///
/// - `output`: shape = `input_shape` with every axis in `axes` removed,
///   zeroed and accumulated into.
pub fn reduce_sum(input: &[f32], input_shape: &[usize], axes: &[usize], output: &mut [f32]) {
    let in_strides = strides(input_shape);
    let kept: Vec<usize> = (0..input_shape.len())
        .filter(|d| !axes.contains(d))
        .collect();
    let out_shape: Vec<usize> = kept.iter().map(|&d| input_shape[d]).collect();
    let out_strides = strides(&out_shape);

    for v in output.iter_mut() {
        *v = 0.0;
    }
    let total: usize = input_shape.iter().product();
    for flat in 0..total {
        let mut out_offset = 0;
        for (i, &d) in kept.iter().enumerate() {
            let coord = (flat / in_strides[d]) % input_shape[d];
            out_offset += coord * out_strides[i];
        }
        output[out_offset] += input[flat];
    }
}
