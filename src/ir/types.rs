//! Value types carried by IR nodes: element type plus (possibly unranked) shape.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElemType {
    F32,
    F64,
    I32,
    I64,
    Bool,
}

impl ElemType {
    pub fn is_integer(self) -> bool {
        matches!(self, ElemType::I32 | ElemType::I64)
    }
}

/// Static shape of a value. Dimensions are `i64` and non-negative.
///
/// `UnknownRank` marks values whose rank is not statically pinned — the
/// generalized gather produces one, since its output rank depends on the
/// dimension numbers and only the backend needs to resolve it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shape {
    Ranked(Vec<i64>),
    UnknownRank,
}

impl Shape {
    pub fn rank(&self) -> Option<usize> {
        match self {
            Shape::Ranked(dims) => Some(dims.len()),
            Shape::UnknownRank => None,
        }
    }

    pub fn dims(&self) -> Option<&[i64]> {
        match self {
            Shape::Ranked(dims) => Some(dims),
            Shape::UnknownRank => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Type {
    pub shape: Shape,
    pub elem: ElemType,
}

impl Type {
    pub fn ranked(dims: Vec<i64>, elem: ElemType) -> Self {
        Self {
            shape: Shape::Ranked(dims),
            elem,
        }
    }

    pub fn unknown_rank(elem: ElemType) -> Self {
        Self {
            shape: Shape::UnknownRank,
            elem,
        }
    }

    pub fn scalar(elem: ElemType) -> Self {
        Self::ranked(vec![], elem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranked_shape_reports_rank_and_dims() {
        let ty = Type::ranked(vec![4, 5], ElemType::F32);
        assert_eq!(ty.shape.rank(), Some(2));
        assert_eq!(ty.shape.dims(), Some(&[4, 5][..]));
    }

    #[test]
    fn unknown_rank_has_no_dims() {
        let ty = Type::unknown_rank(ElemType::F32);
        assert_eq!(ty.shape.rank(), None);
        assert_eq!(ty.shape.dims(), None);
    }

    #[test]
    fn integer_elem_types() {
        assert!(ElemType::I32.is_integer());
        assert!(ElemType::I64.is_integer());
        assert!(!ElemType::F32.is_integer());
        assert!(!ElemType::Bool.is_integer());
    }
}
