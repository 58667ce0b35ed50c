//! Tensor kernels backing the reference evaluator.
//!
//! - `naive`: slice-based reference implementations, correct but slow.

pub mod naive;
