//! Tensor operations on the global runtime
//!
//! Each function selects a backend through [`Runtime::global`], runs the
//! [`ReferenceKernels`] and is profiled under its own name.
//!
//! ```rust
//! use strata_core::{ops, Tensor};
//!
//! let a = Tensor::from_vec(vec![1.0, 2.0, 3.0]);
//! let b = Tensor::from_vec(vec![4.0, 5.0, 6.0]);
//! let c = ops::add(&a, &b)?;
//! assert_eq!(c.data(), &[5.0, 7.0, 9.0]);
//! assert_eq!(ops::dot(&a, &b)?.data(), &[32.0]);
//! # Ok::<(), strata_core::Error>(())
//! ```

use crate::error::Result;
use crate::kernel::ReferenceKernels;
use crate::runtime::Runtime;
use crate::tensor::Tensor;
use strata_backends::{BackendType, OperationKind};

fn run(op: &str, kind: OperationKind, inputs: &[&Tensor]) -> Result<Tensor> {
    Runtime::global().execute(op, kind, inputs, &ReferenceKernels)
}

// Elementwise

pub fn add(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    run("add", OperationKind::Elementwise, &[a, b])
}

pub fn sub(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    run("sub", OperationKind::Elementwise, &[a, b])
}

pub fn mul(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    run("mul", OperationKind::Elementwise, &[a, b])
}

pub fn div(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    run("div", OperationKind::Elementwise, &[a, b])
}

pub fn neg(a: &Tensor) -> Result<Tensor> {
    run("neg", OperationKind::Elementwise, &[a])
}

/// `max(x, 0)`
pub fn relu(a: &Tensor) -> Result<Tensor> {
    run("relu", OperationKind::Elementwise, &[a])
}

pub fn exp(a: &Tensor) -> Result<Tensor> {
    run("exp", OperationKind::Elementwise, &[a])
}

// Reductions

/// Sum of all elements as a rank-0 tensor
pub fn sum(a: &Tensor) -> Result<Tensor> {
    run("sum", OperationKind::Reduction, &[a])
}

pub fn mean(a: &Tensor) -> Result<Tensor> {
    run("mean", OperationKind::Reduction, &[a])
}

// Linear algebra

/// Inner product of two equal-length vectors
pub fn dot(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    run("dot", OperationKind::Dot, &[a, b])
}

/// `[m, k] x [k, n] -> [m, n]`
pub fn matmul(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    run("matmul", OperationKind::MatMul, &[a, b])
}

/// `[b, m, k] x [b, k, n] -> [b, m, n]`
pub fn bmm(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    run("bmm", OperationKind::BatchedMatMul, &[a, b])
}

// Creation

/// Zero-filled tensor; `requested` pins the placement
pub fn zeros(shape: Vec<usize>, requested: Option<BackendType>) -> Result<Tensor> {
    Runtime::global().zeros(shape, requested)
}
