//! Boundary to the numeric kernel layer
//!
//! The runtime never computes anything itself. It picks a [`KernelPath`]
//! and hands the inputs to a [`Kernel`], keyed by operation name and path.

use crate::error::{Error, Result};
use crate::tensor::Tensor;
use strata_backends::{BackendError, BackendType, KernelPath};

/// Executes one named operation on a chosen kernel path
pub trait Kernel: Send + Sync {
    /// Run `op` over `inputs` and return the flat row-major output
    fn launch(&self, op: &str, path: KernelPath, inputs: &[&Tensor]) -> Result<Vec<f32>>;
}

impl<F> Kernel for F
where
    F: Fn(&str, KernelPath, &[&Tensor]) -> Result<Vec<f32>> + Send + Sync,
{
    fn launch(&self, op: &str, path: KernelPath, inputs: &[&Tensor]) -> Result<Vec<f32>> {
        self(op, path, inputs)
    }
}

/// Portable reference kernels
///
/// Every CPU path (scalar, SIMD, vendor BLAS) runs the same loops here;
/// the CUDA path is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceKernels;

impl Kernel for ReferenceKernels {
    fn launch(&self, op: &str, path: KernelPath, inputs: &[&Tensor]) -> Result<Vec<f32>> {
        if path.backend() == BackendType::Gpu {
            return Err(BackendError::unsupported(op, BackendType::Gpu).into());
        }

        match (op, inputs) {
            ("add", [a, b]) => Ok(zip_with(a, b, |x, y| x + y)),
            ("sub", [a, b]) => Ok(zip_with(a, b, |x, y| x - y)),
            ("mul", [a, b]) => Ok(zip_with(a, b, |x, y| x * y)),
            ("div", [a, b]) => Ok(zip_with(a, b, |x, y| x / y)),
            ("neg", [a]) => Ok(a.data().iter().map(|x| -x).collect()),
            ("relu", [a]) => Ok(a.data().iter().map(|x| x.max(0.0)).collect()),
            ("exp", [a]) => Ok(a.data().iter().map(|x| x.exp()).collect()),
            ("sum", [a]) => Ok(vec![a.data().iter().sum()]),
            ("mean", [a]) => {
                let n = a.numel().max(1) as f32;
                Ok(vec![a.data().iter().sum::<f32>() / n])
            }
            ("dot", [a, b]) => Ok(vec![a.data().iter().zip(b.data()).map(|(x, y)| x * y).sum()]),
            ("matmul", [a, b]) => matmul(a, b),
            ("bmm", [a, b]) => batched_matmul(a, b),
            (other, inputs) => Err(Error::kernel(format!(
                "no reference kernel for '{other}' with {} inputs",
                inputs.len()
            ))),
        }
    }
}

fn zip_with(a: &Tensor, b: &Tensor, f: impl Fn(f32, f32) -> f32) -> Vec<f32> {
    a.data().iter().zip(b.data()).map(|(&x, &y)| f(x, y)).collect()
}

fn gemm(lhs: &[f32], rhs: &[f32], out: &mut [f32], m: usize, k: usize, n: usize) {
    for i in 0..m {
        for p in 0..k {
            let a = lhs[i * k + p];
            for j in 0..n {
                out[i * n + j] += a * rhs[p * n + j];
            }
        }
    }
}

fn matmul(a: &Tensor, b: &Tensor) -> Result<Vec<f32>> {
    let (&[m, k], &[k2, n]) = (a.shape(), b.shape()) else {
        return Err(Error::invalid_shape("matmul expects two matrices"));
    };
    if k != k2 {
        return Err(Error::invalid_shape(format!("matmul inner dimensions {k} and {k2} differ")));
    }
    let mut out = vec![0.0; m * n];
    gemm(a.data(), b.data(), &mut out, m, k, n);
    Ok(out)
}

fn batched_matmul(a: &Tensor, b: &Tensor) -> Result<Vec<f32>> {
    let (&[batch, m, k], &[batch2, k2, n]) = (a.shape(), b.shape()) else {
        return Err(Error::invalid_shape("bmm expects two rank-3 tensors"));
    };
    if batch != batch2 || k != k2 {
        return Err(Error::invalid_shape(format!(
            "bmm shapes [{batch}, {m}, {k}] and [{batch2}, {k2}, {n}] are incompatible"
        )));
    }
    let mut out = vec![0.0; batch * m * n];
    for i in 0..batch {
        gemm(
            &a.data()[i * m * k..(i + 1) * m * k],
            &b.data()[i * k * n..(i + 1) * k * n],
            &mut out[i * m * n..(i + 1) * m * n],
            m,
            k,
            n,
        );
    }
    Ok(out)
}
