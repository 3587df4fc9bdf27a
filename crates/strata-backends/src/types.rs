//! Core value types shared by the selector, the profiler and the runtime

use crate::error::{DispatchError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Element type of an operand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    F32,
    F64,
    I32,
    I64,
    Bool,
}

impl DType {
    /// Width of one element in bytes
    pub const fn size_bytes(self) -> u32 {
        match self {
            DType::F32 | DType::I32 => 4,
            DType::F64 | DType::I64 => 8,
            DType::Bool => 1,
        }
    }
}

/// Coarse operation class used by the selection heuristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// add, mul, relu, ... (memory bound)
    Elementwise,
    /// sum, mean, all, any, ...
    Reduction,
    /// 2-D matrix multiplication
    MatMul,
    /// Matrix multiplication over a leading batch dimension
    BatchedMatMul,
    /// Vector dot product
    Dot,
    /// Tensor construction (placement decision only)
    Creation,
}

impl OperationKind {
    /// True for the kinds a vendor BLAS can take over
    pub const fn is_matrix_multiply(self) -> bool {
        matches!(self, OperationKind::MatMul | OperationKind::BatchedMatMul)
    }

    pub const fn name(self) -> &'static str {
        match self {
            OperationKind::Elementwise => "elementwise",
            OperationKind::Reduction => "reduction",
            OperationKind::MatMul => "matmul",
            OperationKind::BatchedMatMul => "batched_matmul",
            OperationKind::Dot => "dot",
            OperationKind::Creation => "creation",
        }
    }
}

/// Execution target a tensor lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendType {
    #[serde(rename = "CPU")]
    Cpu,
    #[serde(rename = "GPU")]
    Gpu,
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendType::Cpu => f.write_str("CPU"),
            BackendType::Gpu => f.write_str("GPU"),
        }
    }
}

impl FromStr for BackendType {
    type Err = DispatchError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(BackendType::Cpu),
            "gpu" | "cuda" => Ok(BackendType::Gpu),
            other => Err(DispatchError::configuration(format!("unknown backend '{other}'"))),
        }
    }
}

/// Concrete kernel implementation chosen inside a backend
///
/// This is what the kernel layer is keyed on and what profiles report as
/// `primary_backend`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KernelPath {
    /// Portable scalar loops
    #[serde(rename = "CPU")]
    Scalar,
    /// Vectorized CPU kernels (AVX2/AVX-512/NEON)
    #[serde(rename = "CPU-SIMD")]
    Simd,
    /// OpenBLAS vendor library
    #[serde(rename = "OpenBLAS")]
    OpenBlas,
    /// Generic CBLAS vendor library
    #[serde(rename = "BLAS")]
    Blas,
    /// CUDA device kernels
    #[serde(rename = "CUDA")]
    Cuda,
}

impl KernelPath {
    /// Backend the path executes on
    pub const fn backend(self) -> BackendType {
        match self {
            KernelPath::Cuda => BackendType::Gpu,
            _ => BackendType::Cpu,
        }
    }

    /// True when the path goes through a vendor math library
    pub const fn is_vendor_math(self) -> bool {
        matches!(self, KernelPath::OpenBlas | KernelPath::Blas)
    }

    /// Label used in reports and explanations
    pub const fn label(self) -> &'static str {
        match self {
            KernelPath::Scalar => "CPU",
            KernelPath::Simd => "CPU-SIMD",
            KernelPath::OpenBlas => "OpenBLAS",
            KernelPath::Blas => "BLAS",
            KernelPath::Cuda => "CUDA",
        }
    }
}

impl fmt::Display for KernelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Normalized description of an operation's operands
///
/// `element_count` always equals the product of `shape` (1 for a scalar).
/// For matrix multiplications `shape` is the output shape and the contracted
/// dimension is kept alongside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationProperties {
    element_count: u64,
    shape: Vec<u32>,
    dtype_bytes: u32,
    contraction: Option<u32>,
}

impl OperationProperties {
    /// Describe an operand of the given shape and element type
    ///
    /// Fails when the element count does not fit in a `u64`.
    pub fn new(shape: impl Into<Vec<u32>>, dtype: DType) -> Result<Self> {
        let shape = shape.into();
        let element_count = shape
            .iter()
            .try_fold(1u64, |acc, &dim| acc.checked_mul(u64::from(dim)))
            .ok_or_else(|| DispatchError::configuration(format!("shape {shape:?} overflows element count")))?;

        Ok(Self {
            element_count,
            shape,
            dtype_bytes: dtype.size_bytes(),
            contraction: None,
        })
    }

    /// Describe `[m, k] x [k, n]`; the shape is the `[m, n]` output
    pub fn for_matmul(m: u32, k: u32, n: u32, dtype: DType) -> Result<Self> {
        let mut props = Self::new(vec![m, n], dtype)?;
        props.contraction = Some(k);
        Ok(props)
    }

    /// Describe `[b, m, k] x [b, k, n]`; the shape is the `[b, m, n]` output
    pub fn for_batched_matmul(batch: u32, m: u32, k: u32, n: u32, dtype: DType) -> Result<Self> {
        let mut props = Self::new(vec![batch, m, n], dtype)?;
        props.contraction = Some(k);
        Ok(props)
    }

    pub fn element_count(&self) -> u64 {
        self.element_count
    }

    pub fn shape(&self) -> &[u32] {
        &self.shape
    }

    pub fn dtype_bytes(&self) -> u32 {
        self.dtype_bytes
    }

    /// Total operand footprint in bytes
    pub fn size_bytes(&self) -> u64 {
        self.element_count.saturating_mul(u64::from(self.dtype_bytes))
    }

    /// `(m, k, n)` for matrix multiplications
    pub fn matmul_dims(&self) -> Option<(u32, u32, u32)> {
        let k = self.contraction?;
        match self.shape.as_slice() {
            [.., m, n] => Some((*m, k, *n)),
            _ => None,
        }
    }

    /// Largest extent over the output shape and the contracted dimension
    pub fn largest_dim(&self) -> u32 {
        self.shape
            .iter()
            .copied()
            .chain(self.contraction)
            .max()
            .unwrap_or(1)
    }

    /// Short size description used in explanations (`MxKxN` or `N elements`)
    pub fn describe(&self) -> String {
        match self.matmul_dims() {
            Some((m, k, n)) => format!("size={m}x{k}x{n}"),
            None => format!("elements={}", self.element_count),
        }
    }
}
