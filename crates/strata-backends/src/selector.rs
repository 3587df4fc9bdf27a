//! Per-operation backend selection
//!
//! [`BackendSelector::select`] is a pure function of its inputs: the same
//! operation, properties, devices and policy always yield the same
//! [`Selection`]. It performs no I/O and takes no locks; the caller reads
//! the policy once and passes it in.
//!
//! Decision order:
//!
//! 1. An explicit, available backend request wins. The kernel path inside
//!    that backend still follows the policy.
//! 2. `Cuda` policy: GPU when a device exists, otherwise the configured
//!    [`CudaFallback`].
//! 3. `OpenBlas` / `Blas` policy: matrix multiplications go to the vendor
//!    library, everything else uses the default heuristic.
//! 4. `Default` policy: small tensors stay scalar, large matmuls use a
//!    linked BLAS, very large workloads move to CUDA, the rest runs SIMD.

use crate::device::{BlasVendor, DeviceInfo};
use crate::error::{BackendError, DispatchError, Result};
use crate::policy::{BackendPolicy, CudaFallback};
use crate::types::{BackendType, KernelPath, OperationKind, OperationProperties};
use serde::{Deserialize, Serialize};
use strata_tracing::performance::record_selection;

/// Thresholds of the default heuristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Below this many elements dispatch overhead dominates; stay scalar
    pub small_tensor_elements: u64,
    /// A matmul with any dimension above this goes to a linked BLAS
    pub blas_min_dim: u32,
    /// From this many elements on, offload to CUDA when present
    pub gpu_offload_elements: u64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            small_tensor_elements: 16,
            blas_min_dim: 256,
            gpu_offload_elements: 1 << 20,
        }
    }
}

/// Outcome of a selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub backend: BackendType,
    pub path: KernelPath,
    /// Human readable rationale
    pub reason: String,
}

impl Selection {
    fn new(path: KernelPath, reason: impl Into<String>) -> Self {
        Self {
            backend: path.backend(),
            path,
            reason: reason.into(),
        }
    }
}

/// Chooses where each operation runs
#[derive(Debug, Clone, Copy, Default)]
pub struct BackendSelector {
    config: SelectorConfig,
}

impl BackendSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Pick the backend and kernel path for one operation
    ///
    /// # Errors
    ///
    /// * `DeviceNotFound` when `requested` names a backend without a device
    /// * `DeviceNotFound` for the `Cuda` policy without a device and strict
    ///   fallback
    pub fn select(
        &self,
        kind: OperationKind,
        props: &OperationProperties,
        devices: &DeviceInfo,
        requested: Option<BackendType>,
        policy: BackendPolicy,
        fallback: CudaFallback,
    ) -> Result<Selection> {
        let selection = match requested {
            Some(backend) => self.select_requested(kind, props, devices, backend, policy)?,
            None => self.select_by_policy(kind, props, devices, policy, fallback)?,
        };

        record_selection(kind.name(), selection.path.label(), policy.name(), props.element_count());
        Ok(selection)
    }

    fn select_requested(
        &self,
        kind: OperationKind,
        props: &OperationProperties,
        devices: &DeviceInfo,
        backend: BackendType,
        policy: BackendPolicy,
    ) -> Result<Selection> {
        if !devices.is_available(backend) {
            return Err(DispatchError::DeviceNotFound { backend });
        }

        Ok(match backend {
            BackendType::Gpu => Selection::new(KernelPath::Cuda, "explicit GPU request"),
            BackendType::Cpu => {
                let (path, why) = self.cpu_path(kind, props, devices, policy);
                Selection::new(path, format!("explicit CPU request, {why}"))
            }
        })
    }

    fn select_by_policy(
        &self,
        kind: OperationKind,
        props: &OperationProperties,
        devices: &DeviceInfo,
        policy: BackendPolicy,
        fallback: CudaFallback,
    ) -> Result<Selection> {
        match policy {
            BackendPolicy::Cuda if devices.has_cuda() => Ok(Selection::new(KernelPath::Cuda, "cuda policy")),
            BackendPolicy::Cuda => match fallback {
                CudaFallback::Error => Err(DispatchError::DeviceNotFound {
                    backend: BackendType::Gpu,
                }),
                CudaFallback::Cpu => {
                    let selection = self.default_heuristic(kind, props, devices);
                    Ok(Selection::new(
                        selection.path,
                        format!("cuda policy without device, cpu fallback: {}", selection.reason),
                    ))
                }
            },
            BackendPolicy::OpenBlas | BackendPolicy::Blas if kind.is_matrix_multiply() => {
                let (path, why) = self.forced_vendor_path(devices, policy);
                Ok(Selection::new(path, why))
            }
            BackendPolicy::OpenBlas | BackendPolicy::Blas | BackendPolicy::Default => {
                Ok(self.default_heuristic(kind, props, devices))
            }
        }
    }

    fn default_heuristic(&self, kind: OperationKind, props: &OperationProperties, devices: &DeviceInfo) -> Selection {
        let elements = props.element_count();

        if elements < self.config.small_tensor_elements {
            return Selection::new(
                KernelPath::Scalar,
                format!("small tensor ({elements} < {} elements)", self.config.small_tensor_elements),
            );
        }

        if let Some(selection) = self.large_matmul_on_blas(kind, props, devices) {
            return selection;
        }

        if kind != OperationKind::Creation && elements >= self.config.gpu_offload_elements && devices.has_cuda() {
            return Selection::new(
                KernelPath::Cuda,
                format!("large workload ({elements} >= {} elements)", self.config.gpu_offload_elements),
            );
        }

        let (path, why) = native_cpu_path(devices);
        Selection::new(path, why)
    }

    fn large_matmul_on_blas(
        &self,
        kind: OperationKind,
        props: &OperationProperties,
        devices: &DeviceInfo,
    ) -> Option<Selection> {
        if !kind.is_matrix_multiply() {
            return None;
        }
        let vendor = devices.blas()?;
        let largest = props.largest_dim();
        (largest > self.config.blas_min_dim).then(|| {
            Selection::new(
                vendor.path(),
                format!("matmul dimension {largest} > {}", self.config.blas_min_dim),
            )
        })
    }

    /// CPU path for an explicit CPU request: the policy still picks the kernels
    fn cpu_path(
        &self,
        kind: OperationKind,
        props: &OperationProperties,
        devices: &DeviceInfo,
        policy: BackendPolicy,
    ) -> (KernelPath, String) {
        if kind.is_matrix_multiply() && matches!(policy, BackendPolicy::OpenBlas | BackendPolicy::Blas) {
            return self.forced_vendor_path(devices, policy);
        }

        if props.element_count() < self.config.small_tensor_elements {
            return (KernelPath::Scalar, "small tensor".to_string());
        }

        match self.large_matmul_on_blas(kind, props, devices) {
            Some(selection) => (selection.path, selection.reason),
            None => native_cpu_path(devices),
        }
    }

    /// `OpenBlas` wants OpenBLAS itself; `Blas` accepts any linked CBLAS
    fn forced_vendor_path(&self, devices: &DeviceInfo, policy: BackendPolicy) -> (KernelPath, String) {
        let path = match (policy, devices.blas()) {
            (BackendPolicy::OpenBlas, Some(BlasVendor::OpenBlas)) => Some(KernelPath::OpenBlas),
            (BackendPolicy::Blas, Some(_)) => Some(KernelPath::Blas),
            _ => None,
        };

        match path {
            Some(path) => (path, format!("{policy} policy forces vendor math for matmul")),
            None => {
                let (native, why) = native_cpu_path(devices);
                (native, format!("{policy} policy but no vendor BLAS linked, native {why}"))
            }
        }
    }
}

fn native_cpu_path(devices: &DeviceInfo) -> (KernelPath, String) {
    if devices.cpu().has_vector_units() {
        (KernelPath::Simd, "vectorized kernels".to_string())
    } else {
        (KernelPath::Scalar, "scalar kernels".to_string())
    }
}

/// Placement shared by both operands of a binary operation
///
/// # Errors
///
/// `BackendError::Mismatch` when the operands live on different backends.
pub fn check_operands(lhs: BackendType, rhs: BackendType) -> Result<BackendType> {
    if lhs == rhs {
        Ok(lhs)
    } else {
        Err(BackendError::Mismatch { lhs, rhs }.into())
    }
}
