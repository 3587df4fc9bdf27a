//! Process-wide backend policy
//!
//! The policy is read on every dispatch, so it lives in an atomic cell
//! rather than behind a lock. Writers publish with `Release`, readers
//! observe with `Acquire`.

use crate::error::{DispatchError, Result};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

/// Global steering of the selection heuristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum BackendPolicy {
    /// Size and capability driven heuristic
    #[default]
    Default = 0,
    /// Force matrix multiplications through OpenBLAS
    OpenBlas = 1,
    /// Force matrix multiplications through a generic BLAS
    Blas = 2,
    /// Run everything on a CUDA device
    Cuda = 3,
}

impl BackendPolicy {
    pub const fn name(self) -> &'static str {
        match self {
            BackendPolicy::Default => "default",
            BackendPolicy::OpenBlas => "openblas",
            BackendPolicy::Blas => "blas",
            BackendPolicy::Cuda => "cuda",
        }
    }
}

impl TryFrom<u8> for BackendPolicy {
    type Error = DispatchError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(BackendPolicy::Default),
            1 => Ok(BackendPolicy::OpenBlas),
            2 => Ok(BackendPolicy::Blas),
            3 => Ok(BackendPolicy::Cuda),
            other => Err(DispatchError::configuration(format!("invalid backend policy value {other}"))),
        }
    }
}

impl FromStr for BackendPolicy {
    type Err = DispatchError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "default" | "auto" => Ok(BackendPolicy::Default),
            "openblas" => Ok(BackendPolicy::OpenBlas),
            "blas" => Ok(BackendPolicy::Blas),
            "cuda" | "gpu" => Ok(BackendPolicy::Cuda),
            other => Err(DispatchError::configuration(format!("unknown backend policy '{other}'"))),
        }
    }
}

impl fmt::Display for BackendPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the CUDA policy does when no CUDA device exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum CudaFallback {
    /// Fail the dispatch with `DeviceNotFound`
    #[default]
    Error = 0,
    /// Fall back to the default CPU heuristic
    Cpu = 1,
}

impl CudaFallback {
    fn from_raw(value: u8) -> Self {
        if value == CudaFallback::Cpu as u8 {
            CudaFallback::Cpu
        } else {
            CudaFallback::Error
        }
    }
}

impl FromStr for CudaFallback {
    type Err = DispatchError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "error" | "strict" => Ok(CudaFallback::Error),
            "cpu" => Ok(CudaFallback::Cpu),
            other => Err(DispatchError::configuration(format!("unknown cuda fallback '{other}'"))),
        }
    }
}

impl fmt::Display for CudaFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CudaFallback::Error => f.write_str("error"),
            CudaFallback::Cpu => f.write_str("cpu"),
        }
    }
}

/// Atomic cell holding the active policy and CUDA fallback mode
#[derive(Debug, Default)]
pub struct PolicyStore {
    policy: AtomicU8,
    cuda_fallback: AtomicU8,
}

impl PolicyStore {
    pub fn new(policy: BackendPolicy, cuda_fallback: CudaFallback) -> Self {
        Self {
            policy: AtomicU8::new(policy as u8),
            cuda_fallback: AtomicU8::new(cuda_fallback as u8),
        }
    }

    pub fn policy(&self) -> BackendPolicy {
        // Only valid discriminants are ever stored.
        BackendPolicy::try_from(self.policy.load(Ordering::Acquire)).unwrap_or_default()
    }

    /// Replace the active policy. Later selections observe the new value.
    pub fn set_policy(&self, policy: BackendPolicy) {
        let previous = self.policy.swap(policy as u8, Ordering::Release);
        if previous != policy as u8 {
            tracing::debug!(policy = policy.name(), previous, "backend_policy_changed");
        }
    }

    pub fn cuda_fallback(&self) -> CudaFallback {
        CudaFallback::from_raw(self.cuda_fallback.load(Ordering::Acquire))
    }

    pub fn set_cuda_fallback(&self, mode: CudaFallback) {
        let previous = self.cuda_fallback.swap(mode as u8, Ordering::Release);
        if previous != mode as u8 {
            tracing::debug!(fallback = %mode, "cuda_fallback_changed");
        }
    }

    /// Restore `Default` policy and strict CUDA fallback
    pub fn reset(&self) {
        self.set_policy(BackendPolicy::Default);
        self.set_cuda_fallback(CudaFallback::Error);
    }
}
