//! Host device capabilities
//!
//! Enumeration itself belongs to the kernel layer; this module only keeps
//! the capability flags the selector needs. The probe runs once per process
//! and the result is shared by reference.

use crate::types::{BackendType, KernelPath};
use std::fmt;
use std::sync::OnceLock;

/// Vendor math library linked into the kernel layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlasVendor {
    OpenBlas,
    Generic,
}

impl BlasVendor {
    /// Kernel path that routes through this library
    pub const fn path(self) -> KernelPath {
        match self {
            BlasVendor::OpenBlas => KernelPath::OpenBlas,
            BlasVendor::Generic => KernelPath::Blas,
        }
    }
}

/// Vector instruction support and parallelism of the host CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuCapabilities {
    pub avx2: bool,
    pub avx512f: bool,
    pub fma: bool,
    pub neon: bool,
    pub logical_cores: usize,
}

impl CpuCapabilities {
    /// Probe the running CPU
    pub fn detect() -> Self {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        let (avx2, avx512f, fma) = (
            std::arch::is_x86_feature_detected!("avx2"),
            std::arch::is_x86_feature_detected!("avx512f"),
            std::arch::is_x86_feature_detected!("fma"),
        );
        #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
        let (avx2, avx512f, fma) = (false, false, false);

        Self {
            avx2,
            avx512f,
            fma,
            neon: cfg!(target_arch = "aarch64"),
            logical_cores: num_cpus::get().max(1),
        }
    }

    /// Capabilities of a CPU without any vector extension
    pub const fn scalar(logical_cores: usize) -> Self {
        Self {
            avx2: false,
            avx512f: false,
            fma: false,
            neon: false,
            logical_cores,
        }
    }

    /// True when SIMD kernels can run
    pub const fn has_vector_units(&self) -> bool {
        self.avx2 || self.avx512f || self.neon
    }
}

/// Capability snapshot of every execution target on this host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    cpu: CpuCapabilities,
    blas: Option<BlasVendor>,
    cuda_devices: u32,
}

impl DeviceInfo {
    /// Probe the host. Prefer [`DeviceInfo::cached`] outside of tests.
    pub fn detect() -> Self {
        let info = Self {
            cpu: CpuCapabilities::detect(),
            blas: linked_blas(),
            cuda_devices: visible_cuda_devices(),
        };
        tracing::debug!(
            avx2 = info.cpu.avx2,
            avx512f = info.cpu.avx512f,
            neon = info.cpu.neon,
            cores = info.cpu.logical_cores,
            blas = ?info.blas,
            cuda_devices = info.cuda_devices,
            "devices_detected"
        );
        info
    }

    /// Process-wide capability snapshot, probed on first use
    pub fn cached() -> &'static DeviceInfo {
        static DEVICES: OnceLock<DeviceInfo> = OnceLock::new();
        DEVICES.get_or_init(Self::detect)
    }

    /// A host with a scalar CPU and nothing else
    pub fn cpu_only() -> Self {
        Self {
            cpu: CpuCapabilities::scalar(1),
            blas: None,
            cuda_devices: 0,
        }
    }

    pub fn with_cpu(mut self, cpu: CpuCapabilities) -> Self {
        self.cpu = cpu;
        self
    }

    /// Toggle AVX2 support, the common way tests switch SIMD on and off
    pub fn with_vector_units(mut self, enabled: bool) -> Self {
        self.cpu.avx2 = enabled;
        self.cpu.avx512f = false;
        self.cpu.neon = false;
        self
    }

    pub fn with_blas(mut self, vendor: BlasVendor) -> Self {
        self.blas = Some(vendor);
        self
    }

    pub fn with_cuda_devices(mut self, count: u32) -> Self {
        self.cuda_devices = count;
        self
    }

    pub fn cpu(&self) -> &CpuCapabilities {
        &self.cpu
    }

    pub fn blas(&self) -> Option<BlasVendor> {
        self.blas
    }

    pub fn cuda_devices(&self) -> u32 {
        self.cuda_devices
    }

    pub fn has_cuda(&self) -> bool {
        self.cuda_devices > 0
    }

    /// Whether at least one device of `backend` exists
    pub fn is_available(&self, backend: BackendType) -> bool {
        match backend {
            BackendType::Cpu => true,
            BackendType::Gpu => self.has_cuda(),
        }
    }

    /// Backends with at least one device, CPU first
    pub fn available_backends(&self) -> Vec<BackendType> {
        [BackendType::Cpu, BackendType::Gpu]
            .into_iter()
            .filter(|&backend| self.is_available(backend))
            .collect()
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cpu({} cores", self.cpu.logical_cores)?;
        if self.cpu.avx512f {
            f.write_str(", avx512f")?;
        } else if self.cpu.avx2 {
            f.write_str(", avx2")?;
        } else if self.cpu.neon {
            f.write_str(", neon")?;
        }
        f.write_str(")")?;
        if let Some(vendor) = self.blas {
            write!(f, " + {}", vendor.path())?;
        }
        if self.cuda_devices > 0 {
            write!(f, " + cuda x{}", self.cuda_devices)?;
        }
        Ok(())
    }
}

fn linked_blas() -> Option<BlasVendor> {
    if cfg!(feature = "openblas") {
        Some(BlasVendor::OpenBlas)
    } else if cfg!(feature = "blas") {
        Some(BlasVendor::Generic)
    } else {
        None
    }
}

#[cfg(feature = "cuda")]
fn visible_cuda_devices() -> u32 {
    std::env::var("STRATA_CUDA_DEVICES")
        .ok()
        .and_then(|value| value.trim().parse::<u32>().ok())
        .unwrap_or(0)
}

#[cfg(not(feature = "cuda"))]
fn visible_cuda_devices() -> u32 {
    0
}
