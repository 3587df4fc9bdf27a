//! Backend selection for strata tensor operations
//!
//! This crate provides:
//! - **Operation properties**: normalized size and shape of a dispatch
//! - **Device capabilities**: probed once per process, builder for tests
//! - **Backend policy**: atomic global steering of the heuristic
//! - **Selector**: pure per-operation choice of backend and kernel path
//! - **Explanation slot**: the most recent decision, for diagnostics
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ OperationProperties  │   │  DeviceInfo  │   │ PolicyStore  │
//! └──────────┬───────────┘   └──────┬───────┘   └──────┬───────┘
//!            └──────────────┬───────┴──────────────────┘
//!                           ▼
//!                 ┌──────────────────┐
//!                 │ BackendSelector  │──► Selection { backend, path, reason }
//!                 └──────────────────┘
//!                           │
//!         ┌─────────────────┼─────────────────┬──────────────┐
//!         ▼                 ▼                 ▼              ▼
//!   ┌──────────┐     ┌────────────┐    ┌────────────┐  ┌──────────┐
//!   │ CPU/SIMD │     │  OpenBLAS  │    │    BLAS    │  │   CUDA   │
//!   └──────────┘     └────────────┘    └────────────┘  └──────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use strata_backends::{
//!     BackendPolicy, BackendSelector, BackendType, CudaFallback, DType, DeviceInfo, KernelPath, OperationKind,
//!     OperationProperties,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let devices = DeviceInfo::cpu_only().with_vector_units(true);
//! let props = OperationProperties::new(vec![4], DType::F32)?;
//!
//! let selection = BackendSelector::default().select(
//!     OperationKind::Elementwise,
//!     &props,
//!     &devices,
//!     None,
//!     BackendPolicy::Default,
//!     CudaFallback::Error,
//! )?;
//!
//! assert_eq!(selection.backend, BackendType::Cpu);
//! assert_eq!(selection.path, KernelPath::Scalar);
//! # Ok(())
//! # }
//! ```

pub mod device;
pub mod error;
pub mod explanation;
pub mod policy;
pub mod selector;
pub mod types;

pub use device::{BlasVendor, CpuCapabilities, DeviceInfo};
pub use error::{BackendError, DispatchError, Result};
pub use explanation::{DispatchExplanation, ExplanationSlot, NO_DISPATCH};
pub use policy::{BackendPolicy, CudaFallback, PolicyStore};
pub use selector::{check_operands, BackendSelector, Selection, SelectorConfig};
pub use types::{BackendType, DType, KernelPath, OperationKind, OperationProperties};
