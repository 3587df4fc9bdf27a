//! # strata-core - Dispatch and profiling runtime
//!
//! Ties backend selection ([`strata_backends`]) and operation profiling
//! ([`strata_profiler`]) together behind one [`Runtime`] context object.
//!
//! ## Architecture
//!
//! ```text
//! ops::matmul(&a, &b)
//!   → Runtime::execute
//!       → BackendSelector::select   (policy, devices, requested placement)
//!       → Kernel::launch            (kernel layer, keyed by op + path)
//!       → Profiler                  (count, time, path; tagged with context)
//!
//! profile_report / export_profile / detect_* read snapshots independently
//! ```
//!
//! The free functions in this crate operate on [`Runtime::global`], which is
//! configured from `STRATA_*` environment variables on first use (see
//! [`config`]). Embedders that want isolated state build their own
//! [`Runtime`].
//!
//! ## Example
//!
//! ```rust
//! use strata_core::{ops, with_context, ReportFormat, Tensor};
//!
//! strata_core::enable_profiling();
//! let a = Tensor::new(vec![1.0; 4], vec![2, 2])?;
//! with_context("forward", || ops::matmul(&a, &a))?;
//!
//! let report = strata_core::profile_report(Some("forward"), ReportFormat::Compact)?;
//! assert!(report.to_string().starts_with("matmul: 1 calls"));
//! println!("{}", strata_core::explain_last_dispatch());
//! # Ok::<(), strata_core::Error>(())
//! ```

pub mod config;
pub mod error;
pub mod kernel;
pub mod ops;
pub mod runtime;
pub mod tensor;

use std::path::Path;

pub use config::RuntimeConfig;
pub use error::{Error, Result};
pub use kernel::{Kernel, ReferenceKernels};
pub use runtime::Runtime;
pub use tensor::Tensor;

pub use strata_backends::{
    BackendPolicy, BackendSelector, BackendType, BlasVendor, CpuCapabilities, CudaFallback, DType, DeviceInfo,
    DispatchError, DispatchExplanation, KernelPath, OperationKind, OperationProperties, Selection, SelectorConfig,
};
pub use strata_profiler::{
    context_scope, current_context, Baseline, Bottleneck, ContextGuard, ExportFormat, ExportOutcome, OperationStats,
    Priority, ProfileReport, ProfilerConfig, ProfilerError, Recommendation, Regression, RenderedReport, ReportFormat,
    Severity, DEFAULT_BOTTLENECK_THRESHOLD, DEFAULT_REGRESSION_THRESHOLD,
};
pub use strata_tracing::{init_global_tracing, TracingConfig};

// ============================================================================
// Profiling
// ============================================================================

pub fn enable_profiling() {
    Runtime::global().enable_profiling();
}

pub fn disable_profiling() {
    Runtime::global().disable_profiling();
}

pub fn is_profiling_enabled() -> bool {
    Runtime::global().is_profiling_enabled()
}

/// Drop all recorded statistics and spans and start a new session
pub fn clear_profile() {
    Runtime::global().clear_profile();
}

/// Render the current profile, optionally restricted to one context
pub fn profile_report(context: Option<&str>, format: ReportFormat) -> Result<RenderedReport> {
    Runtime::global().profile_report(context, format)
}

/// Write the current profile to `path`
///
/// An empty profile exported as CSV writes no file and returns
/// [`ExportOutcome::Skipped`].
pub fn export_profile(path: impl AsRef<Path>, format: ExportFormat, context: Option<&str>) -> Result<ExportOutcome> {
    Runtime::global().export_profile(path, format, context)
}

/// Operations whose share of total time exceeds `threshold` (a fraction)
pub fn detect_bottlenecks(threshold: f64) -> Vec<Bottleneck> {
    Runtime::global().detect_bottlenecks(threshold)
}

pub fn get_recommendations() -> Vec<Recommendation> {
    Runtime::global().get_recommendations()
}

/// Operations whose average time grew by more than `threshold` against `baseline`
pub fn detect_regressions(baseline: &Baseline, threshold: f64) -> Vec<Regression> {
    Runtime::global().detect_regressions(baseline, threshold)
}

/// Wrap `f` so every call runs inside the context scope `name`
///
/// Operations dispatched by `f` are aggregated under that context.
pub fn profiled<A, R>(name: impl Into<String>, f: impl Fn(A) -> R) -> impl Fn(A) -> R {
    let name = name.into();
    move |arg| {
        let _scope = context_scope(&name);
        f(arg)
    }
}

/// Run `f` inside the context scope `name`
pub fn with_context<R>(name: &str, f: impl FnOnce() -> R) -> R {
    strata_profiler::with_context(name, f)
}

// ============================================================================
// Backend policy
// ============================================================================

pub fn set_backend_policy(policy: BackendPolicy) {
    Runtime::global().set_backend_policy(policy);
}

pub fn get_backend_policy() -> BackendPolicy {
    Runtime::global().get_backend_policy()
}

/// What a `cuda` policy does on a host without CUDA devices
pub fn set_cuda_fallback(mode: CudaFallback) {
    Runtime::global().set_cuda_fallback(mode);
}

pub fn get_cuda_fallback() -> CudaFallback {
    Runtime::global().get_cuda_fallback()
}

/// Human-readable account of the most recent backend selection
pub fn explain_last_dispatch() -> String {
    Runtime::global().explain_last_dispatch()
}
