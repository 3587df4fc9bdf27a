//! Runtime context
//!
//! A [`Runtime`] owns everything a dispatch touches: the policy cell, the
//! device snapshot, the selector, the profiler and the last-decision slot.
//! Embedders can create as many as they like; the free functions of this
//! crate use the lazily built [`Runtime::global`] instance.
//!
//! ## Dispatch sequence
//!
//! ```text
//! dispatch(op, kind, props, requested, run)
//!   │
//!   ├─► policy.load()                        (atomic, acquire)
//!   ├─► selector.select(..)                  (pure)
//!   ├─► explanation.store(..)                (last writer wins)
//!   ├─► profiler.start(op, path)             (None when disabled)
//!   ├─► run(&selection)                      (kernel layer)
//!   └─► timer drop records the elapsed time  (cancelled on error)
//! ```

use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use crate::kernel::Kernel;
use crate::tensor::{dims_u32, Tensor};
use std::path::Path;
use std::sync::OnceLock;
use strata_backends::{
    check_operands, BackendPolicy, BackendSelector, BackendType, CudaFallback, DType, DeviceInfo, DispatchError,
    DispatchExplanation, ExplanationSlot, OperationKind, OperationProperties, PolicyStore, Selection,
};
use strata_profiler::{
    analysis, export, format, Baseline, Bottleneck, ExportFormat, ExportOutcome, ProfileReport, Profiler,
    Recommendation, Regression, RenderedReport, ReportFormat,
};

static GLOBAL: OnceLock<Runtime> = OnceLock::new();

/// Shared dispatch and profiling state
#[derive(Debug)]
pub struct Runtime {
    config: RuntimeConfig,
    devices: DeviceInfo,
    selector: BackendSelector,
    policy: PolicyStore,
    profiler: Profiler,
    explanation: ExplanationSlot,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl Runtime {
    /// Runtime over the probed host devices
    pub fn new(config: RuntimeConfig) -> Self {
        Self::with_devices(config, DeviceInfo::cached().clone())
    }

    /// Runtime over an explicit device description
    pub fn with_devices(config: RuntimeConfig, devices: DeviceInfo) -> Self {
        let runtime = Self {
            selector: BackendSelector::new(config.selector),
            policy: PolicyStore::new(config.policy, config.cuda_fallback),
            profiler: Profiler::new(config.profiler.clone()),
            explanation: ExplanationSlot::new(),
            devices,
            config,
        };
        if runtime.config.profiling_enabled {
            runtime.profiler.enable();
        }
        tracing::debug!(
            devices = %runtime.devices,
            policy = %runtime.config.policy,
            profiling = runtime.config.profiling_enabled,
            "runtime_created"
        );
        runtime
    }

    /// Process-wide runtime, configured from `STRATA_*` variables on first use
    ///
    /// A malformed environment is logged and replaced by defaults. Use
    /// [`Runtime::try_global`] or [`Runtime::init_global`] to see the error.
    pub fn global() -> &'static Runtime {
        GLOBAL.get_or_init(|| {
            let config = RuntimeConfig::from_env().unwrap_or_else(|err| {
                tracing::warn!(error = %err, "invalid runtime environment, using defaults");
                RuntimeConfig::default()
            });
            Runtime::new(config)
        })
    }

    /// Like [`Runtime::global`], but a malformed environment is a
    /// `Configuration` error and leaves the global runtime unset
    ///
    /// Once the global runtime exists the environment is not read again.
    pub fn try_global() -> Result<&'static Runtime> {
        if let Some(runtime) = GLOBAL.get() {
            return Ok(runtime);
        }
        let config = RuntimeConfig::from_env()?;
        Ok(GLOBAL.get_or_init(|| Runtime::new(config)))
    }

    /// Install the global runtime from an explicit configuration
    ///
    /// Fails with a `Configuration` error if the global runtime was already
    /// created.
    pub fn init_global(config: RuntimeConfig) -> Result<&'static Runtime> {
        let mut config = Some(config);
        let runtime = GLOBAL.get_or_init(|| Runtime::new(config.take().unwrap_or_default()));
        match config {
            None => Ok(runtime),
            Some(_) => Err(DispatchError::configuration("global runtime is already initialized").into()),
        }
    }

    /// Restore the construction-time state: policy, fallback, profiling flag,
    /// span retention. Recorded data and the last explanation are dropped.
    pub fn reset(&self) {
        self.policy.set_policy(self.config.policy);
        self.policy.set_cuda_fallback(self.config.cuda_fallback);
        self.profiler.clear();
        self.profiler.set_span_retention(self.config.profiler.retain_spans);
        if self.config.profiling_enabled {
            self.profiler.enable();
        } else {
            self.profiler.disable();
        }
        self.explanation.clear();
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn devices(&self) -> &DeviceInfo {
        &self.devices
    }

    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    // ------------------------------------------------------------------
    // Policy
    // ------------------------------------------------------------------

    pub fn set_backend_policy(&self, policy: BackendPolicy) {
        self.policy.set_policy(policy);
    }

    pub fn get_backend_policy(&self) -> BackendPolicy {
        self.policy.policy()
    }

    pub fn set_cuda_fallback(&self, mode: CudaFallback) {
        self.policy.set_cuda_fallback(mode);
    }

    pub fn get_cuda_fallback(&self) -> CudaFallback {
        self.policy.cuda_fallback()
    }

    /// Last selection rendered as `"<op> → <path> (<reason>, ...)"`
    pub fn explain_last_dispatch(&self) -> String {
        self.explanation.describe()
    }

    pub fn last_dispatch(&self) -> Option<DispatchExplanation> {
        self.explanation.latest()
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Choose the backend for `op` and remember the decision
    pub fn select(
        &self,
        op: &str,
        kind: OperationKind,
        props: &OperationProperties,
        requested: Option<BackendType>,
    ) -> Result<Selection> {
        let policy = self.policy.policy();
        let selection = self.selector.select(
            kind,
            props,
            &self.devices,
            requested,
            policy,
            self.policy.cuda_fallback(),
        )?;
        self.explanation
            .store(DispatchExplanation::new(op, &selection, props, policy));
        Ok(selection)
    }

    /// Select a backend, run `run` on it and profile the call
    ///
    /// A failing `run` is not recorded and its error is returned unchanged.
    pub fn dispatch<T>(
        &self,
        op: &str,
        kind: OperationKind,
        props: &OperationProperties,
        requested: Option<BackendType>,
        run: impl FnOnce(&Selection) -> Result<T>,
    ) -> Result<T> {
        let selection = self.select(op, kind, props, requested)?;
        let timer = self.profiler.start(op, selection.path);
        match run(&selection) {
            Ok(value) => {
                drop(timer);
                Ok(value)
            }
            Err(err) => {
                if let Some(timer) = timer {
                    timer.cancel();
                }
                tracing::debug!(operation = op, path = %selection.path, error = %err, "dispatch_failed");
                Err(err)
            }
        }
    }

    /// Run `op` over tensors through `kernel`
    ///
    /// Operands must share a backend. If any operand was placed explicitly,
    /// that placement is the requested backend.
    pub fn execute(&self, op: &str, kind: OperationKind, inputs: &[&Tensor], kernel: &dyn Kernel) -> Result<Tensor> {
        let (props, output_shape) = operation_shape(kind, inputs)?;
        let (placement, pinned) = placement(inputs)?;
        let requested = pinned.then_some(placement);

        let expected: usize = output_shape.iter().product();
        let (data, backend) = self.dispatch(op, kind, &props, requested, |selection| {
            let data = kernel.launch(op, selection.path, inputs)?;
            if data.len() != expected {
                return Err(Error::kernel(format!(
                    "{op} returned {} elements, expected {expected}",
                    data.len()
                )));
            }
            Ok((data, selection.backend))
        })?;

        Ok(Tensor::new(data, output_shape)?.placed(backend, pinned))
    }

    /// Zero-filled tensor placed by the selector (or on `requested`)
    pub fn zeros(&self, shape: Vec<usize>, requested: Option<BackendType>) -> Result<Tensor> {
        let props = OperationProperties::new(dims_u32(&shape)?, DType::F32)?;
        self.dispatch("zeros", OperationKind::Creation, &props, requested, |selection| {
            Ok(Tensor::zeros(shape)?.placed(selection.backend, requested.is_some()))
        })
    }

    // ------------------------------------------------------------------
    // Profiling
    // ------------------------------------------------------------------

    pub fn enable_profiling(&self) {
        self.profiler.enable();
    }

    pub fn disable_profiling(&self) {
        self.profiler.disable();
    }

    pub fn is_profiling_enabled(&self) -> bool {
        self.profiler.is_enabled()
    }

    pub fn clear_profile(&self) {
        self.profiler.clear();
    }

    /// Keep raw spans so `chrome_tracing` exports have a timeline
    pub fn set_span_retention(&self, retain: bool) {
        self.profiler.set_span_retention(retain);
    }

    pub fn report(&self, context: Option<&str>) -> ProfileReport {
        self.profiler.report(context)
    }

    pub fn profile_report(&self, context: Option<&str>, format: ReportFormat) -> Result<RenderedReport> {
        Ok(format::render(&self.profiler.report(context), format)?)
    }

    pub fn export_profile(
        &self,
        path: impl AsRef<Path>,
        format: ExportFormat,
        context: Option<&str>,
    ) -> Result<ExportOutcome> {
        Ok(export::export_profile(&self.profiler, path, format, context)?)
    }

    pub fn detect_bottlenecks(&self, threshold: f64) -> Vec<Bottleneck> {
        analysis::detect_bottlenecks(&self.profiler.report(None), threshold)
    }

    pub fn get_recommendations(&self) -> Vec<Recommendation> {
        analysis::get_recommendations(&self.profiler.report(None))
    }

    pub fn detect_regressions(&self, baseline: &Baseline, threshold: f64) -> Vec<Regression> {
        analysis::detect_regressions(&self.profiler.report(None), baseline, threshold)
    }
}

/// Selection input and output shape for `kind` over `inputs`
fn operation_shape(kind: OperationKind, inputs: &[&Tensor]) -> Result<(OperationProperties, Vec<usize>)> {
    match (kind, inputs) {
        (OperationKind::Elementwise, [a]) => Ok((a.properties()?, a.shape().to_vec())),
        (OperationKind::Elementwise, [a, b]) => {
            if a.shape() != b.shape() {
                return Err(Error::invalid_shape(format!(
                    "elementwise operands {:?} and {:?} differ",
                    a.shape(),
                    b.shape()
                )));
            }
            Ok((a.properties()?, a.shape().to_vec()))
        }
        (OperationKind::Reduction, [a]) => Ok((a.properties()?, Vec::new())),
        (OperationKind::Dot, [a, b]) => match (a.shape(), b.shape()) {
            (&[n], &[n2]) if n == n2 => Ok((a.properties()?, Vec::new())),
            (lhs, rhs) => Err(Error::invalid_shape(format!("dot needs equal vectors, got {lhs:?} and {rhs:?}"))),
        },
        (OperationKind::MatMul, [a, b]) => match (a.shape(), b.shape()) {
            (&[m, k], &[k2, n]) if k == k2 => {
                let [m32, k32, n32] = narrow([m, k, n])?;
                Ok((OperationProperties::for_matmul(m32, k32, n32, DType::F32)?, vec![m, n]))
            }
            (lhs, rhs) => Err(Error::invalid_shape(format!("cannot multiply {lhs:?} by {rhs:?}"))),
        },
        (OperationKind::BatchedMatMul, [a, b]) => match (a.shape(), b.shape()) {
            (&[batch, m, k], &[batch2, k2, n]) if batch == batch2 && k == k2 => {
                let [b32, m32, k32, n32] = narrow([batch, m, k, n])?;
                Ok((
                    OperationProperties::for_batched_matmul(b32, m32, k32, n32, DType::F32)?,
                    vec![batch, m, n],
                ))
            }
            (lhs, rhs) => Err(Error::invalid_shape(format!("cannot batch-multiply {lhs:?} by {rhs:?}"))),
        },
        (kind, inputs) => Err(Error::invalid_shape(format!(
            "{} does not take {} inputs",
            kind.name(),
            inputs.len()
        ))),
    }
}

fn narrow<const N: usize>(dims: [usize; N]) -> Result<[u32; N]> {
    let mut out = [0u32; N];
    for (slot, dim) in out.iter_mut().zip(dims) {
        *slot = u32::try_from(dim).map_err(|_| Error::invalid_shape(format!("dimension {dim} exceeds u32")))?;
    }
    Ok(out)
}

/// Common backend of all operands and whether any was placed explicitly
fn placement(inputs: &[&Tensor]) -> Result<(BackendType, bool)> {
    let Some((first, rest)) = inputs.split_first() else {
        return Ok((BackendType::Cpu, false));
    };
    let mut backend = first.backend();
    for other in rest {
        backend = check_operands(backend, other.backend())?;
    }
    Ok((backend, inputs.iter().any(|t| t.is_pinned())))
}
