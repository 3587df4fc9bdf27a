//! Public API against the process-wide runtime
//!
//! Every test resets the global runtime and runs serially.

use serial_test::serial;
use strata::{
    ops, BackendPolicy, BackendType, BlasVendor, CudaFallback, DeviceInfo, DispatchError, Error, ExportFormat,
    ExportOutcome, OperationKind, ReferenceKernels, ReportFormat, Runtime, RuntimeConfig, Severity, Tensor,
};

fn fresh() {
    Runtime::global().reset();
    strata::set_backend_policy(BackendPolicy::Default);
    strata::set_cuda_fallback(CudaFallback::Error);
}

fn ones(n: usize) -> Tensor {
    Tensor::from_vec(vec![1.0; n])
}

#[test]
#[serial]
fn disabled_profiler_records_nothing() {
    fresh();
    strata::disable_profiling();
    let t = ones(32);
    for _ in 0..25 {
        ops::add(&t, &t).unwrap();
    }
    assert!(Runtime::global().report(None).is_empty());
}

#[test]
#[serial]
fn counts_match_calls_and_clear_empties() {
    fresh();
    strata::enable_profiling();
    let t = ones(32);
    for _ in 0..7 {
        ops::add(&t, &t).unwrap();
    }
    let dict = strata::profile_report(None, ReportFormat::Dict).unwrap();
    assert_eq!(dict.as_mapping().unwrap()["operations"]["add"]["count"], 7);

    strata::clear_profile();
    let report = Runtime::global().report(None);
    assert!(report.operations.is_empty());
    assert_eq!(report.total_time_ms, 0.0);
}

#[test]
#[serial]
fn tiny_tensors_stay_on_cpu_under_default_policy() {
    fresh();
    let out = ops::mul(&ones(4), &ones(4)).unwrap();
    assert_eq!(out.backend(), BackendType::Cpu);
    assert!(strata::explain_last_dispatch().starts_with("mul → CPU ("));
}

#[test]
#[serial]
fn cuda_policy_without_device_needs_explicit_fallback() {
    fresh();
    if Runtime::global().devices().has_cuda() {
        return;
    }
    strata::set_backend_policy(BackendPolicy::Cuda);
    let err = ops::relu(&ones(8)).unwrap_err();
    assert!(matches!(
        err,
        Error::Dispatch(DispatchError::DeviceNotFound {
            backend: BackendType::Gpu
        })
    ));

    strata::set_cuda_fallback(CudaFallback::Cpu);
    let out = ops::relu(&ones(8)).unwrap();
    assert_eq!(out.backend(), BackendType::Cpu);
    assert!(strata::explain_last_dispatch().contains("cpu fallback"));
    fresh();
}

#[test]
#[serial]
fn explicit_request_wins_over_policy() {
    fresh();
    strata::set_backend_policy(BackendPolicy::Cuda);
    let t = ones(8).to(BackendType::Cpu);
    let out = ops::neg(&t).unwrap();
    assert_eq!(out.backend(), BackendType::Cpu);
    assert!(strata::explain_last_dispatch().contains("explicit CPU request"));
    fresh();
}

#[test]
#[serial]
fn blas_policy_explains_vendor_math() {
    let rt = Runtime::with_devices(
        RuntimeConfig::default(),
        DeviceInfo::cpu_only().with_blas(BlasVendor::OpenBlas),
    );
    rt.set_backend_policy(BackendPolicy::Blas);
    let a = Tensor::new(vec![1.0; 300 * 8], vec![300, 8]).unwrap();
    let b = Tensor::new(vec![1.0; 8 * 300], vec![8, 300]).unwrap();
    rt.execute("matmul", OperationKind::MatMul, &[&a, &b], &ReferenceKernels)
        .unwrap();
    let explanation = rt.explain_last_dispatch();
    assert!(explanation.starts_with("matmul → BLAS"), "{explanation}");
    assert!(explanation.contains("vendor math"));
}

#[test]
#[serial]
fn export_reload_and_analysis() {
    fresh();
    strata::enable_profiling();
    let m = Tensor::new(vec![1.0; 64 * 64], vec![64, 64]).unwrap();
    ops::matmul(&m, &m).unwrap();
    ops::add(&ones(4), &ones(4)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profile.json");
    let outcome = strata::export_profile(&path, ExportFormat::Json, None).unwrap();
    assert!(matches!(outcome, ExportOutcome::Written { .. }));

    let dict = strata::profile_report(None, ReportFormat::Dict).unwrap();
    let reloaded: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(dict.as_mapping().unwrap(), &reloaded);

    let timed = Runtime::global()
        .report(None)
        .operations
        .values()
        .filter(|op| op.percent_total > 0.0)
        .count();
    let every = strata::detect_bottlenecks(0.0);
    assert_eq!(every.len(), timed);
    assert_eq!(every[0].operation, "matmul");
    assert!(matches!(every[0].severity, Severity::Critical | Severity::High));

    let baseline = strata::Baseline::load(&path).unwrap();
    assert!(strata::detect_regressions(&baseline, 1.2).is_empty());
    fresh();
}

#[test]
#[serial]
fn csv_export_of_empty_profile_is_skipped() {
    fresh();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profile.csv");
    let outcome = strata::export_profile(&path, ExportFormat::Csv, None).unwrap();
    assert_eq!(outcome, ExportOutcome::Skipped);
    assert!(!path.exists());
}
