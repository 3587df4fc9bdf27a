//! Runtime instances driven end to end: selection, kernels, profiling, export

use std::sync::Arc;
use std::thread;
use strata_backends::{BackendPolicy, BlasVendor, DeviceInfo, KernelPath, OperationKind};
use strata_core::{
    Baseline, BackendType, Error, ExportFormat, ReferenceKernels, Runtime, RuntimeConfig, Tensor,
};
use strata_profiler::{context_scope, ProfileReport};

fn runtime(devices: DeviceInfo) -> Runtime {
    let rt = Runtime::with_devices(RuntimeConfig::default(), devices);
    rt.enable_profiling();
    rt
}

fn filled(value: f32, shape: &[usize]) -> Tensor {
    Tensor::new(vec![value; shape.iter().product()], shape.to_vec()).unwrap()
}

#[test]
fn explicit_placement_beats_every_policy() {
    let rt = runtime(DeviceInfo::cpu_only().with_blas(BlasVendor::OpenBlas).with_cuda_devices(1));
    let a = filled(1.0, &[64, 64]);

    for policy in [BackendPolicy::Default, BackendPolicy::OpenBlas, BackendPolicy::Blas, BackendPolicy::Cuda] {
        rt.set_backend_policy(policy);
        let pinned = a.clone().to(BackendType::Cpu);
        let out = rt
            .execute("matmul", OperationKind::MatMul, &[&pinned, &pinned], &ReferenceKernels)
            .unwrap();
        assert_eq!(out.backend(), BackendType::Cpu, "{policy}");
        assert!(out.is_pinned());
    }
}

#[test]
fn blas_policy_routes_large_matmul_to_vendor_math() {
    let rt = runtime(DeviceInfo::cpu_only().with_blas(BlasVendor::Generic));
    rt.set_backend_policy(BackendPolicy::Blas);
    let a = filled(0.5, &[256, 64]);
    let b = filled(2.0, &[64, 256]);

    let out = rt.execute("matmul", OperationKind::MatMul, &[&a, &b], &ReferenceKernels).unwrap();
    assert_eq!(out.shape(), &[256, 256]);
    assert_eq!(out.data()[0], 64.0);

    assert!(rt.explain_last_dispatch().starts_with("matmul → BLAS"));
    assert_eq!(rt.report(None).get("matmul").unwrap().primary_backend, KernelPath::Blas);
}

#[test]
fn contexts_from_many_threads_stay_separate() {
    let rt = Arc::new(runtime(DeviceInfo::cpu_only().with_vector_units(true)));
    let handles: Vec<_> = ["encoder", "decoder"]
        .into_iter()
        .map(|name| {
            let rt = Arc::clone(&rt);
            thread::spawn(move || {
                let _scope = context_scope(name);
                let t = filled(1.0, &[64]);
                for _ in 0..10 {
                    rt.execute("exp", OperationKind::Elementwise, &[&t], &ReferenceKernels).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(rt.report(Some("encoder")).get("exp").unwrap().count, 10);
    assert_eq!(rt.report(Some("decoder")).get("exp").unwrap().count, 10);
    assert_eq!(rt.report(None).get("exp").unwrap().count, 20);
}

#[test]
fn kernel_closures_plug_into_execute() {
    let rt = runtime(DeviceInfo::cpu_only());
    let seen = |op: &str, path: KernelPath, inputs: &[&Tensor]| -> strata_core::Result<Vec<f32>> {
        assert_eq!(op, "scale");
        assert_eq!(path, KernelPath::Scalar);
        Ok(inputs[0].data().iter().map(|x| x * 10.0).collect())
    };
    let out = rt
        .execute("scale", OperationKind::Elementwise, &[&filled(1.0, &[3])], &seen)
        .unwrap();
    assert_eq!(out.data(), &[10.0, 10.0, 10.0]);
}

#[test]
fn kernels_returning_the_wrong_length_fail() {
    let rt = runtime(DeviceInfo::cpu_only());
    let short = |_: &str, _: KernelPath, _: &[&Tensor]| -> strata_core::Result<Vec<f32>> { Ok(vec![0.0]) };
    let err = rt
        .execute("broken", OperationKind::Elementwise, &[&filled(1.0, &[4])], &short)
        .unwrap_err();
    assert!(matches!(err, Error::Kernel(_)));
    assert!(rt.report(None).get("broken").is_none());
}

#[test]
fn export_then_compare_against_baseline() {
    let rt = runtime(DeviceInfo::cpu_only());
    let t = filled(1.0, &[32]);
    rt.execute("sum", OperationKind::Reduction, &[&t], &ReferenceKernels).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("baseline.json");
    rt.export_profile(&path, ExportFormat::Json, None).unwrap();

    let baseline = Baseline::load(&path).unwrap();
    let reloaded: &ProfileReport = baseline.report();
    assert_eq!(reloaded.operations, rt.report(None).operations);
    assert!(rt.detect_regressions(&baseline, 1.2).is_empty());
}
