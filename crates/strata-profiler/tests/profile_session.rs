//! End-to-end profiling sessions: record, report, export, analyze

use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use strata_backends::KernelPath;
use strata_profiler::{
    context_scope, detect_bottlenecks, detect_regressions, export_profile, render, Baseline, ExportFormat,
    ExportOutcome, ProfileReport, Profiler, ProfilerConfig, ProfilerError, ReportFormat,
};

fn enabled_profiler(config: ProfilerConfig) -> Profiler {
    let profiler = Profiler::new(config);
    profiler.enable();
    profiler
}

#[test]
fn exported_json_reloads_as_the_dict_snapshot() {
    let profiler = enabled_profiler(ProfilerConfig::default());
    profiler.record("matmul", Duration::from_micros(1_234), KernelPath::Blas);
    profiler.record("add", Duration::from_micros(17), KernelPath::Simd);
    profiler.record("add", Duration::from_micros(23), KernelPath::Simd);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profile.json");
    let outcome = export_profile(&profiler, &path, ExportFormat::Json, None).unwrap();
    assert!(matches!(outcome, ExportOutcome::Written { .. }));

    let dict = render(&profiler.report(None), ReportFormat::Dict).unwrap();
    let reloaded: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(dict.as_mapping().unwrap(), &reloaded);
}

#[test]
fn baseline_loaded_from_export_detects_slowdown() {
    let profiler = enabled_profiler(ProfilerConfig::default());
    for _ in 0..4 {
        profiler.record("softmax", Duration::from_millis(1), KernelPath::Simd);
    }
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("baseline.json");
    export_profile(&profiler, &path, ExportFormat::Json, None).unwrap();

    profiler.clear();
    for _ in 0..4 {
        profiler.record("softmax", Duration::from_millis(3), KernelPath::Simd);
    }

    let baseline = Baseline::load(&path).unwrap();
    let regressions = detect_regressions(&profiler.report(None), &baseline, 1.2);
    assert_eq!(regressions.len(), 1);
    assert_eq!(regressions[0].slowdown_factor, 3.0);
}

#[test]
fn chrome_trace_requires_span_retention() {
    let profiler = enabled_profiler(ProfilerConfig::default());
    drop(profiler.start("add", KernelPath::Scalar));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.json");
    let result = export_profile(&profiler, &path, ExportFormat::ChromeTracing, None);
    assert!(matches!(result, Err(ProfilerError::Configuration(_))));
    assert!(!path.exists());
}

#[test]
fn chrome_trace_has_one_event_per_span_and_thread_ids() {
    let profiler = Arc::new(enabled_profiler(ProfilerConfig {
        retain_spans: true,
        ..ProfilerConfig::default()
    }));

    let handles: Vec<_> = (0..3)
        .map(|worker| {
            let profiler = profiler.clone();
            std::thread::spawn(move || {
                let _scope = context_scope(&format!("worker-{worker}"));
                for _ in 0..2 {
                    drop(profiler.start("relu", KernelPath::Simd));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.json");
    export_profile(&profiler, &path, ExportFormat::ChromeTracing, None).unwrap();

    let trace: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let events = trace["traceEvents"].as_array().unwrap();
    assert_eq!(events.len(), 6);
    let mut threads: Vec<u64> = events.iter().map(|event| event["tid"].as_u64().unwrap()).collect();
    threads.sort_unstable();
    threads.dedup();
    assert_eq!(threads.len(), 3);

    let worker_one = profiler.report(Some("worker-1"));
    assert_eq!(worker_one.get("relu").unwrap().count, 2);
}

#[test]
fn spans_retained_earlier_still_export_as_chrome_trace() {
    let profiler = enabled_profiler(ProfilerConfig {
        retain_spans: true,
        ..ProfilerConfig::default()
    });
    drop(profiler.start("softmax", KernelPath::Simd));
    profiler.set_span_retention(false);
    drop(profiler.start("softmax", KernelPath::Simd));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.json");
    export_profile(&profiler, &path, ExportFormat::ChromeTracing, None).unwrap();

    let trace: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(trace["traceEvents"].as_array().unwrap().len(), 1);
    assert_eq!(profiler.report(None).get("softmax").unwrap().count, 2);
}

#[test]
fn csv_export_of_cleared_profile_writes_nothing() {
    let profiler = enabled_profiler(ProfilerConfig::default());
    profiler.record("add", Duration::from_millis(1), KernelPath::Scalar);
    profiler.clear();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profile.csv");
    let outcome = export_profile(&profiler, &path, ExportFormat::Csv, None).unwrap();
    assert_eq!(outcome, ExportOutcome::Skipped);
    assert!(!path.exists());
}

#[test]
fn flamegraph_export_is_speedscope_json() {
    let profiler = enabled_profiler(ProfilerConfig::default());
    profiler.record("matmul", Duration::from_millis(2), KernelPath::Blas);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profile.speedscope.json");
    export_profile(&profiler, &path, ExportFormat::Flamegraph, None).unwrap();

    let file: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(file["profiles"][0]["type"], "evented");
    assert_eq!(file["shared"]["frames"][0]["name"], "matmul");
}

proptest! {
    #[test]
    fn percent_total_sums_to_one_hundred(
        samples in proptest::collection::vec((0usize..5, 1u64..50_000), 1..64)
    ) {
        const NAMES: [&str; 5] = ["add", "mul", "matmul", "sum", "relu"];
        let profiler = enabled_profiler(ProfilerConfig::default());
        for (name, micros) in &samples {
            profiler.record(NAMES[*name], Duration::from_micros(*micros), KernelPath::Scalar);
        }

        let report: ProfileReport = profiler.report(None);
        let sum: f64 = report.operations.values().map(|op| op.percent_total).sum();
        prop_assert!((sum - 100.0).abs() < 1e-6, "sum was {}", sum);

        let every = detect_bottlenecks(&report, 0.0);
        prop_assert_eq!(every.len(), report.operations.len());
    }
}
