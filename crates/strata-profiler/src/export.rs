//! File exporters
//!
//! | Format | Source | Notes |
//! |---|---|---|
//! | `json` | aggregate report | loads back with [`ProfileReport::load`] |
//! | `csv` | aggregate report | nothing is written for an empty report |
//! | `flamegraph` | aggregate report | speedscope evented profile, one flat frame per operation |
//! | `chrome_tracing` | retained spans | needs span retention |
//!
//! The flamegraph is an approximation: operations are laid end to end with
//! their total time, there is no call tree.

use crate::error::{ProfilerError, Result};
use crate::profiler::{Profiler, SpanSnapshot};
use crate::report::ProfileReport;
use serde::Serialize;
use std::fmt::{self, Write as _};
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;
use strata_backends::KernelPath;
use strata_tracing::performance::record_export;

/// Column order of the CSV export
pub const CSV_COLUMNS: [&str; 8] = [
    "operation",
    "count",
    "total_time_ms",
    "avg_time_ms",
    "min_time_ms",
    "max_time_ms",
    "primary_backend",
    "percent_total",
];

const SPEEDSCOPE_SCHEMA: &str = "https://www.speedscope.app/file-format-schema.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Json,
    Csv,
    Flamegraph,
    ChromeTracing,
}

impl ExportFormat {
    pub const fn name(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Flamegraph => "flamegraph",
            ExportFormat::ChromeTracing => "chrome_tracing",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ProfilerError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "flamegraph" | "speedscope" => Ok(ExportFormat::Flamegraph),
            "chrome_tracing" | "chrome" => Ok(ExportFormat::ChromeTracing),
            other => Err(ProfilerError::configuration(format!(
                "unknown export format '{other}' (expected json, csv, flamegraph or chrome_tracing)"
            ))),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What an export did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOutcome {
    Written { bytes: usize },
    /// Nothing to export; no file was created
    Skipped,
}

/// Export the profiler's current state to `path`
///
/// Spans retained earlier stay exportable after retention is switched off.
pub fn export_profile(
    profiler: &Profiler,
    path: impl AsRef<Path>,
    format: ExportFormat,
    context: Option<&str>,
) -> Result<ExportOutcome> {
    let report = profiler.report(context);
    let snapshot = profiler.spans();
    let spans = (profiler.retains_spans() || !snapshot.spans.is_empty()).then_some(snapshot);
    write_export(path, &report, spans.as_ref(), format)
}

/// Render `report` (and `spans` for timelines) and write the result to `path`
pub fn write_export(
    path: impl AsRef<Path>,
    report: &ProfileReport,
    spans: Option<&SpanSnapshot>,
    format: ExportFormat,
) -> Result<ExportOutcome> {
    let path = path.as_ref();
    let started = Instant::now();

    let Some(contents) = render_export(report, spans, format)? else {
        tracing::debug!(destination = %path.display(), format = format.name(), "export_skipped_empty");
        return Ok(ExportOutcome::Skipped);
    };

    std::fs::write(path, contents.as_bytes()).map_err(|source| ProfilerError::io(path, source))?;

    let bytes = contents.len();
    record_export(
        &path.display().to_string(),
        format.name(),
        bytes,
        started.elapsed().as_micros() as u64,
    );
    Ok(ExportOutcome::Written { bytes })
}

/// File contents for `format`, or `None` when there is nothing to write
pub fn render_export(
    report: &ProfileReport,
    spans: Option<&SpanSnapshot>,
    format: ExportFormat,
) -> Result<Option<String>> {
    match format {
        ExportFormat::Json => report.to_json().map(Some),
        ExportFormat::Csv => Ok(csv(report)),
        ExportFormat::Flamegraph => speedscope(report).map(Some),
        ExportFormat::ChromeTracing => {
            let spans = spans.ok_or_else(|| {
                ProfilerError::configuration(
                    "chrome_tracing export needs retained spans; set ProfilerConfig::retain_spans \
                     or STRATA_PROFILE_SPANS=1 before profiling",
                )
            })?;
            chrome_trace(report, spans).map(Some)
        }
    }
}

// ============================================================================
// CSV
// ============================================================================

pub fn csv(report: &ProfileReport) -> Option<String> {
    if report.is_empty() {
        return None;
    }

    let mut out = CSV_COLUMNS.join(",");
    out.push('\n');
    for op in report.by_total_time() {
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{}",
            csv_field(&op.operation),
            op.count,
            op.total_time_ms,
            op.avg_time_ms,
            op.min_time_ms,
            op.max_time_ms,
            csv_field(op.primary_backend.label()),
            op.percent_total
        );
    }
    Some(out)
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// ============================================================================
// Speedscope
// ============================================================================

#[derive(Serialize)]
struct SpeedscopeFile<'a> {
    #[serde(rename = "$schema")]
    schema: &'static str,
    name: String,
    exporter: &'static str,
    #[serde(rename = "activeProfileIndex")]
    active_profile_index: usize,
    shared: SpeedscopeShared<'a>,
    profiles: Vec<SpeedscopeProfile>,
}

#[derive(Serialize)]
struct SpeedscopeShared<'a> {
    frames: Vec<SpeedscopeFrame<'a>>,
}

#[derive(Serialize)]
struct SpeedscopeFrame<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct SpeedscopeProfile {
    #[serde(rename = "type")]
    profile_type: &'static str,
    name: &'static str,
    unit: &'static str,
    #[serde(rename = "startValue")]
    start_value: f64,
    #[serde(rename = "endValue")]
    end_value: f64,
    events: Vec<SpeedscopeEvent>,
}

#[derive(Serialize)]
struct SpeedscopeEvent {
    #[serde(rename = "type")]
    kind: &'static str,
    frame: usize,
    at: f64,
}

pub fn speedscope(report: &ProfileReport) -> Result<String> {
    let ops = report.by_total_time();
    let mut events = Vec::with_capacity(ops.len() * 2);
    let mut cursor = 0.0;
    for (frame, op) in ops.iter().enumerate() {
        events.push(SpeedscopeEvent {
            kind: "O",
            frame,
            at: cursor,
        });
        cursor += op.total_time_ms;
        events.push(SpeedscopeEvent {
            kind: "C",
            frame,
            at: cursor,
        });
    }

    let file = SpeedscopeFile {
        schema: SPEEDSCOPE_SCHEMA,
        name: format!("strata profile {}", report.metadata.session_id),
        exporter: concat!("strata ", env!("CARGO_PKG_VERSION")),
        active_profile_index: 0,
        shared: SpeedscopeShared {
            frames: ops.iter().map(|op| SpeedscopeFrame { name: &op.operation }).collect(),
        },
        profiles: vec![SpeedscopeProfile {
            profile_type: "evented",
            name: "aggregate",
            unit: "milliseconds",
            start_value: 0.0,
            end_value: cursor,
            events,
        }],
    };
    Ok(serde_json::to_string(&file)?)
}

// ============================================================================
// Chrome tracing
// ============================================================================

#[derive(Serialize)]
struct ChromeTrace<'a> {
    #[serde(rename = "traceEvents")]
    trace_events: Vec<ChromeTraceEvent<'a>>,
    #[serde(rename = "displayTimeUnit")]
    display_time_unit: &'static str,
    #[serde(rename = "otherData")]
    other_data: ChromeTraceOtherData<'a>,
}

#[derive(Serialize)]
struct ChromeTraceEvent<'a> {
    name: &'a str,
    cat: &'static str,
    ph: &'static str,
    ts: u64,
    dur: u64,
    pid: u32,
    tid: u64,
    args: ChromeTraceArgs<'a>,
}

#[derive(Serialize)]
struct ChromeTraceArgs<'a> {
    backend: KernelPath,
    context: Option<&'a str>,
}

#[derive(Serialize)]
struct ChromeTraceOtherData<'a> {
    session_id: &'a str,
    version: &'a str,
    dropped_spans: u64,
}

/// Complete (`ph: "X"`) events, one per retained span
///
/// Spans are filtered by the report's context when it has one.
pub fn chrome_trace(report: &ProfileReport, spans: &SpanSnapshot) -> Result<String> {
    let pid = std::process::id();
    let wanted = report.metadata.context.as_deref();

    let trace_events = spans
        .spans
        .iter()
        .filter(|span| wanted.is_none() || span.context.as_deref() == wanted)
        .map(|span| ChromeTraceEvent {
            name: &span.name,
            cat: "strata",
            ph: "X",
            ts: span.start_us,
            dur: span.duration_us,
            pid,
            tid: span.thread,
            args: ChromeTraceArgs {
                backend: span.path,
                context: span.context.as_deref(),
            },
        })
        .collect();

    let trace = ChromeTrace {
        trace_events,
        display_time_unit: "ms",
        other_data: ChromeTraceOtherData {
            session_id: &report.metadata.session_id,
            version: &report.metadata.version,
            dropped_spans: spans.dropped,
        },
    };
    Ok(serde_json::to_string(&trace)?)
}
