//! Operation profiling for strata
//!
//! ## Overview
//!
//! [`Profiler`] aggregates dispatch timings per operation and per naming
//! context. Snapshots ([`ProfileReport`]) feed three consumers:
//!
//! - [`format`]: table, JSON, structured value and compact renderings
//! - [`export`]: JSON, CSV, speedscope and Chrome trace files
//! - [`analysis`]: bottlenecks, recommendations and regressions
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use strata_backends::KernelPath;
//! use strata_profiler::{context_scope, detect_bottlenecks, Profiler};
//!
//! let profiler = Profiler::default();
//! profiler.enable();
//! {
//!     let _scope = context_scope("forward");
//!     profiler.record("matmul", Duration::from_millis(8), KernelPath::Blas);
//!     profiler.record("add", Duration::from_millis(2), KernelPath::Simd);
//! }
//!
//! let report = profiler.report(Some("forward"));
//! assert_eq!(report.operation_count, 2);
//! assert_eq!(detect_bottlenecks(&report, 0.5)[0].operation, "matmul");
//! ```

pub mod analysis;
pub mod context;
pub mod error;
pub mod export;
pub mod format;
pub mod profiler;
pub mod report;

pub use analysis::{
    default_rules, detect_bottlenecks, detect_regressions, get_recommendations, recommendations_with, Baseline,
    Bottleneck, Priority, Recommendation, RecommendationRule, Regression, RuleAction, RulePredicate, Severity,
    DEFAULT_BOTTLENECK_THRESHOLD, DEFAULT_REGRESSION_THRESHOLD,
};
pub use context::{context_depth, context_scope, current_context, with_context, ContextGuard};
pub use error::{ProfilerError, Result};
pub use export::{export_profile, render_export, write_export, ExportFormat, ExportOutcome, CSV_COLUMNS};
pub use format::{render, RenderedReport, ReportFormat};
pub use profiler::{
    DispatchTimer, OperationRecord, Profiler, ProfilerConfig, SpanRecord, SpanSnapshot, DEFAULT_SPAN_CAPACITY,
};
pub use report::{OperationStats, ProfileReport, SessionMetadata};
