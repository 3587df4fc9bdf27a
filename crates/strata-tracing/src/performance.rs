//! Performance-focused tracing utilities
//!
//! Structured events for the two places where the runtime does observable
//! work outside a kernel: backend selection and profile export. Each helper
//! emits a single `debug`/`trace` event with a fixed field set so log
//! pipelines can aggregate them without parsing messages.
//!
//! ## Example
//!
//! ```rust
//! use strata_tracing::performance::{record_export, PerformanceSpan};
//!
//! let span = PerformanceSpan::new("write_report", Some(100));
//! // ... do work ...
//! drop(span); // Logs only if duration > 100μs
//!
//! record_export("profile.json", "json", 2048, 180);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::Level;

/// `u64::MAX` stands for "no threshold"
static DEFAULT_THRESHOLD_US: AtomicU64 = AtomicU64::new(u64::MAX);

/// Threshold used by `perf_span!` call sites that do not pass their own.
///
/// Set from [`crate::TracingConfig::performance_threshold_us`] by
/// [`crate::init_global_tracing`].
pub fn set_default_threshold(threshold_us: Option<u64>) {
    DEFAULT_THRESHOLD_US.store(threshold_us.unwrap_or(u64::MAX), Ordering::Relaxed);
}

pub fn default_threshold() -> Option<u64> {
    match DEFAULT_THRESHOLD_US.load(Ordering::Relaxed) {
        u64::MAX => None,
        threshold_us => Some(threshold_us),
    }
}

/// RAII guard that measures span duration and conditionally logs based on threshold.
///
/// The span is timed when created and logged when dropped, but only if the
/// duration reaches the optional threshold.
pub struct PerformanceSpan {
    name: String,
    threshold_us: Option<u64>,
    start_time: Instant,
    span: tracing::Span,
}

impl PerformanceSpan {
    /// Create a new performance span with optional threshold filtering.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the work being measured
    /// * `threshold_us` - Minimum duration in microseconds to log (None = always log)
    pub fn new(name: impl Into<String>, threshold_us: Option<u64>) -> Self {
        Self::with_level(Level::DEBUG, name, threshold_us)
    }

    /// Create a new performance span at the specified tracing level.
    pub fn with_level(level: Level, name: impl Into<String>, threshold_us: Option<u64>) -> Self {
        let name = name.into();
        let span = match level {
            Level::TRACE => tracing::trace_span!("perf", name = %name),
            Level::DEBUG => tracing::debug_span!("perf", name = %name),
            Level::INFO => tracing::info_span!("perf", name = %name),
            Level::WARN => tracing::warn_span!("perf", name = %name),
            Level::ERROR => tracing::error_span!("perf", name = %name),
        };

        Self {
            name,
            threshold_us,
            start_time: Instant::now(),
            span,
        }
    }

    /// Name given at construction.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn threshold_us(&self) -> Option<u64> {
        self.threshold_us
    }

    /// Elapsed time since span creation.
    pub fn elapsed_us(&self) -> u64 {
        self.start_time.elapsed().as_micros() as u64
    }

    /// Enter this span's context.
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }

    fn should_log(&self, elapsed_us: u64) -> bool {
        self.threshold_us.map_or(true, |threshold| elapsed_us >= threshold)
    }
}

impl Drop for PerformanceSpan {
    fn drop(&mut self) {
        let elapsed_us = self.elapsed_us();
        if self.should_log(elapsed_us) {
            let _entered = self.span.enter();
            tracing::debug!(
                duration_us = elapsed_us,
                duration_ms = elapsed_us as f64 / 1000.0,
                "performance_span_complete"
            );
        }
    }
}

/// Record a backend selection decision.
///
/// Emitted at `trace` level because it fires once per dispatched operation.
///
/// ```rust
/// use strata_tracing::performance::record_selection;
///
/// record_selection("matmul", "OpenBLAS", "DEFAULT", 512 * 512);
/// ```
pub fn record_selection(operation: &str, path: &str, policy: &str, elements: u64) {
    tracing::trace!(
        event = "selection",
        operation = operation,
        path = path,
        policy = policy,
        elements = elements,
        "backend_selected"
    );
}

/// Record a finished profile export with throughput.
///
/// ```rust
/// use strata_tracing::performance::record_export;
///
/// record_export("/tmp/profile.csv", "csv", 4096, 250);
/// ```
pub fn record_export(destination: &str, format: &str, bytes: usize, duration_us: u64) {
    tracing::debug!(
        event = "export",
        destination = destination,
        format = format,
        bytes = bytes,
        kb = bytes as f64 / 1024.0,
        duration_us = duration_us,
        bandwidth_mbps = bandwidth_mbps(bytes, duration_us),
        "profile_exported"
    );
}

fn bandwidth_mbps(bytes: usize, duration_us: u64) -> f64 {
    if duration_us == 0 {
        return 0.0;
    }
    (bytes as f64 / duration_us as f64) * 1_000_000.0 / (1024.0 * 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn span_keeps_name_and_threshold() {
        let span = PerformanceSpan::new("export", Some(1000));
        assert_eq!(span.name(), "export");
        assert_eq!(span.threshold_us, Some(1000));
    }

    #[test]
    fn span_elapsed_grows() {
        let span = PerformanceSpan::with_level(Level::INFO, "sleep", None);
        thread::sleep(Duration::from_millis(5));
        assert!(span.elapsed_us() >= 5_000);
    }

    #[test]
    fn threshold_filters_short_spans() {
        let span = PerformanceSpan::new("short", Some(1_000));
        assert!(!span.should_log(999));
        assert!(span.should_log(1_000));

        let unfiltered = PerformanceSpan::new("always", None);
        assert!(unfiltered.should_log(0));
    }

    #[test]
    fn bandwidth_of_one_megabyte_per_millisecond() {
        let mbps = bandwidth_mbps(1024 * 1024, 1000);
        assert!((mbps - 1000.0).abs() < 0.01);
        assert_eq!(bandwidth_mbps(10, 0), 0.0);
    }

    #[test]
    fn events_do_not_panic_without_subscriber() {
        record_selection("add", "CPU", "DEFAULT", 8);
        record_export("out.json", "json", 10, 0);
    }
}
