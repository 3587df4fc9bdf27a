//! Convenience macros for performance tracing

/// Create a [`crate::performance::PerformanceSpan`].
///
/// Without an explicit threshold the process-wide default from
/// [`crate::performance::default_threshold`] applies.
///
/// ```rust
/// use strata_tracing::perf_span;
///
/// {
///     let _span = perf_span!("format_table");
///     let _filtered = perf_span!("write_csv", 500);
/// }
/// ```
#[macro_export]
macro_rules! perf_span {
    ($name:expr) => {{
        $crate::performance::PerformanceSpan::new($name, $crate::performance::default_threshold())
    }};
    ($name:expr, $threshold_us:expr) => {{
        $crate::performance::PerformanceSpan::new($name, Some($threshold_us))
    }};
}

/// Execute a block with automatic timing.
///
/// Returns `(result, duration_in_microseconds)` and emits a `debug` event.
///
/// ```rust
/// use strata_tracing::timed_block;
///
/// let (sum, duration_us) = timed_block!("sum_calculation", {
///     (1..=100).sum::<i32>()
/// });
/// assert_eq!(sum, 5050);
/// # let _ = duration_us;
/// ```
#[macro_export]
macro_rules! timed_block {
    ($name:expr, $block:block) => {{
        let start = std::time::Instant::now();
        let result = $block;
        let duration_us = start.elapsed().as_micros() as u64;
        $crate::debug!(
            operation = $name,
            duration_us = duration_us,
            duration_ms = duration_us as f64 / 1000.0,
            "timed_block_complete"
        );
        (result, duration_us)
    }};
}
