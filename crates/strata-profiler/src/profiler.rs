//! Aggregating operation profiler
//!
//! ## Overhead
//!
//! - **Disabled**: `record` and `start` return after one relaxed atomic load.
//!   No clock is read and nothing is allocated.
//! - **Enabled**: one clock read per boundary, one uncontended lock and a
//!   hash lookup per record. Only the first record of a `(name, context)`
//!   pair allocates.
//!
//! ## Layout
//!
//! Records are aggregated per operation name and per context. Raw spans are
//! kept only when span retention is switched on, up to a fixed capacity;
//! everything beyond it is counted but dropped.

use crate::context::current_context;
use crate::report::{OperationStats, ProfileReport, SessionMetadata};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use strata_backends::KernelPath;

/// Default cap on retained spans
pub const DEFAULT_SPAN_CAPACITY: usize = 65_536;

/// Profiler settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilerConfig {
    /// Keep individual spans for timeline export
    pub retain_spans: bool,
    /// Maximum number of spans kept per session
    pub span_capacity: usize,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            retain_spans: false,
            span_capacity: DEFAULT_SPAN_CAPACITY,
        }
    }
}

/// Running statistics of one `(operation, context)` pair
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRecord {
    count: u64,
    total: Duration,
    min: Duration,
    max: Duration,
    paths: Vec<PathTally>,
}

/// Calls seen on one kernel path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PathTally {
    path: KernelPath,
    count: u64,
    /// Profiler-wide sequence number of the first call on this path
    first_seen: u64,
}

impl OperationRecord {
    fn new() -> Self {
        Self {
            count: 0,
            total: Duration::ZERO,
            min: Duration::MAX,
            max: Duration::ZERO,
            paths: Vec::with_capacity(1),
        }
    }

    fn observe(&mut self, elapsed: Duration, path: KernelPath, sequence: u64) {
        self.count += 1;
        self.total = self.total.saturating_add(elapsed);
        self.min = self.min.min(elapsed);
        self.max = self.max.max(elapsed);
        self.tally(PathTally {
            path,
            count: 1,
            first_seen: sequence,
        });
    }

    fn tally(&mut self, tally: PathTally) {
        match self.paths.iter_mut().find(|seen| seen.path == tally.path) {
            Some(seen) => {
                seen.count += tally.count;
                seen.first_seen = seen.first_seen.min(tally.first_seen);
            }
            None => self.paths.push(tally),
        }
    }

    fn merge(&mut self, other: &OperationRecord) {
        self.count += other.count;
        self.total = self.total.saturating_add(other.total);
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        for &tally in &other.paths {
            self.tally(tally);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn min(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.min
        }
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn average(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos((self.total.as_nanos() / u128::from(self.count)) as u64)
    }

    /// Most frequently observed path; the first one seen wins a tie,
    /// also across merged contexts
    pub fn primary_backend(&self) -> KernelPath {
        self.paths
            .iter()
            .min_by_key(|tally| (std::cmp::Reverse(tally.count), tally.first_seen))
            .map_or(KernelPath::Scalar, |tally| tally.path)
    }

    fn to_stats(&self, operation: &str) -> OperationStats {
        OperationStats {
            operation: operation.to_string(),
            count: self.count,
            total_time_ms: millis(self.total),
            avg_time_ms: if self.count == 0 {
                0.0
            } else {
                millis(self.total) / self.count as f64
            },
            min_time_ms: millis(self.min()),
            max_time_ms: millis(self.max),
            primary_backend: self.primary_backend(),
            percent_total: 0.0,
        }
    }
}

/// One timed dispatch, kept when span retention is on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanRecord {
    pub name: String,
    pub path: KernelPath,
    pub context: Option<String>,
    /// Offset from the session epoch, microseconds
    pub start_us: u64,
    pub duration_us: u64,
    /// Small per-process thread number
    pub thread: u64,
}

/// Retained spans plus the number that did not fit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanSnapshot {
    pub spans: Vec<SpanRecord>,
    pub dropped: u64,
}

static NEXT_THREAD_NUMBER: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_NUMBER: u64 = NEXT_THREAD_NUMBER.fetch_add(1, Ordering::Relaxed);
}

fn current_thread_number() -> u64 {
    THREAD_NUMBER.try_with(|n| *n).unwrap_or(0)
}

fn millis(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

fn unix_millis_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as u64)
}

#[derive(Debug)]
struct Session {
    id: String,
    started_at_unix_ms: u64,
}

impl Session {
    fn start() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            started_at_unix_ms: unix_millis_now(),
        }
    }
}

#[derive(Debug)]
struct SpanLog {
    epoch: Instant,
    spans: Vec<SpanRecord>,
    dropped: u64,
}

type RecordTable = HashMap<String, HashMap<Option<Arc<str>>, OperationRecord>>;

/// Thread-safe operation profiler
#[derive(Debug)]
pub struct Profiler {
    enabled: AtomicBool,
    retain_spans: AtomicBool,
    span_capacity: usize,
    records: Mutex<RecordTable>,
    /// Orders first observations across contexts; advanced under `records`
    sequence: AtomicU64,
    spans: Mutex<SpanLog>,
    session: RwLock<Session>,
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new(ProfilerConfig::default())
    }
}

impl Profiler {
    /// Create a disabled profiler
    pub fn new(config: ProfilerConfig) -> Self {
        Self {
            enabled: AtomicBool::new(false),
            retain_spans: AtomicBool::new(config.retain_spans),
            span_capacity: config.span_capacity,
            records: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(0),
            spans: Mutex::new(SpanLog {
                epoch: Instant::now(),
                spans: Vec::new(),
                dropped: 0,
            }),
            session: RwLock::new(Session::start()),
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn enable(&self) {
        if !self.enabled.swap(true, Ordering::Relaxed) {
            tracing::debug!("profiling_enabled");
        }
    }

    pub fn disable(&self) {
        if self.enabled.swap(false, Ordering::Relaxed) {
            tracing::debug!("profiling_disabled");
        }
    }

    pub fn retains_spans(&self) -> bool {
        self.retain_spans.load(Ordering::Relaxed)
    }

    /// Switch raw span retention on or off for subsequent records
    pub fn set_span_retention(&self, retain: bool) {
        if self.retain_spans.swap(retain, Ordering::Relaxed) != retain {
            tracing::debug!(retain, capacity = self.span_capacity, "span_retention_changed");
        }
    }

    /// Fold one observation into the aggregate table
    #[inline]
    pub fn record(&self, operation: &str, elapsed: Duration, path: KernelPath) {
        if !self.is_enabled() {
            return;
        }
        self.observe(operation, current_context(), elapsed, path);
    }

    /// Start timing a dispatch; `None` while profiling is disabled
    #[inline]
    pub fn start<'a>(&'a self, operation: &'a str, path: KernelPath) -> Option<DispatchTimer<'a>> {
        if !self.is_enabled() {
            return None;
        }
        Some(DispatchTimer {
            profiler: self,
            operation,
            path,
            started: Instant::now(),
            armed: true,
        })
    }

    /// Record a finished dispatch that started at `started`
    pub fn record_span(&self, operation: &str, started: Instant, elapsed: Duration, path: KernelPath) {
        if !self.is_enabled() {
            return;
        }
        let context = current_context();
        if self.retains_spans() {
            self.push_span(operation, context.as_deref(), started, elapsed, path);
        }
        self.observe(operation, context, elapsed, path);
    }

    fn observe(&self, operation: &str, context: Option<Arc<str>>, elapsed: Duration, path: KernelPath) {
        let mut records = self.records.lock();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        if let Some(per_context) = records.get_mut(operation) {
            per_context
                .entry(context)
                .or_insert_with(OperationRecord::new)
                .observe(elapsed, path, sequence);
            return;
        }
        records
            .entry(operation.to_string())
            .or_default()
            .entry(context)
            .or_insert_with(OperationRecord::new)
            .observe(elapsed, path, sequence);
    }

    fn push_span(&self, operation: &str, context: Option<&str>, started: Instant, elapsed: Duration, path: KernelPath) {
        let mut log = self.spans.lock();
        if log.spans.len() >= self.span_capacity {
            log.dropped += 1;
            return;
        }
        let start_us = started.saturating_duration_since(log.epoch).as_micros() as u64;
        log.spans.push(SpanRecord {
            name: operation.to_string(),
            path,
            context: context.map(str::to_string),
            start_us,
            duration_us: elapsed.as_micros() as u64,
            thread: current_thread_number(),
        });
    }

    /// Drop every record and span and start a new session
    ///
    /// The enabled flag is left alone.
    pub fn clear(&self) {
        self.records.lock().clear();
        {
            let mut log = self.spans.lock();
            log.spans.clear();
            log.dropped = 0;
            log.epoch = Instant::now();
        }
        *self.session.write() = Session::start();
        tracing::debug!("profile_cleared");
    }

    /// Snapshot of the aggregate table
    ///
    /// Without a filter, records of the same operation from every context are
    /// merged. With a filter, only records tagged with exactly that context
    /// are included.
    pub fn report(&self, context: Option<&str>) -> ProfileReport {
        let metadata = self.metadata(context);
        let records = self.records.lock();

        let stats = records.iter().filter_map(|(operation, per_context)| match context {
            Some(wanted) => per_context
                .iter()
                .find(|(tag, _)| tag.as_deref() == Some(wanted))
                .map(|(_, record)| record.to_stats(operation)),
            None => merge_contexts(per_context).map(|record| record.to_stats(operation)),
        });

        ProfileReport::from_operations(metadata, stats)
    }

    /// Copy of the retained spans
    pub fn spans(&self) -> SpanSnapshot {
        let log = self.spans.lock();
        SpanSnapshot {
            spans: log.spans.clone(),
            dropped: log.dropped,
        }
    }

    pub fn session_id(&self) -> String {
        self.session.read().id.clone()
    }

    fn metadata(&self, context: Option<&str>) -> SessionMetadata {
        let session = self.session.read();
        SessionMetadata {
            session_id: session.id.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            context: context.map(str::to_string),
            started_at_unix_ms: session.started_at_unix_ms,
        }
    }
}

/// Merge all contexts of one operation in a stable order
fn merge_contexts(per_context: &HashMap<Option<Arc<str>>, OperationRecord>) -> Option<OperationRecord> {
    let mut tagged: Vec<(&Option<Arc<str>>, &OperationRecord)> = per_context.iter().collect();
    tagged.sort_by(|a, b| a.0.cmp(b.0));

    let mut iter = tagged.into_iter().map(|(_, record)| record);
    let mut merged = iter.next()?.clone();
    for record in iter {
        merged.merge(record);
    }
    Some(merged)
}

/// Records the elapsed time of a dispatch when dropped
#[must_use = "the dispatch is recorded when the timer is dropped"]
#[derive(Debug)]
pub struct DispatchTimer<'a> {
    profiler: &'a Profiler,
    operation: &'a str,
    path: KernelPath,
    started: Instant,
    armed: bool,
}

impl DispatchTimer<'_> {
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Stop without recording, for dispatches that failed
    pub fn cancel(mut self) {
        self.armed = false;
    }
}

impl Drop for DispatchTimer<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let elapsed = self.started.elapsed();
        self.profiler.record_span(self.operation, self.started, elapsed, self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::context_scope;

    fn enabled() -> Profiler {
        let profiler = Profiler::default();
        profiler.enable();
        profiler
    }

    #[test]
    fn disabled_profiler_records_nothing() {
        let profiler = Profiler::default();
        for _ in 0..100 {
            profiler.record("add", Duration::from_micros(10), KernelPath::Simd);
            assert!(profiler.start("add", KernelPath::Simd).is_none());
        }
        assert!(profiler.report(None).is_empty());
    }

    #[test]
    fn counts_and_extremes_accumulate() {
        let profiler = enabled();
        for ms in [1, 3, 2] {
            profiler.record("add", Duration::from_millis(ms), KernelPath::Simd);
        }
        let report = profiler.report(None);
        let add = report.get("add").unwrap();
        assert_eq!(add.count, 3);
        assert_eq!(add.total_time_ms, 6.0);
        assert_eq!(add.avg_time_ms, 2.0);
        assert_eq!(add.min_time_ms, 1.0);
        assert_eq!(add.max_time_ms, 3.0);
        assert_eq!(add.percent_total, 100.0);
    }

    #[test]
    fn primary_backend_is_most_frequent_first_seen_on_tie() {
        let profiler = enabled();
        profiler.record("matmul", Duration::from_millis(1), KernelPath::Blas);
        profiler.record("matmul", Duration::from_millis(1), KernelPath::Simd);
        assert_eq!(profiler.report(None).get("matmul").unwrap().primary_backend, KernelPath::Blas);

        profiler.record("matmul", Duration::from_millis(1), KernelPath::Simd);
        assert_eq!(profiler.report(None).get("matmul").unwrap().primary_backend, KernelPath::Simd);
    }

    #[test]
    fn merged_contexts_keep_first_seen_backend_on_tie() {
        let profiler = enabled();
        {
            let _scope = context_scope("zeta");
            profiler.record("matmul", Duration::from_millis(1), KernelPath::Simd);
        }
        profiler.record("matmul", Duration::from_millis(1), KernelPath::Blas);

        let merged = profiler.report(None);
        assert_eq!(merged.get("matmul").unwrap().count, 2);
        assert_eq!(merged.get("matmul").unwrap().primary_backend, KernelPath::Simd);
        assert_eq!(
            profiler.report(Some("zeta")).get("matmul").unwrap().primary_backend,
            KernelPath::Simd
        );
    }

    #[test]
    fn context_filter_selects_tagged_records() {
        let profiler = enabled();
        profiler.record("add", Duration::from_millis(1), KernelPath::Scalar);
        {
            let _scope = context_scope("training");
            profiler.record("add", Duration::from_millis(2), KernelPath::Scalar);
            profiler.record("relu", Duration::from_millis(4), KernelPath::Simd);
        }

        let all = profiler.report(None);
        assert_eq!(all.get("add").unwrap().count, 2);
        assert_eq!(all.operation_count, 2);

        let training = profiler.report(Some("training"));
        assert_eq!(training.metadata.context.as_deref(), Some("training"));
        assert_eq!(training.get("add").unwrap().count, 1);
        assert_eq!(training.total_time_ms, 6.0);

        assert!(profiler.report(Some("inference")).is_empty());
    }

    #[test]
    fn clear_resets_table_and_session_but_not_flag() {
        let profiler = enabled();
        let before = profiler.session_id();
        profiler.record("add", Duration::from_millis(1), KernelPath::Scalar);
        profiler.clear();

        let report = profiler.report(None);
        assert!(report.is_empty());
        assert_eq!(report.total_time_ms, 0.0);
        assert_ne!(profiler.session_id(), before);
        assert!(profiler.is_enabled());
    }

    #[test]
    fn timer_records_on_drop() {
        let profiler = enabled();
        {
            let _timer = profiler.start("sum", KernelPath::Simd);
            std::thread::sleep(Duration::from_millis(2));
        }
        let report = profiler.report(None);
        let sum = report.get("sum").unwrap();
        assert_eq!(sum.count, 1);
        assert!(sum.total_time_ms >= 2.0);
        assert!(profiler.spans().spans.is_empty());
    }

    #[test]
    fn cancelled_timer_records_nothing() {
        let profiler = enabled();
        if let Some(timer) = profiler.start("div", KernelPath::Scalar) {
            timer.cancel();
        }
        assert!(profiler.report(None).get("div").is_none());
    }

    #[test]
    fn spans_are_capped() {
        let profiler = Profiler::new(ProfilerConfig {
            retain_spans: true,
            span_capacity: 2,
        });
        profiler.enable();
        for _ in 0..5 {
            drop(profiler.start("add", KernelPath::Scalar));
        }
        let snapshot = profiler.spans();
        assert_eq!(snapshot.spans.len(), 2);
        assert_eq!(snapshot.dropped, 3);
        assert_eq!(profiler.report(None).get("add").unwrap().count, 5);
    }

    #[test]
    fn spans_carry_context_and_thread() {
        let profiler = enabled();
        profiler.set_span_retention(true);
        {
            let _scope = context_scope("epoch-1");
            drop(profiler.start("matmul", KernelPath::Blas));
        }
        let span = &profiler.spans().spans[0];
        assert_eq!(span.name, "matmul");
        assert_eq!(span.context.as_deref(), Some("epoch-1"));
        assert_eq!(span.path, KernelPath::Blas);
        assert!(span.thread >= 1);
    }

    #[test]
    fn concurrent_records_are_all_counted() {
        let profiler = Arc::new(enabled());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let profiler = profiler.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        profiler.record("add", Duration::from_micros(5), KernelPath::Simd);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(profiler.report(None).get("add").unwrap().count, 1000);
    }
}
