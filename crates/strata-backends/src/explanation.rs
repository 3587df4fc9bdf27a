//! Most recent dispatch decision, kept for diagnostics

use crate::policy::BackendPolicy;
use crate::selector::Selection;
use crate::types::{KernelPath, OperationProperties};
use parking_lot::Mutex;
use std::fmt;
use std::time::Instant;

/// Text returned when nothing has been dispatched yet
pub const NO_DISPATCH: &str = "no dispatch recorded";

/// Why the last operation ran where it did
#[derive(Debug, Clone)]
pub struct DispatchExplanation {
    pub operation: String,
    pub path: KernelPath,
    pub policy: BackendPolicy,
    pub reason: String,
    /// `size=MxKxN` for matmuls, `elements=N` otherwise
    pub shape: String,
    pub recorded_at: Instant,
}

impl DispatchExplanation {
    pub fn new(operation: &str, selection: &Selection, props: &OperationProperties, policy: BackendPolicy) -> Self {
        Self {
            operation: operation.to_string(),
            path: selection.path,
            policy,
            reason: selection.reason.clone(),
            shape: props.describe(),
            recorded_at: Instant::now(),
        }
    }

    /// `"<op> → <path> (<reason>, <size>, policy=<policy>, <age>µs ago)"`
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DispatchExplanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} → {} ({}, {}, policy={}, {}µs ago)",
            self.operation,
            self.path,
            self.reason,
            self.shape,
            self.policy,
            self.recorded_at.elapsed().as_micros()
        )
    }
}

/// Single slot, last writer wins
#[derive(Debug, Default)]
pub struct ExplanationSlot {
    last: Mutex<Option<DispatchExplanation>>,
}

impl ExplanationSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, explanation: DispatchExplanation) {
        *self.last.lock() = Some(explanation);
    }

    pub fn latest(&self) -> Option<DispatchExplanation> {
        self.last.lock().clone()
    }

    /// Rendered latest explanation, or [`NO_DISPATCH`]
    pub fn describe(&self) -> String {
        self.last
            .lock()
            .as_ref()
            .map_or_else(|| NO_DISPATCH.to_string(), DispatchExplanation::render)
    }

    pub fn clear(&self) {
        *self.last.lock() = None;
    }
}
