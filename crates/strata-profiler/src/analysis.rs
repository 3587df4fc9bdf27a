//! Bottleneck, recommendation and regression analysis over report snapshots
//!
//! Every function here is infallible and returns an empty list for an empty
//! report.

use crate::error::Result;
use crate::report::{OperationStats, ProfileReport};
use serde::{Deserialize, Serialize};
use std::path::Path;
use strata_backends::BackendType;

/// Default share of total time above which an operation is a bottleneck
pub const DEFAULT_BOTTLENECK_THRESHOLD: f64 = 0.20;

/// Default slowdown ratio above which an operation has regressed
pub const DEFAULT_REGRESSION_THRESHOLD: f64 = 1.2;

const CRITICAL_SHARE: f64 = 0.5;

// ============================================================================
// Bottlenecks
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bottleneck {
    pub operation: String,
    pub percent_total: f64,
    pub time_ms: f64,
    pub severity: Severity,
    pub reason: String,
    pub suggestion: String,
}

/// Operations whose share of total time exceeds `threshold` (0.0 to 1.0)
///
/// Heaviest first. More than half of the total is `Critical`.
pub fn detect_bottlenecks(report: &ProfileReport, threshold: f64) -> Vec<Bottleneck> {
    let mut found: Vec<Bottleneck> = report
        .operations
        .values()
        .filter_map(|op| {
            let share = op.percent_total / 100.0;
            (share > threshold).then(|| Bottleneck {
                operation: op.operation.clone(),
                percent_total: op.percent_total,
                time_ms: op.total_time_ms,
                severity: if share > CRITICAL_SHARE {
                    Severity::Critical
                } else {
                    Severity::High
                },
                reason: format!("Takes {:.1}% of execution time", op.percent_total),
                suggestion: "Check input size or switch backend".to_string(),
            })
        })
        .collect();

    found.sort_by(|a, b| {
        b.percent_total
            .total_cmp(&a.percent_total)
            .then_with(|| a.operation.cmp(&b.operation))
    });
    found
}

// ============================================================================
// Recommendations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Operation the advice is about
    pub operation: String,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub estimated_speedup: String,
    pub example: String,
}

/// Condition a rule checks against one operation's statistics
#[derive(Debug, Clone, PartialEq)]
pub enum RulePredicate {
    /// Named operation running on a CPU path with a slow average
    SlowOnCpu { operation: String, min_avg_ms: f64 },
    /// Cheap elementwise operation called very often
    ManyTinyCalls {
        operations: Vec<String>,
        min_calls: u64,
        max_avg_ms: f64,
    },
    /// Operation holding more than `min_percent` of total time
    Dominates { min_percent: f64 },
    /// Worst call far slower than the average
    Erratic { max_over_avg: f64, min_calls: u64 },
}

impl RulePredicate {
    pub fn matches(&self, op: &OperationStats) -> bool {
        match self {
            RulePredicate::SlowOnCpu { operation, min_avg_ms } => {
                op.operation == *operation
                    && op.primary_backend.backend() == BackendType::Cpu
                    && op.avg_time_ms > *min_avg_ms
            }
            RulePredicate::ManyTinyCalls {
                operations,
                min_calls,
                max_avg_ms,
            } => operations.contains(&op.operation) && op.count >= *min_calls && op.avg_time_ms < *max_avg_ms,
            RulePredicate::Dominates { min_percent } => op.percent_total > *min_percent,
            RulePredicate::Erratic {
                max_over_avg,
                min_calls,
            } => op.count >= *min_calls && op.avg_time_ms > 0.0 && op.max_time_ms > op.avg_time_ms * max_over_avg,
        }
    }
}

/// Advice produced when a predicate matches
#[derive(Debug, Clone)]
pub struct RuleAction {
    pub priority: Priority,
    pub title: String,
    pub describe: fn(&OperationStats) -> String,
    pub estimated_speedup: String,
    pub example: String,
}

#[derive(Debug, Clone)]
pub struct RecommendationRule {
    pub predicate: RulePredicate,
    pub action: RuleAction,
}

impl RecommendationRule {
    fn apply(&self, op: &OperationStats) -> Option<Recommendation> {
        self.predicate.matches(op).then(|| Recommendation {
            operation: op.operation.clone(),
            priority: self.action.priority,
            title: self.action.title.clone(),
            description: (self.action.describe)(op),
            estimated_speedup: self.action.estimated_speedup.clone(),
            example: self.action.example.clone(),
        })
    }
}

const ELEMENTWISE_OPERATIONS: [&str; 8] = ["add", "sub", "mul", "div", "relu", "exp", "neg", "sqrt"];

/// Built-in rules in evaluation order
pub fn default_rules() -> Vec<RecommendationRule> {
    vec![
        RecommendationRule {
            predicate: RulePredicate::SlowOnCpu {
                operation: "matmul".to_string(),
                min_avg_ms: 10.0,
            },
            action: RuleAction {
                priority: Priority::High,
                title: "Enable GPU for Matrix Multiplication".to_string(),
                describe: |op| format!("{} is taking {:.1}ms per call on CPU.", op.operation, op.avg_time_ms),
                estimated_speedup: "10x-50x".to_string(),
                example: "strata::set_backend_policy(BackendPolicy::Cuda)".to_string(),
            },
        },
        RecommendationRule {
            predicate: RulePredicate::ManyTinyCalls {
                operations: ELEMENTWISE_OPERATIONS.iter().map(|name| name.to_string()).collect(),
                min_calls: 1_000,
                max_avg_ms: 0.01,
            },
            action: RuleAction {
                priority: Priority::Medium,
                title: "Batch or fuse small elementwise operations".to_string(),
                describe: |op| {
                    format!(
                        "{} ran {} times at {:.4}ms each; dispatch overhead dominates.",
                        op.operation, op.count, op.avg_time_ms
                    )
                },
                estimated_speedup: "2x-5x".to_string(),
                example: "combine inputs into one larger tensor before calling the operation".to_string(),
            },
        },
        RecommendationRule {
            predicate: RulePredicate::Dominates { min_percent: 50.0 },
            action: RuleAction {
                priority: Priority::High,
                title: "Investigate dominant operation".to_string(),
                describe: |op| format!("{} accounts for {:.1}% of profiled time.", op.operation, op.percent_total),
                estimated_speedup: "depends on the operation".to_string(),
                example: "strata::with_context(\"suspect\", || { /* narrow down the hot call site */ })".to_string(),
            },
        },
        RecommendationRule {
            predicate: RulePredicate::Erratic {
                max_over_avg: 10.0,
                min_calls: 10,
            },
            action: RuleAction {
                priority: Priority::Low,
                title: "Warm up or cache variable operation".to_string(),
                describe: |op| {
                    format!(
                        "{} peaks at {:.2}ms against a {:.3}ms average.",
                        op.operation, op.max_time_ms, op.avg_time_ms
                    )
                },
                estimated_speedup: "1.2x-2x".to_string(),
                example: "run one untimed warm-up call before the measured loop".to_string(),
            },
        },
    ]
}

/// Apply `rules` in order to every operation, heaviest operation first
pub fn recommendations_with(report: &ProfileReport, rules: &[RecommendationRule]) -> Vec<Recommendation> {
    let ops = report.by_total_time();
    rules
        .iter()
        .flat_map(|rule| ops.iter().filter_map(move |op| rule.apply(op)))
        .collect()
}

/// Apply the built-in rule table
pub fn get_recommendations(report: &ProfileReport) -> Vec<Recommendation> {
    recommendations_with(report, &default_rules())
}

// ============================================================================
// Regressions
// ============================================================================

/// Reference profile for regression checks
#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    report: ProfileReport,
}

impl Baseline {
    pub fn from_report(report: ProfileReport) -> Self {
        Self { report }
    }

    /// Load a JSON export
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        ProfileReport::load(path).map(Self::from_report)
    }

    pub fn report(&self) -> &ProfileReport {
        &self.report
    }
}

impl From<ProfileReport> for Baseline {
    fn from(report: ProfileReport) -> Self {
        Self::from_report(report)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Regression {
    pub operation: String,
    pub baseline_ms: f64,
    pub actual_ms: f64,
    pub slowdown_factor: f64,
    pub causes: Vec<String>,
}

/// Operations whose average time grew by more than `threshold` times
///
/// Only operations present in both reports with a positive baseline average
/// are compared. Largest slowdown first.
pub fn detect_regressions(current: &ProfileReport, baseline: &Baseline, threshold: f64) -> Vec<Regression> {
    let mut found: Vec<Regression> = current
        .operations
        .iter()
        .filter_map(|(name, now)| {
            let before = baseline.report.get(name)?;
            if before.avg_time_ms <= 0.0 {
                return None;
            }
            let ratio = now.avg_time_ms / before.avg_time_ms;
            (ratio > threshold).then(|| Regression {
                operation: name.clone(),
                baseline_ms: before.avg_time_ms,
                actual_ms: now.avg_time_ms,
                slowdown_factor: ratio,
                causes: likely_causes(before, now),
            })
        })
        .collect();

    found.sort_by(|a, b| {
        b.slowdown_factor
            .total_cmp(&a.slowdown_factor)
            .then_with(|| a.operation.cmp(&b.operation))
    });
    found
}

fn likely_causes(before: &OperationStats, now: &OperationStats) -> Vec<String> {
    let mut causes = Vec::with_capacity(3);
    if before.primary_backend != now.primary_backend {
        causes.push(format!(
            "Backend changed from {} to {}",
            before.primary_backend, now.primary_backend
        ));
    }
    causes.push("Increased data size".to_string());
    causes.push("Change in algorithm".to_string());
    causes
}
