//! Profile snapshots
//!
//! A [`ProfileReport`] is an immutable, serializable view of the aggregate
//! table at one point in time. Exported JSON files have exactly this layout
//! and load back into the same value.

use crate::error::{ProfilerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use strata_backends::KernelPath;

/// Identity of a profiling session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Random id, regenerated by `clear()`
    pub session_id: String,
    /// Library version that produced the report
    pub version: String,
    /// Context filter the report was taken with, if any
    pub context: Option<String>,
    /// Session start, milliseconds since the Unix epoch
    pub started_at_unix_ms: u64,
}

/// Aggregate statistics of one operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationStats {
    pub operation: String,
    pub count: u64,
    pub total_time_ms: f64,
    pub avg_time_ms: f64,
    pub min_time_ms: f64,
    pub max_time_ms: f64,
    /// Most frequently observed kernel path
    pub primary_backend: KernelPath,
    /// Share of the report's total time, 0 to 100
    pub percent_total: f64,
}

/// Snapshot of every operation recorded in a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileReport {
    pub metadata: SessionMetadata,
    pub operations: BTreeMap<String, OperationStats>,
    pub total_time_ms: f64,
    /// Number of distinct operations
    pub operation_count: u64,
}

impl ProfileReport {
    /// Report without operations
    pub fn empty(metadata: SessionMetadata) -> Self {
        Self {
            metadata,
            operations: BTreeMap::new(),
            total_time_ms: 0.0,
            operation_count: 0,
        }
    }

    /// Build a report from per-operation stats, filling in `percent_total`
    pub fn from_operations(metadata: SessionMetadata, stats: impl IntoIterator<Item = OperationStats>) -> Self {
        let mut operations: BTreeMap<String, OperationStats> =
            stats.into_iter().map(|op| (op.operation.clone(), op)).collect();

        let total_time_ms: f64 = operations.values().map(|op| op.total_time_ms).sum();
        for op in operations.values_mut() {
            op.percent_total = if total_time_ms > 0.0 {
                op.total_time_ms / total_time_ms * 100.0
            } else {
                0.0
            };
        }

        Self {
            metadata,
            operation_count: operations.len() as u64,
            operations,
            total_time_ms,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn get(&self, operation: &str) -> Option<&OperationStats> {
        self.operations.get(operation)
    }

    /// Operations sorted by descending total time, name breaking ties
    pub fn by_total_time(&self) -> Vec<&OperationStats> {
        let mut ops: Vec<&OperationStats> = self.operations.values().collect();
        ops.sort_by(|a, b| {
            b.total_time_ms
                .total_cmp(&a.total_time_ms)
                .then_with(|| a.operation.cmp(&b.operation))
        });
        ops
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a report previously written by the JSON exporter
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ProfilerError::io(path, source))?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn metadata() -> SessionMetadata {
        SessionMetadata {
            session_id: "test-session".to_string(),
            version: "0.0.0".to_string(),
            context: None,
            started_at_unix_ms: 0,
        }
    }

    pub(crate) fn stats(operation: &str, count: u64, total_ms: f64, path: KernelPath) -> OperationStats {
        let avg = if count == 0 { 0.0 } else { total_ms / count as f64 };
        OperationStats {
            operation: operation.to_string(),
            count,
            total_time_ms: total_ms,
            avg_time_ms: avg,
            min_time_ms: avg,
            max_time_ms: avg,
            primary_backend: path,
            percent_total: 0.0,
        }
    }

    #[test]
    fn percentages_are_filled_in() {
        let report = ProfileReport::from_operations(
            metadata(),
            [
                stats("matmul", 2, 75.0, KernelPath::Blas),
                stats("add", 10, 25.0, KernelPath::Simd),
            ],
        );
        assert_eq!(report.total_time_ms, 100.0);
        assert_eq!(report.operation_count, 2);
        assert_eq!(report.get("matmul").unwrap().percent_total, 75.0);
        assert_eq!(report.get("add").unwrap().percent_total, 25.0);

        let order: Vec<&str> = report.by_total_time().iter().map(|op| op.operation.as_str()).collect();
        assert_eq!(order, ["matmul", "add"]);
    }

    #[test]
    fn zero_total_yields_zero_percent() {
        let report = ProfileReport::from_operations(metadata(), [stats("noop", 3, 0.0, KernelPath::Scalar)]);
        assert_eq!(report.get("noop").unwrap().percent_total, 0.0);
    }

    #[test]
    fn json_layout_uses_labels() {
        let report = ProfileReport::from_operations(metadata(), [stats("add", 1, 1.5, KernelPath::Simd)]);
        let value = report.to_value().unwrap();
        assert_eq!(value["operations"]["add"]["primary_backend"], "CPU-SIMD");
        assert_eq!(value["metadata"]["session_id"], "test-session");
        assert_eq!(value["operation_count"], 1);

        let back = ProfileReport::from_json(&report.to_json().unwrap()).unwrap();
        assert_eq!(back, report);
    }
}
