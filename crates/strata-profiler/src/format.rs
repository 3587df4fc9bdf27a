//! In-memory report renderings

use crate::error::{ProfilerError, Result};
use crate::report::ProfileReport;
use std::fmt::{self, Write as _};
use std::str::FromStr;

const RULE_WIDTH: usize = 80;

/// Rendering returned by [`render`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportFormat {
    /// Fixed-width table, sorted by total time
    Table,
    /// Pretty JSON text
    Json,
    /// Structured `serde_json::Value`
    Dict,
    /// One line per operation
    Compact,
}

impl FromStr for ReportFormat {
    type Err = ProfilerError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "table" => Ok(ReportFormat::Table),
            "json" => Ok(ReportFormat::Json),
            "dict" => Ok(ReportFormat::Dict),
            "compact" => Ok(ReportFormat::Compact),
            other => Err(ProfilerError::configuration(format!(
                "unknown report format '{other}' (expected table, json, dict or compact)"
            ))),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportFormat::Table => "table",
            ReportFormat::Json => "json",
            ReportFormat::Dict => "dict",
            ReportFormat::Compact => "compact",
        })
    }
}

/// Text or structured rendering of a report
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedReport {
    Text(String),
    Mapping(serde_json::Value),
}

impl RenderedReport {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RenderedReport::Text(text) => Some(text),
            RenderedReport::Mapping(_) => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&serde_json::Value> {
        match self {
            RenderedReport::Text(_) => None,
            RenderedReport::Mapping(value) => Some(value),
        }
    }
}

impl fmt::Display for RenderedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderedReport::Text(text) => f.write_str(text),
            RenderedReport::Mapping(value) => write!(f, "{value}"),
        }
    }
}

pub fn render(report: &ProfileReport, format: ReportFormat) -> Result<RenderedReport> {
    let _span = strata_tracing::perf_span!("render_report");
    Ok(match format {
        ReportFormat::Table => RenderedReport::Text(table(report)),
        ReportFormat::Json => RenderedReport::Text(report.to_json()?),
        ReportFormat::Dict => RenderedReport::Mapping(report.to_value()?),
        ReportFormat::Compact => RenderedReport::Text(compact(report)),
    })
}

/// Fixed-width table with banner, header rule and footer banner
pub fn table(report: &ProfileReport) -> String {
    let banner = "=".repeat(RULE_WIDTH);
    let mut out = String::new();

    let _ = writeln!(out, "{banner}");
    let _ = writeln!(out, "STRATA PROFILE REPORT (Total: {:.2}ms)", report.total_time_ms);
    if let Some(context) = &report.metadata.context {
        let _ = writeln!(out, "Context: {context}");
    }
    let _ = writeln!(out, "{banner}");
    let _ = writeln!(
        out,
        "{:<20} {:<8} {:<10} {:<10} {:<6} {}",
        "Operation", "Count", "Total(ms)", "Avg(ms)", "%", "Backend"
    );
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));

    for op in report.by_total_time() {
        let _ = writeln!(
            out,
            "{:<20} {:<8} {:<10.2} {:<10.3} {:<6.1} {}",
            op.operation, op.count, op.total_time_ms, op.avg_time_ms, op.percent_total, op.primary_backend
        );
    }

    out.push_str(&banner);
    out
}

/// One line per operation, heaviest first
pub fn compact(report: &ProfileReport) -> String {
    if report.is_empty() {
        return "no operations recorded".to_string();
    }
    report
        .by_total_time()
        .into_iter()
        .map(|op| {
            format!(
                "{}: {} calls, {:.2}ms total, {:.3}ms avg, {:.1}% [{}]",
                op.operation, op.count, op.total_time_ms, op.avg_time_ms, op.percent_total, op.primary_backend
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::{metadata, stats};
    use strata_backends::KernelPath;

    fn sample() -> ProfileReport {
        ProfileReport::from_operations(
            metadata(),
            [
                stats("add", 4, 10.0, KernelPath::Simd),
                stats("matmul", 2, 30.0, KernelPath::Blas),
            ],
        )
    }

    #[test]
    fn table_has_banner_and_sorted_rows() {
        let text = table(&sample());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "=".repeat(80));
        assert_eq!(lines[1], "STRATA PROFILE REPORT (Total: 40.00ms)");
        assert!(lines[3].starts_with("Operation            Count    Total(ms)"));
        assert_eq!(lines[4], "-".repeat(80));
        assert!(lines[5].starts_with("matmul"));
        assert!(lines[5].ends_with("BLAS"));
        assert!(lines[6].starts_with("add"));
        assert_eq!(*lines.last().unwrap(), "=".repeat(80));
    }

    #[test]
    fn table_shows_context_line() {
        let mut report = sample();
        report.metadata.context = Some("training".to_string());
        assert!(table(&report).lines().any(|line| line == "Context: training"));
    }

    #[test]
    fn compact_lists_heaviest_first() {
        let text = compact(&sample());
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "matmul: 2 calls, 30.00ms total, 15.000ms avg, 75.0% [BLAS]"
        );
        assert!(lines.next().unwrap().starts_with("add: 4 calls"));

        let empty = ProfileReport::empty(metadata());
        assert_eq!(compact(&empty), "no operations recorded");
    }

    #[test]
    fn dict_and_json_agree() {
        let report = sample();
        let dict = render(&report, ReportFormat::Dict).unwrap();
        let json = render(&report, ReportFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(json.as_text().unwrap()).unwrap();
        assert_eq!(dict.as_mapping().unwrap(), &parsed);
    }

    #[test]
    fn format_names_parse() {
        assert_eq!("TABLE".parse::<ReportFormat>().unwrap(), ReportFormat::Table);
        assert!(matches!(
            "yaml".parse::<ReportFormat>(),
            Err(ProfilerError::Configuration(_))
        ));
    }
}
