//! Plain-text rendering of an analysis result.

use fairscope_core::{AnalysisResult, FairnessSummary, MetricValue};
use std::fmt::Write;

const RULE: &str = "──────────────────────────────────────────────────────────";

/// Render the full human-readable report.
pub fn render(result: &AnalysisResult, summary: &FairnessSummary) -> Result<String, std::fmt::Error> {
    let mut out = String::new();

    writeln!(out, "Fairness Analysis")?;
    writeln!(out, "{RULE}")?;
    writeln!(out, "Run:        {}", result.run_id)?;
    writeln!(out, "Timestamp:  {}", result.timestamp.format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(out, "Records:    {}", result.record_count)?;
    writeln!(out, "Attributes: {}", result.protected_attributes.join(", "))?;
    writeln!(out)?;

    writeln!(
        out,
        "Overall Fairness: {}  ({})  {}",
        summary.overall_fairness, summary.overall_severity, summary.risk_level
    )?;
    writeln!(out)?;

    writeln!(out, "{:<22} {:>12}  Status", "Metric", "Overall")?;
    for status in &summary.metrics {
        writeln!(
            out,
            "{:<22} {:>12}  {}",
            status.kind.display_name(),
            status.value.to_string(),
            status.severity
        )?;
    }

    for metric in &result.metrics {
        writeln!(out)?;
        writeln!(out, "{} by group", metric.kind.display_name())?;
        writeln!(out, "{RULE}")?;
        for attribute in &metric.by_group {
            writeln!(out, "  {:<30} {:>12}", attribute.attribute, attribute.value.to_string())?;
            for group in &attribute.groups {
                let note = if group.insufficient_sample {
                    "  (insufficient sample)"
                } else {
                    ""
                };
                writeln!(
                    out,
                    "    {:<20} n={:<7} {:>12}{note}",
                    group.group,
                    group.size,
                    group.value.to_string()
                )?;
            }
        }
    }

    writeln!(out)?;
    if result.recommendations.is_empty() {
        writeln!(out, "No remediation needed at the current thresholds.")?;
    } else {
        writeln!(
            out,
            "Recommendations ({} critical, {} moderate)",
            summary.critical_count, summary.moderate_count
        )?;
        writeln!(out, "{RULE}")?;
        for (i, rec) in result.recommendations.iter().enumerate() {
            writeln!(out, "{:>2}. [{}] {}", i + 1, rec.severity, rec.title)?;
            writeln!(out, "    {}", rec.description)?;
            for action in &rec.actions {
                writeln!(out, "    - {action}")?;
            }
        }
    }

    if summary.insufficient_groups > 0 {
        writeln!(out)?;
        writeln!(
            out,
            "{} group(s) were below the minimum sample size and excluded from comparisons.",
            summary.insufficient_groups
        )?;
    }
    if matches!(summary.overall_fairness, MetricValue::Insufficient) {
        writeln!(out, "No metric could be computed; check group sizes and labels.")?;
    }

    Ok(out)
}
