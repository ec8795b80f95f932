//! Markdown and JSON report generation.
//!
//! This module renders report summaries and comparisons for the
//! presentation layer.

use crate::analysis::{most_failing, AVERAGE_DURATION, FAILED_TESTS, PASS_RATE, QUALITY_SCORE};
use crate::config::ReportConfig;
use crate::models::{
    ComparativeReportData, ComparisonReport, MetricChanges, ReportMetadata, SummaryReport,
    TestReportSummary, TestResultSummary, TestStatus, TrendPoint,
};
use anyhow::Result;
use serde::Serialize;

/// Generate a complete Markdown report for a summary.
pub fn generate_summary_markdown(report: &SummaryReport, config: &ReportConfig) -> String {
    let mut output = String::new();

    output.push_str("# Test Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.summary));

    if config.include_quality_metrics {
        output.push_str(&generate_quality_section(&report.summary));
    }

    output.push_str(&generate_groups_section(&report.groups, config.top_failing));
    output.push_str(&generate_trend_section(&report.trend));
    output.push_str(&generate_footer());

    output
}

/// Generate a complete Markdown report for a comparison.
pub fn generate_comparison_markdown(report: &ComparisonReport) -> String {
    let mut output = String::new();

    output.push_str("# Test Report Comparison\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_changes_section(&report.comparison));
    output.push_str(&generate_areas_section(
        "Improvements",
        &report.comparison.improvement_areas,
    ));
    output.push_str(&generate_areas_section(
        "Regressions",
        &report.comparison.regression_areas,
    ));
    output.push_str(&generate_footer());

    output
}

/// Generate a JSON report.
pub fn generate_json_report<T: Serialize>(report: &T) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Source:** {}\n", metadata.source));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push('\n');

    section
}

/// Generate the status breakdown section.
fn generate_summary_section(summary: &TestReportSummary) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");

    let counts = [
        (TestStatus::Passed, summary.passed_tests),
        (TestStatus::Failed, summary.failed_tests),
        (TestStatus::Skipped, summary.skipped_tests),
        (TestStatus::Blocked, summary.blocked_tests),
        (TestStatus::Pending, summary.pending_tests),
        (TestStatus::Error, summary.error_tests),
    ];

    let header: Vec<String> = counts
        .iter()
        .map(|(status, _)| format!("{} {}", status.emoji(), status))
        .collect();
    let values: Vec<String> = counts.iter().map(|(_, count)| count.to_string()).collect();

    section.push_str(&format!("| {} | **Total** |\n", header.join(" | ")));
    section.push_str(&format!("|{}:---:|\n", ":---:|".repeat(counts.len())));
    section.push_str(&format!(
        "| {} | **{}** |\n\n",
        values.join(" | "),
        summary.total_tests
    ));

    section.push_str(&format!("- **Pass Rate:** {:.1}%\n", summary.pass_rate));
    section.push_str(&format!(
        "- **Average Duration:** {:.0}ms\n",
        summary.average_duration_ms
    ));
    section.push_str(&format!(
        "- **Trend:** {:.1}% → {:.1}% ({})\n\n",
        summary.trend.previous,
        summary.trend.current,
        format_change(summary.trend.change)
    ));

    section
}

/// Generate the quality metrics section.
fn generate_quality_section(summary: &TestReportSummary) -> String {
    let metrics = &summary.quality_metrics;
    let mut section = String::new();

    section.push_str("## Quality Metrics\n\n");
    section.push_str("| Metric | Value |\n");
    section.push_str("|:---|:---:|\n");
    section.push_str(&format!("| Quality Score | {:.1} |\n", metrics.quality_score));
    section.push_str(&format!("| Error Density | {:.1}% |\n", metrics.error_density));
    section.push_str(&format!(
        "| Test Effectiveness | {:.1}% |\n\n",
        metrics.test_effectiveness
    ));

    section
}

/// Generate the per-group table and the most failing groups.
fn generate_groups_section(groups: &[TestResultSummary], top_failing: usize) -> String {
    if groups.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Groups\n\n");
    section.push_str("| Group | Total | Passed | Failed | Pass Rate |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---:|\n");
    for group in groups {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {:.1}% |\n",
            group.name,
            group.total,
            group.passed,
            group.failed,
            group.pass_rate()
        ));
    }
    section.push('\n');

    let failing = most_failing(groups, top_failing);
    if !failing.is_empty() {
        section.push_str("### Most Failing\n\n");
        for (group, count) in failing {
            section.push_str(&format!("- `{}`: {} failing\n", group.name, count));
        }
        section.push('\n');
    }

    section
}

/// Generate the pass rate trend section.
fn generate_trend_section(trend: &[TrendPoint]) -> String {
    if trend.len() < 2 {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Pass Rate Trend\n\n");
    section.push_str("| Entry | Pass Rate | Change |\n");
    section.push_str("|:---|:---:|:---:|\n");
    for point in trend {
        section.push_str(&format!(
            "| {} | {:.1}% | {} |\n",
            point.name,
            point.pass_rate,
            format_change(point.change)
        ));
    }
    section.push('\n');

    section
}

/// Generate the delta table of a comparison.
fn generate_changes_section(comparison: &ComparativeReportData) -> String {
    let mut section = String::new();
    let current = &comparison.current;
    let previous = &comparison.previous;

    section.push_str("## Changes\n\n");

    let rows: [(&str, String, String, String); 5] = [
        (
            PASS_RATE,
            format!("{:.1}%", previous.pass_rate),
            format!("{:.1}%", current.pass_rate),
            format_change(comparison.changes.pass_rate),
        ),
        (
            QUALITY_SCORE,
            format!("{:.1}", previous.quality_metrics.quality_score),
            format!("{:.1}", current.quality_metrics.quality_score),
            format_change(comparison.changes.quality_score),
        ),
        (
            "Total Tests",
            previous.total_tests.to_string(),
            current.total_tests.to_string(),
            format!("{:+}", comparison.changes.total_tests),
        ),
        (
            FAILED_TESTS,
            previous.failed_tests.to_string(),
            current.failed_tests.to_string(),
            format!("{:+}", comparison.changes.failed_tests),
        ),
        (
            AVERAGE_DURATION,
            format!("{:.0}ms", previous.average_duration_ms),
            format!("{:.0}ms", current.average_duration_ms),
            format!("{:+.0}ms", comparison.changes.average_duration_ms),
        ),
    ];

    match &comparison.reference_changes {
        Some(reference_changes) => {
            let against_reference = reference_columns(reference_changes);
            section.push_str("| Metric | Previous | Current | Change | vs Reference |\n");
            section.push_str("|:---|:---:|:---:|:---:|:---:|\n");
            for ((metric, before, after, change), reference) in
                rows.iter().zip(against_reference.iter())
            {
                section.push_str(&format!(
                    "| {} | {} | {} | {} | {} |\n",
                    metric, before, after, change, reference
                ));
            }
        }
        None => {
            section.push_str("| Metric | Previous | Current | Change |\n");
            section.push_str("|:---|:---:|:---:|:---:|\n");
            for (metric, before, after, change) in &rows {
                section.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    metric, before, after, change
                ));
            }
        }
    }
    section.push('\n');

    section
}

/// Deltas against the reference, in the row order of the changes table.
fn reference_columns(changes: &MetricChanges) -> [String; 5] {
    [
        format_change(changes.pass_rate),
        format_change(changes.quality_score),
        format!("{:+}", changes.total_tests),
        format!("{:+}", changes.failed_tests),
        format!("{:+.0}ms", changes.average_duration_ms),
    ]
}

/// Generate a bullet list of improvement or regression areas.
fn generate_areas_section(title: &str, areas: &[String]) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", title));
    if areas.is_empty() {
        section.push_str("None.\n\n");
        return section;
    }

    for area in areas {
        section.push_str(&format!("- {}\n", area));
    }
    section.push('\n');

    section
}

fn format_change(change: f64) -> String {
    format!("{:+.1}", change)
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by testdeck*\n".to_string()
}
