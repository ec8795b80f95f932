//! Report aggregation and comparison.
//!
//! This module reduces sequences of test result summaries into report
//! summaries and compares report summaries against each other.

use crate::models::{
    percentage, ComparativeReportData, MetricChanges, QualityMetrics, ReportInput,
    TestReportSummary, TestResultSummary, Trend,
};
use tracing::debug;

pub const PASS_RATE: &str = "Pass Rate";
pub const QUALITY_SCORE: &str = "Quality Score";
pub const FAILED_TESTS: &str = "Failed Tests";
pub const AVERAGE_DURATION: &str = "Average Duration";

/// Reduce a sequence of summaries into one report summary.
///
/// Counts are summed across all entries. The average duration only
/// considers entries that carry a `duration_ms`. An empty sequence yields
/// an all-zero report; the trend still records `previous_pass_rate`.
pub fn generate_test_report_summary(
    summaries: &[TestResultSummary],
    previous_pass_rate: f64,
) -> TestReportSummary {
    let mut report = TestReportSummary::default();
    let mut duration_total = 0.0;
    let mut duration_entries = 0usize;

    for summary in summaries {
        report.total_tests = report.total_tests.saturating_add(summary.total);
        report.passed_tests = report.passed_tests.saturating_add(summary.passed);
        report.failed_tests = report.failed_tests.saturating_add(summary.failed);
        report.skipped_tests = report.skipped_tests.saturating_add(summary.skipped);
        report.blocked_tests = report.blocked_tests.saturating_add(summary.blocked);
        report.pending_tests = report.pending_tests.saturating_add(summary.pending);
        report.error_tests = report.error_tests.saturating_add(summary.error);

        if let Some(duration) = summary.duration_ms {
            duration_total += duration;
            duration_entries += 1;
        }
    }

    report.pass_rate = percentage(report.passed_tests, report.total_tests);
    report.average_duration_ms = if duration_entries > 0 {
        duration_total / duration_entries as f64
    } else {
        0.0
    };

    report.trend = Trend {
        current: report.pass_rate,
        previous: previous_pass_rate,
        change: report.pass_rate - previous_pass_rate,
    };

    report.quality_metrics = quality_metrics(&report);

    debug!(
        "Aggregated {} summaries: {} tests, {:.1}% passed",
        summaries.len(),
        report.total_tests,
        report.pass_rate
    );

    report
}

/// Compute the quality sub-record for a report's totals.
fn quality_metrics(report: &TestReportSummary) -> QualityMetrics {
    let defects = report.failed_tests + report.error_tests;
    let without_verdict = report.skipped_tests + report.blocked_tests + report.pending_tests;
    let with_verdict = report.total_tests.saturating_sub(without_verdict);

    QualityMetrics {
        error_density: percentage(defects, report.total_tests),
        test_effectiveness: percentage(with_verdict, report.total_tests),
        quality_score: report.pass_rate,
    }
}

/// Turn comparison input into a report summary.
///
/// Summaries are aggregated against `previous_pass_rate`; a ready report
/// is taken as-is.
pub fn resolve_report_input(input: ReportInput, previous_pass_rate: f64) -> TestReportSummary {
    match input {
        ReportInput::Report(report) => report,
        ReportInput::Summaries(summaries) => {
            generate_test_report_summary(&summaries, previous_pass_rate)
        }
    }
}

/// Signed deltas `current - other` for the compared metrics.
pub fn metric_changes(current: &TestReportSummary, other: &TestReportSummary) -> MetricChanges {
    MetricChanges {
        pass_rate: current.pass_rate - other.pass_rate,
        total_tests: count_delta(current.total_tests, other.total_tests),
        failed_tests: count_delta(current.failed_tests, other.failed_tests),
        average_duration_ms: current.average_duration_ms - other.average_duration_ms,
        quality_score: current.quality_metrics.quality_score
            - other.quality_metrics.quality_score,
    }
}

/// `current - other`, clamped to the `i64` range.
fn count_delta(current: u64, other: u64) -> i64 {
    let delta = i128::from(current) - i128::from(other);
    i64::try_from(delta).unwrap_or(if delta < 0 { i64::MIN } else { i64::MAX })
}

/// Split metric changes into improvement and regression areas.
///
/// Rising pass rate and quality score are improvements, rising failure
/// count and duration are regressions. Unchanged metrics are in neither.
pub fn classify_changes(changes: &MetricChanges) -> (Vec<String>, Vec<String>) {
    let mut improvements = Vec::new();
    let mut regressions = Vec::new();

    let mut place = |delta: f64, higher_is_better: bool, label: &str| {
        if delta == 0.0 || delta.is_nan() {
            return;
        }
        if (delta > 0.0) == higher_is_better {
            improvements.push(label.to_string());
        } else {
            regressions.push(label.to_string());
        }
    };

    place(changes.pass_rate, true, PASS_RATE);
    place(changes.quality_score, true, QUALITY_SCORE);
    place(changes.failed_tests as f64, false, FAILED_TESTS);
    place(changes.average_duration_ms, false, AVERAGE_DURATION);

    (improvements, regressions)
}

/// Compare a current report against a previous and optional reference one.
pub fn generate_comparative_report(
    current: &TestReportSummary,
    previous: &TestReportSummary,
    reference: Option<&TestReportSummary>,
) -> ComparativeReportData {
    let changes = metric_changes(current, previous);
    let (improvement_areas, regression_areas) = classify_changes(&changes);

    ComparativeReportData {
        current: current.clone(),
        previous: previous.clone(),
        reference: reference.cloned(),
        changes,
        reference_changes: reference.map(|r| metric_changes(current, r)),
        improvement_areas,
        regression_areas,
    }
}

/// Identify the groups with the most failures (failed plus errored).
pub fn most_failing(summaries: &[TestResultSummary], n: usize) -> Vec<(&TestResultSummary, u64)> {
    let mut failing: Vec<_> = summaries
        .iter()
        .map(|s| (s, s.failed + s.error))
        .filter(|(_, count)| *count > 0)
        .collect();

    failing.sort_by_key(|(_, count)| std::cmp::Reverse(*count));
    failing.truncate(n);

    failing
}

/// Sort summaries by pass rate (lowest first).
pub fn sort_by_pass_rate(summaries: &mut [TestResultSummary]) {
    summaries.sort_by(|a, b| {
        a.pass_rate()
            .partial_cmp(&b.pass_rate())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Generate a text summary of a report, for console output.
pub fn generate_summary_text(report: &TestReportSummary) -> String {
    let mut lines = Vec::new();

    lines.push(format!("Total Tests: {}", report.total_tests));
    lines.push(format!(
        "Passed: {} | Failed: {} | Skipped: {} | Blocked: {} | Pending: {} | Error: {}",
        report.passed_tests,
        report.failed_tests,
        report.skipped_tests,
        report.blocked_tests,
        report.pending_tests,
        report.error_tests
    ));
    lines.push(format!(
        "Pass Rate: {:.1}% ({:+.1} vs previous)",
        report.pass_rate, report.trend.change
    ));
    lines.push(format!(
        "Average Duration: {:.0}ms",
        report.average_duration_ms
    ));

    lines.join("\n")
}
