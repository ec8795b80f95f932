//! Data models for the test management platform.
//!
//! This module contains the stored entity documents (projects, test cases,
//! suites, runs and results) and the derived report records computed from
//! them. All records serialize to camelCase JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lenient count field: accepts integers, floats and `null`.
///
/// Negative, non-finite and null values all become 0.
fn count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<f64> = Option::deserialize(deserializer)?;
    Ok(value
        .filter(|n| n.is_finite() && *n > 0.0)
        .map(|n| n.round() as u64)
        .unwrap_or(0))
}

/// Percentage of `part` in `whole`, 0 when `whole` is 0.
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

/// Outcome of a single test execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
    Blocked,
    Pending,
    Error,
}

impl TestStatus {
    /// All statuses, in report order.
    pub const ALL: [TestStatus; 6] = [
        TestStatus::Passed,
        TestStatus::Failed,
        TestStatus::Skipped,
        TestStatus::Blocked,
        TestStatus::Pending,
        TestStatus::Error,
    ];

    /// Returns an emoji representation of the status.
    pub fn emoji(&self) -> &'static str {
        match self {
            TestStatus::Passed => "✅",
            TestStatus::Failed => "❌",
            TestStatus::Skipped => "⏭️",
            TestStatus::Blocked => "🚧",
            TestStatus::Pending => "⏳",
            TestStatus::Error => "💥",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Passed => write!(f, "Passed"),
            TestStatus::Failed => write!(f, "Failed"),
            TestStatus::Skipped => write!(f, "Skipped"),
            TestStatus::Blocked => write!(f, "Blocked"),
            TestStatus::Pending => write!(f, "Pending"),
            TestStatus::Error => write!(f, "Error"),
        }
    }
}

impl FromStr for TestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "passed" | "pass" => Ok(TestStatus::Passed),
            "failed" | "fail" => Ok(TestStatus::Failed),
            "skipped" | "skip" => Ok(TestStatus::Skipped),
            "blocked" => Ok(TestStatus::Blocked),
            "pending" => Ok(TestStatus::Pending),
            "error" => Ok(TestStatus::Error),
            other => Err(format!("Unknown test status: '{}'", other)),
        }
    }
}

impl TryFrom<String> for TestStatus {
    type Error = String;

    // `Self::Error` would be ambiguous with the `Error` variant.
    fn try_from(value: String) -> Result<Self, String> {
        value.parse()
    }
}

/// Priority of a test case.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "Low"),
            Priority::Medium => write!(f, "Medium"),
            Priority::High => write!(f, "High"),
            Priority::Critical => write!(f, "Critical"),
        }
    }
}

impl TryFrom<String> for Priority {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(format!("Unknown priority: '{}'", other)),
        }
    }
}

/// Lifecycle state of a test run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum RunStatus {
    #[default]
    Planned,
    Running,
    Completed,
    Aborted,
}

impl TryFrom<String> for RunStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "planned" => Ok(RunStatus::Planned),
            "running" | "in progress" | "in_progress" => Ok(RunStatus::Running),
            "completed" | "done" => Ok(RunStatus::Completed),
            "aborted" | "cancelled" => Ok(RunStatus::Aborted),
            other => Err(format!("Unknown run status: '{}'", other)),
        }
    }
}

/// A project groups test cases, suites and runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A single test case definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub project_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// An ordered collection of test cases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSuite {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub test_case_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One execution of a suite (or ad-hoc set of tests), with its counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRun {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "count")]
    pub total: u64,
    #[serde(default, deserialize_with = "count")]
    pub passed: u64,
    #[serde(default, deserialize_with = "count")]
    pub failed: u64,
    #[serde(default, deserialize_with = "count")]
    pub skipped: u64,
    #[serde(default, deserialize_with = "count")]
    pub blocked: u64,
    #[serde(default, deserialize_with = "count")]
    pub pending: u64,
    #[serde(default, deserialize_with = "count")]
    pub error: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// The outcome of one test case within one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub run_id: String,
    pub test_case_id: String,
    pub status: TestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Aggregate counts for a named group of tests.
///
/// Missing or null counts read as 0. The per-status counts are not
/// required to add up to `total`; see [`TestResultSummary::counts_consistent`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestResultSummary {
    pub name: String,
    #[serde(deserialize_with = "count")]
    pub total: u64,
    #[serde(deserialize_with = "count")]
    pub passed: u64,
    #[serde(deserialize_with = "count")]
    pub failed: u64,
    #[serde(deserialize_with = "count")]
    pub skipped: u64,
    #[serde(deserialize_with = "count")]
    pub blocked: u64,
    #[serde(deserialize_with = "count")]
    pub pending: u64,
    #[serde(deserialize_with = "count")]
    pub error: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    pub pass_rate: f64,
}

impl TestResultSummary {
    /// Creates an empty summary for the named group.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Records one test outcome.
    pub fn record(&mut self, status: TestStatus) {
        self.total += 1;
        *self.count_mut(status) += 1;
    }

    /// Returns the count for a status.
    pub fn count(&self, status: TestStatus) -> u64 {
        match status {
            TestStatus::Passed => self.passed,
            TestStatus::Failed => self.failed,
            TestStatus::Skipped => self.skipped,
            TestStatus::Blocked => self.blocked,
            TestStatus::Pending => self.pending,
            TestStatus::Error => self.error,
        }
    }

    fn count_mut(&mut self, status: TestStatus) -> &mut u64 {
        match status {
            TestStatus::Passed => &mut self.passed,
            TestStatus::Failed => &mut self.failed,
            TestStatus::Skipped => &mut self.skipped,
            TestStatus::Blocked => &mut self.blocked,
            TestStatus::Pending => &mut self.pending,
            TestStatus::Error => &mut self.error,
        }
    }

    /// Pass rate computed from the counts (0 when `total` is 0).
    pub fn pass_rate(&self) -> f64 {
        percentage(self.passed, self.total)
    }

    /// Returns a copy with `pass_rate` recomputed from the counts.
    pub fn with_pass_rate(mut self) -> Self {
        self.pass_rate = self.pass_rate();
        self
    }

    /// Whether the per-status counts add up to `total`.
    pub fn counts_consistent(&self) -> bool {
        let sum: u64 = TestStatus::ALL.iter().map(|s| self.count(*s)).sum();
        sum == self.total
    }
}

/// Current pass rate against a supplied previous one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Trend {
    pub current: f64,
    pub previous: f64,
    pub change: f64,
}

/// Derived quality indicators of a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QualityMetrics {
    /// Failed and errored tests as a percentage of all tests.
    pub error_density: f64,
    /// Tests that produced a verdict as a percentage of all tests.
    pub test_effectiveness: f64,
    /// Currently equal to the pass rate.
    pub quality_score: f64,
}

/// Totals and derived metrics across a collection of summaries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestReportSummary {
    pub total_tests: u64,
    pub passed_tests: u64,
    pub failed_tests: u64,
    pub skipped_tests: u64,
    pub blocked_tests: u64,
    pub pending_tests: u64,
    pub error_tests: u64,
    pub pass_rate: f64,
    pub average_duration_ms: f64,
    pub trend: Trend,
    pub quality_metrics: QualityMetrics,
}

/// Signed deltas between two report summaries (`current - other`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricChanges {
    pub pass_rate: f64,
    pub total_tests: i64,
    pub failed_tests: i64,
    pub average_duration_ms: f64,
    pub quality_score: f64,
}

/// A current report compared against a previous (and optional reference) one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparativeReportData {
    pub current: TestReportSummary,
    pub previous: TestReportSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<TestReportSummary>,
    pub changes: MetricChanges,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_changes: Option<MetricChanges>,
    pub improvement_areas: Vec<String>,
    pub regression_areas: Vec<String>,
}

/// Pass rate of one entry in a series, with the delta to the entry before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub name: String,
    pub pass_rate: f64,
    pub change: f64,
}

/// Metadata about a generated report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    /// Where the data came from (input file or project id).
    pub source: String,
    /// Date and time the report was generated.
    pub generated_at: DateTime<Utc>,
}

impl ReportMetadata {
    /// Metadata stamped with the current time.
    pub fn now(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            generated_at: Utc::now(),
        }
    }
}

/// A report summary together with the groups it was computed from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReport {
    pub metadata: ReportMetadata,
    pub summary: TestReportSummary,
    pub groups: Vec<TestResultSummary>,
    pub trend: Vec<TrendPoint>,
}

/// A comparison of report summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub metadata: ReportMetadata,
    pub comparison: ComparativeReportData,
}

/// Input of a comparison: a ready report, or summaries to aggregate first.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ReportInput {
    Summaries(Vec<TestResultSummary>),
    Report(TestReportSummary),
}
