//! Derive result summaries from stored runs and results.

use crate::models::{TestResult, TestResultSummary, TestRun, TrendPoint};

/// Field used to group raw results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    Run,
    TestCase,
}

impl GroupKey {
    fn key_of<'a>(&self, result: &'a TestResult) -> &'a str {
        match self {
            GroupKey::Run => &result.run_id,
            GroupKey::TestCase => &result.test_case_id,
        }
    }
}

/// Group results and count each status per group, in first-seen order.
///
/// Each group's `total` is the number of results in it. Durations are
/// summed over the results that have one; a group with none has no duration.
pub fn summarize_results(results: &[TestResult], key: GroupKey) -> Vec<TestResultSummary> {
    let mut summaries: Vec<TestResultSummary> = Vec::new();

    for result in results {
        let name = key.key_of(result);
        let index = match summaries.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                summaries.push(TestResultSummary::named(name));
                summaries.len() - 1
            }
        };

        let summary = &mut summaries[index];
        summary.record(result.status);
        if let Some(duration) = result.duration_ms {
            *summary.duration_ms.get_or_insert(0.0) += duration;
        }
    }

    summaries.into_iter().map(|s| s.with_pass_rate()).collect()
}

/// Lift a run's count block into a summary named after the run.
pub fn summary_for_run(run: &TestRun) -> TestResultSummary {
    TestResultSummary {
        name: run.name.clone(),
        total: run.total,
        passed: run.passed,
        failed: run.failed,
        skipped: run.skipped,
        blocked: run.blocked,
        pending: run.pending,
        error: run.error,
        duration_ms: run.duration_ms,
        pass_rate: 0.0,
    }
    .with_pass_rate()
}

/// Pass rate per summary, in order. The first point has a change of 0.
pub fn trend_series(summaries: &[TestResultSummary]) -> Vec<TrendPoint> {
    let mut previous: Option<f64> = None;

    summaries
        .iter()
        .map(|summary| {
            let pass_rate = summary.pass_rate();
            let change = previous.map_or(0.0, |p| pass_rate - p);
            previous = Some(pass_rate);
            TrendPoint {
                name: summary.name.clone(),
                pass_rate,
                change,
            }
        })
        .collect()
}
