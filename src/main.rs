//! Testdeck - test management data layer and report aggregation
//!
//! A CLI tool that aggregates test result summaries into pass-rate and
//! quality reports, compares reports across runs, and manages the stored
//! projects, test cases, suites, runs and results.
//!
//! Exit codes:
//!   0 - Success (pass rate at or above --fail-under, or no --fail-under set)
//!   1 - Runtime error (unreadable input, invalid document, missing id, etc.)
//!   2 - Pass rate below the --fail-under threshold

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use testdeck::analysis::{self, GroupKey};
use testdeck::cli::{self, Args, CollectionAction, Command, OutputFormat};
use testdeck::config::{Config, CONFIG_FILE};
use testdeck::models::{
    ComparisonReport, Project, ReportMetadata, SummaryReport, TestResult, TestResultSummary,
    TestRun,
};
use testdeck::report;
use testdeck::store::{
    id_filter, into_document, Collection, DocumentStore, FileStore, Repository, StoreError,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if matches!(args.command, Command::InitConfig) {
        return handle_init_config();
    }

    // Config is read before logging starts so it can set the log level
    let (mut config, config_source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(args.log_level(config.general.verbose));

    info!("testdeck v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    match config_source {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }

    match run(args, &config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle init-config: generate a default .testdeck.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize the data directory and report output.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr so reports written to stdout stay machine-readable.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Dispatch a subcommand. Returns the exit code (0 or 2).
async fn run(args: Args, config: &Config) -> Result<i32> {
    match args.command {
        Command::Report {
            input,
            previous_pass_rate,
            ..
        } => run_report(config, &input, previous_pass_rate).await,
        Command::Compare {
            current,
            previous,
            reference,
            ..
        } => run_compare(config, &current, &previous, reference.as_deref()).await,
        Command::ProjectReport {
            project,
            previous_pass_rate,
            ..
        } => run_project_report(config, &project, previous_pass_rate),
        Command::RunReport {
            run,
            previous_pass_rate,
            ..
        } => run_run_report(config, &run, previous_pass_rate),
        Command::Collection { name, action } => run_collection(config, &name, action),
        Command::InitConfig => handle_init_config().map(|_| 0),
    }
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up. Returns the file the config came from, if any.
fn load_config(args: &Args) -> Result<(Config, Option<PathBuf>)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Ok((Config::load(config_path)?, Some(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, Some(PathBuf::from(CONFIG_FILE)))),
        Ok(None) => Ok((Config::default(), None)),
        Err(e) => {
            eprintln!("⚠️  Failed to load config, using defaults: {:#}", e);
            Ok((Config::default(), None))
        }
    }
}

/// Read and parse a JSON input file.
async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Aggregate a file of summaries into a report.
async fn run_report(config: &Config, input: &Path, previous_pass_rate: f64) -> Result<i32> {
    let groups: Vec<TestResultSummary> = read_json(input).await?;
    info!("Read {} summaries from {}", groups.len(), input.display());

    let inconsistent = groups.iter().filter(|g| !g.counts_consistent()).count();
    if inconsistent > 0 {
        warn!(
            "{} summaries have status counts that do not add up to their total",
            inconsistent
        );
    }

    let report = build_summary_report(input.display().to_string(), groups, previous_pass_rate);
    emit_summary_report(config, &report)
}

/// Compare two (or three) reports.
async fn run_compare(
    config: &Config,
    current: &Path,
    previous: &Path,
    reference: Option<&Path>,
) -> Result<i32> {
    // Summaries given for the current side trend against the previous report
    let previous_report = analysis::resolve_report_input(read_json(previous).await?, 0.0);
    let current_report =
        analysis::resolve_report_input(read_json(current).await?, previous_report.pass_rate);

    let reference_report = match reference {
        Some(path) => Some(analysis::resolve_report_input(read_json(path).await?, 0.0)),
        None => None,
    };

    let source = match reference {
        Some(path) => format!(
            "{} vs {} (reference {})",
            current.display(),
            previous.display(),
            path.display()
        ),
        None => format!("{} vs {}", current.display(), previous.display()),
    };

    let comparison = analysis::generate_comparative_report(
        &current_report,
        &previous_report,
        reference_report.as_ref(),
    );
    let report = ComparisonReport {
        metadata: ReportMetadata::now(source),
        comparison,
    };

    let output = match config.report.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_comparison_markdown(&report),
    };
    write_output(config, &output)?;

    if config.general.output.is_some() {
        let comparison = &report.comparison;
        println!("\n📊 Comparison:");
        println!(
            "   Pass Rate: {:.1}% → {:.1}% ({:+.1})",
            comparison.previous.pass_rate,
            comparison.current.pass_rate,
            comparison.changes.pass_rate
        );
        println!("   Improvements: {}", list_or_none(&comparison.improvement_areas));
        println!("   Regressions: {}", list_or_none(&comparison.regression_areas));
    }

    Ok(check_threshold(config, report.comparison.current.pass_rate))
}

fn list_or_none(areas: &[String]) -> String {
    if areas.is_empty() {
        "none".to_string()
    } else {
        areas.join(", ")
    }
}

/// Aggregate the stored runs of a project.
fn run_project_report(config: &Config, project_id: &str, previous_pass_rate: f64) -> Result<i32> {
    let mut store = open_store(config)?;
    let (source, groups) = project_groups(&mut store, project_id)?;
    let report = build_summary_report(source, groups, previous_pass_rate);
    emit_summary_report(config, &report)
}

/// Report source and one summary per run of a project, oldest run first.
fn project_groups(
    store: &mut FileStore,
    project_id: &str,
) -> Result<(String, Vec<TestResultSummary>)> {
    let source = match Repository::<_, Project>::new(&mut *store).get(project_id) {
        Ok(project) => format!("project {} ({})", project.name, project_id),
        Err(StoreError::NotFound { .. }) => {
            warn!("No project document for '{}', using its runs only", project_id);
            format!("project {}", project_id)
        }
        Err(e) => return Err(e.into()),
    };

    let mut runs = Repository::<_, TestRun>::new(&mut *store).list_by("projectId", project_id)?;
    if runs.is_empty() {
        bail!("No test runs found for project '{}'", project_id);
    }
    runs.sort_by_key(|run| run.started_at.or(run.created_at));
    info!("Aggregating {} runs of project {}", runs.len(), project_id);

    let groups = runs
        .iter()
        .map(|run| run_summary(store, run))
        .collect::<Result<Vec<_>>>()?;
    Ok((source, groups))
}

/// Summary of one run. Runs without rolled-up counts are counted from their results.
fn run_summary(store: &mut FileStore, run: &TestRun) -> Result<TestResultSummary> {
    if run.total > 0 {
        return Ok(analysis::summary_for_run(run));
    }

    let results = Repository::<_, TestResult>::new(&mut *store).list_by("runId", run.id.as_str())?;
    debug!("Run '{}' has no counts, using {} results", run.id, results.len());

    let mut summary = analysis::summarize_results(&results, GroupKey::Run)
        .pop()
        .unwrap_or_default();
    summary.name = run.name.clone();
    Ok(summary)
}

/// Aggregate the stored results of one run, per test case.
fn run_run_report(config: &Config, run_id: &str, previous_pass_rate: f64) -> Result<i32> {
    let mut store = open_store(config)?;
    let (source, groups) = run_groups(&mut store, run_id)?;
    let report = build_summary_report(source, groups, previous_pass_rate);
    emit_summary_report(config, &report)
}

/// Report source and one summary per test case of a run.
fn run_groups(store: &mut FileStore, run_id: &str) -> Result<(String, Vec<TestResultSummary>)> {
    let run = Repository::<_, TestRun>::new(&mut *store).get(run_id)?;
    let results = Repository::<_, TestResult>::new(&mut *store).list_by("runId", run_id)?;
    if results.is_empty() {
        bail!("No test results found for run '{}'", run_id);
    }
    info!("Aggregating {} results of run {}", results.len(), run_id);

    let source = format!("run {} ({})", run.name, run_id);
    Ok((source, analysis::summarize_results(&results, GroupKey::TestCase)))
}

fn build_summary_report(
    source: String,
    groups: Vec<TestResultSummary>,
    previous_pass_rate: f64,
) -> SummaryReport {
    let groups: Vec<TestResultSummary> = groups.into_iter().map(|g| g.with_pass_rate()).collect();

    SummaryReport {
        metadata: ReportMetadata::now(source),
        summary: analysis::generate_test_report_summary(&groups, previous_pass_rate),
        trend: analysis::trend_series(&groups),
        groups,
    }
}

/// Render, write and summarize a summary report. Returns the exit code.
fn emit_summary_report(config: &Config, report: &SummaryReport) -> Result<i32> {
    let output = match config.report.format {
        OutputFormat::Json => report::generate_json_report(report)?,
        OutputFormat::Markdown => report::generate_summary_markdown(report, &config.report),
    };
    write_output(config, &output)?;

    if config.general.output.is_some() {
        println!("\n📊 Report Summary:");
        for line in analysis::generate_summary_text(&report.summary).lines() {
            println!("   {}", line);
        }
    }

    Ok(check_threshold(config, report.summary.pass_rate))
}

/// Write to the configured output file, or stdout.
fn write_output(config: &Config, content: &str) -> Result<()> {
    match config.general.output {
        Some(ref path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!("✅ Report saved to: {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

/// Exit code 2 when the pass rate is below the configured threshold.
fn check_threshold(config: &Config, pass_rate: f64) -> i32 {
    match config.report.fail_under {
        Some(threshold) if pass_rate < threshold => {
            eprintln!(
                "\n⛔ Pass rate {:.1}% is below {:.1}%. Failing (exit code 2).",
                pass_rate, threshold
            );
            2
        }
        _ => 0,
    }
}

fn open_store(config: &Config) -> Result<FileStore> {
    FileStore::open(&config.store.data_dir).with_context(|| {
        format!(
            "Failed to open data directory {}",
            config.store.data_dir.display()
        )
    })
}

/// Run a generic collection operation and print the result as JSON.
fn run_collection(config: &Config, name: &str, action: CollectionAction) -> Result<i32> {
    let mut store = open_store(config)?;

    // Known entity names map to their canonical collection
    let entity = Collection::from_name(name);
    let collection = entity.map_or(name, |c| c.name());
    debug!("Collection '{}' resolved to '{}'", name, collection);

    match action {
        CollectionAction::List { filters } => {
            let filter = cli::parse_filters(&filters).map_err(anyhow::Error::msg)?;
            let documents = store.find(collection, &filter)?;
            info!("Found {} documents in '{}'", documents.len(), collection);
            println!("{}", serde_json::to_string_pretty(&documents)?);
        }
        CollectionAction::Get { id } => {
            let Some(document) = store.find_one(collection, &id_filter(&id))? else {
                bail!("No document '{}' in '{}'", id, collection);
            };
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
        CollectionAction::Insert { json } => {
            let value = serde_json::from_str(&json).context("Document is not valid JSON")?;
            let document = into_document(value)?;
            if let Some(entity) = entity {
                entity.validate(&document)?;
            }
            let stored = store.insert(collection, document)?;
            println!("{}", serde_json::to_string_pretty(&stored)?);
        }
        CollectionAction::Update { id, json } => {
            let value = serde_json::from_str(&json).context("Patch is not valid JSON")?;
            let patch = into_document(value)?;
            if let Some(entity) = entity {
                let Some(current) = store.find_one(collection, &id_filter(&id))? else {
                    bail!("No document '{}' in '{}'", id, collection);
                };
                entity.validate_patch(&current, &patch)?;
            }
            if store.update(collection, &id_filter(&id), patch)? == 0 {
                bail!("No document '{}' in '{}'", id, collection);
            }
            if let Some(document) = store.find_one(collection, &id_filter(&id))? {
                println!("{}", serde_json::to_string_pretty(&document)?);
            }
        }
        CollectionAction::Delete { id } => {
            if store.delete(collection, &id_filter(&id))? == 0 {
                bail!("No document '{}' in '{}'", id, collection);
            }
            println!("🗑️  Deleted '{}' from '{}'", id, collection);
        }
    }

    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use testdeck::models::ReportInput;

    fn seed(store: &mut FileStore, collection: &str, documents: Vec<Value>) {
        for document in documents {
            store
                .insert(collection, into_document(document).unwrap())
                .unwrap();
        }
    }

    fn result(run_id: &str, test_case_id: &str, status: &str) -> Value {
        json!({"runId": run_id, "testCaseId": test_case_id, "status": status})
    }

    #[test]
    fn test_project_groups_oldest_run_first() {
        let temp = TempDir::new().unwrap();
        let mut store = FileStore::open(temp.path()).unwrap();
        seed(&mut store, "projects", vec![json!({"id": "p1", "name": "Checkout"})]);
        seed(
            &mut store,
            "testRuns",
            vec![
                json!({"id": "r2", "projectId": "p1", "name": "late",
                       "startedAt": "2024-03-02T10:00:00Z", "total": 4, "passed": 2, "failed": 2}),
                json!({"id": "r1", "projectId": "p1", "name": "early",
                       "startedAt": "2024-03-01T10:00:00Z", "total": 10, "passed": 10}),
                json!({"id": "r3", "projectId": "p2", "name": "other", "total": 1, "passed": 1}),
            ],
        );

        let (source, groups) = project_groups(&mut store, "p1").unwrap();

        assert_eq!(source, "project Checkout (p1)");
        let names: Vec<_> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["early", "late"]);
        assert_eq!(groups[1].failed, 2);
    }

    #[test]
    fn test_zero_count_run_is_counted_from_results() {
        let temp = TempDir::new().unwrap();
        let mut store = FileStore::open(temp.path()).unwrap();
        seed(
            &mut store,
            "testRuns",
            vec![json!({"id": "r1", "projectId": "p1", "name": "nightly", "total": 0})],
        );
        seed(
            &mut store,
            "testResults",
            vec![
                result("r1", "c1", "passed"),
                result("r1", "c2", "passed"),
                result("r1", "c3", "failed"),
                result("r9", "c1", "failed"),
            ],
        );

        let (source, groups) = project_groups(&mut store, "p1").unwrap();

        assert_eq!(source, "project p1");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "nightly");
        assert_eq!(groups[0].total, 3);
        assert_eq!(groups[0].passed, 2);
        assert_eq!(groups[0].failed, 1);
    }

    #[test]
    fn test_project_without_runs_is_an_error() {
        let temp = TempDir::new().unwrap();
        let mut store = FileStore::open(temp.path()).unwrap();
        assert!(project_groups(&mut store, "p1").is_err());
    }

    #[test]
    fn test_run_groups_per_test_case() {
        let temp = TempDir::new().unwrap();
        let mut store = FileStore::open(temp.path()).unwrap();
        seed(
            &mut store,
            "testRuns",
            vec![json!({"id": "r1", "projectId": "p1", "name": "nightly"})],
        );
        seed(
            &mut store,
            "testResults",
            vec![
                result("r1", "c1", "passed"),
                result("r1", "c2", "blocked"),
                result("r1", "c1", "failed"),
                result("r2", "c1", "failed"),
            ],
        );

        let (source, groups) = run_groups(&mut store, "r1").unwrap();

        assert_eq!(source, "run nightly (r1)");
        let names: Vec<_> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["c1", "c2"]);
        assert_eq!(groups[0].total, 2);
        assert_eq!(groups[0].pass_rate, 50.0);
        assert_eq!(groups[1].blocked, 1);
    }

    #[test]
    fn test_run_groups_errors() {
        let temp = TempDir::new().unwrap();
        let mut store = FileStore::open(temp.path()).unwrap();
        assert!(run_groups(&mut store, "missing").is_err());

        seed(
            &mut store,
            "testRuns",
            vec![json!({"id": "r1", "projectId": "p1", "name": "empty"})],
        );
        assert!(run_groups(&mut store, "r1").is_err());
    }

    #[test]
    fn test_check_threshold() {
        let mut config = Config::default();
        assert_eq!(check_threshold(&config, 10.0), 0);

        config.report.fail_under = Some(80.0);
        assert_eq!(check_threshold(&config, 79.9), 2);
        assert_eq!(check_threshold(&config, 80.0), 0);
    }

    #[test]
    fn test_read_json_report_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summaries.json");
        std::fs::write(
            &path,
            r#"[{"name": "api", "total": 10, "passed": 8, "failed": 2}]"#,
        )
        .unwrap();

        let input: ReportInput = tokio_test::block_on(read_json(&path)).unwrap();
        let report = analysis::resolve_report_input(input, 70.0);
        assert_eq!(report.total_tests, 10);
        assert_eq!(report.pass_rate, 80.0);
    }

    #[test]
    fn test_read_json_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result: Result<Vec<TestResultSummary>> =
            tokio_test::block_on(read_json(&dir.path().join("missing.json")));
        assert!(result.is_err());
    }

    #[test]
    fn test_build_summary_report_fills_pass_rates() {
        let groups = vec![TestResultSummary {
            name: "nightly".to_string(),
            total: 4,
            passed: 3,
            failed: 1,
            ..TestResultSummary::default()
        }];

        let report = build_summary_report("test".to_string(), groups, 0.0);
        assert_eq!(report.groups[0].pass_rate, 75.0);
        assert_eq!(report.summary.pass_rate, 75.0);
        assert_eq!(report.trend.len(), 1);
    }

    #[test]
    fn test_list_or_none() {
        assert_eq!(list_or_none(&[]), "none");
        assert_eq!(
            list_or_none(&["Pass Rate".to_string(), "Failed Tests".to_string()]),
            "Pass Rate, Failed Tests"
        );
    }
}
