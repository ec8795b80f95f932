//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::store::Filter;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Testdeck - test management data and reporting
///
/// Aggregate test result summaries into pass-rate and quality reports,
/// compare reports across runs, and manage the stored projects, test
/// cases, suites, runs and results.
///
/// Examples:
///   testdeck report --input summaries.json --previous-pass-rate 70
///   testdeck compare --current this-week.json --previous last-week.json
///   testdeck project-report --project checkout --format json
///   testdeck run-report --run nightly-42 --output run.md
///   testdeck collection testRuns list --where projectId=checkout
///   testdeck collection projects insert '{"name": "Checkout"}'
///   testdeck init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .testdeck.toml in the current directory
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory holding the document collections
    #[arg(long, global = true, env = "TESTDECK_DATA_DIR", value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Aggregate a JSON array of result summaries into a report
    Report {
        /// JSON file with an array of result summaries
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Pass rate of the previous report, for the trend
        #[arg(long, default_value = "0", value_name = "PERCENT")]
        previous_pass_rate: f64,

        #[command(flatten)]
        options: ReportOptions,
    },

    /// Compare a current report against a previous (and optional reference) one
    ///
    /// Each file holds either a report summary object or an array of
    /// result summaries, which is aggregated first.
    Compare {
        /// Current report or summaries
        #[arg(long, value_name = "FILE")]
        current: PathBuf,

        /// Previous report or summaries
        #[arg(long, value_name = "FILE")]
        previous: PathBuf,

        /// Reference (baseline) report or summaries
        #[arg(long, value_name = "FILE")]
        reference: Option<PathBuf>,

        #[command(flatten)]
        options: ReportOptions,
    },

    /// Aggregate the stored test runs of a project into a report
    ProjectReport {
        /// Project id
        #[arg(short, long, value_name = "ID")]
        project: String,

        /// Pass rate of the previous report, for the trend
        #[arg(long, default_value = "0", value_name = "PERCENT")]
        previous_pass_rate: f64,

        #[command(flatten)]
        options: ReportOptions,
    },

    /// Aggregate the stored results of one test run, per test case
    RunReport {
        /// Test run id
        #[arg(short, long, value_name = "ID")]
        run: String,

        /// Pass rate of the previous report, for the trend
        #[arg(long, default_value = "0", value_name = "PERCENT")]
        previous_pass_rate: f64,

        #[command(flatten)]
        options: ReportOptions,
    },

    /// Operate on any stored collection by name
    Collection {
        /// Collection name (matched case-insensitively against existing ones)
        name: String,

        #[command(subcommand)]
        action: CollectionAction,
    },

    /// Generate a default .testdeck.toml configuration file
    InitConfig,
}

/// Report output options shared by the reporting subcommands.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ReportOptions {
    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Output file path for the report (stdout if not set)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Fail if the pass rate is below this percentage
    ///
    /// Useful for CI pipelines. Exit code 2 when the threshold is not met.
    #[arg(long, value_name = "PERCENT")]
    pub fail_under: Option<f64>,
}

/// Generic collection operations.
#[derive(Subcommand, Debug, Clone)]
pub enum CollectionAction {
    /// List documents, optionally filtered by field equality
    List {
        /// Filter as FIELD=VALUE; VALUE is parsed as JSON when possible
        #[arg(long = "where", value_name = "FIELD=VALUE")]
        filters: Vec<String>,
    },
    /// Show one document by id
    Get { id: String },
    /// Insert a JSON document
    Insert { json: String },
    /// Merge JSON fields into the document with the given id
    Update { id: String, json: String },
    /// Delete the document with the given id
    Delete { id: String },
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Command {
    /// Report options of the reporting subcommands.
    pub fn report_options(&self) -> Option<&ReportOptions> {
        match self {
            Command::Report { options, .. }
            | Command::Compare { options, .. }
            | Command::ProjectReport { options, .. }
            | Command::RunReport { options, .. } => Some(options),
            Command::Collection { .. } | Command::InitConfig => None,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        match &self.command {
            Command::Report {
                previous_pass_rate, ..
            }
            | Command::ProjectReport {
                previous_pass_rate, ..
            }
            | Command::RunReport {
                previous_pass_rate, ..
            } => validate_percentage("Previous pass rate", *previous_pass_rate)?,
            Command::Collection {
                action: CollectionAction::List { filters },
                ..
            } => {
                parse_filters(filters)?;
            }
            _ => {}
        }

        if let Some(fail_under) = self.command.report_options().and_then(|o| o.fail_under) {
            validate_percentage("Fail-under threshold", fail_under)?;
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `--quiet` wins over a configured default of verbose.
    pub fn log_level(&self, verbose_by_default: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || verbose_by_default {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

fn validate_percentage(label: &str, value: f64) -> Result<(), String> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(format!("{} must be between 0 and 100", label))
    }
}

/// Parse `FIELD=VALUE` pairs into a filter.
///
/// Values that parse as JSON (numbers, booleans, quoted strings) keep
/// their type; anything else is a plain string.
pub fn parse_filters(filters: &[String]) -> Result<Filter, String> {
    let mut filter = Filter::new();

    for pair in filters {
        let (field, raw) = pair
            .split_once('=')
            .ok_or_else(|| format!("Filter must look like FIELD=VALUE: '{}'", pair))?;
        let field = field.trim();
        if field.is_empty() {
            return Err(format!("Filter field is empty: '{}'", pair));
        }

        let value =
            serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        filter.insert(field.to_string(), value);
    }

    Ok(filter)
}
