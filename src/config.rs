//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.testdeck.toml` files.

use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".testdeck.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Document store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Default output file path. Reports go to stdout when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

/// Document store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one JSON file per collection.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("testdeck-data")
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Output format (markdown, json).
    #[serde(default)]
    pub format: OutputFormat,

    /// Include the quality metrics section in Markdown reports.
    #[serde(default = "default_true")]
    pub include_quality_metrics: bool,

    /// Number of worst groups listed in Markdown reports.
    #[serde(default = "default_top_failing")]
    pub top_failing: usize,

    /// Exit with code 2 when the pass rate is below this percentage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_under: Option<f64>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            include_quality_metrics: true,
            top_failing: default_top_failing(),
            fail_under: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_top_failing() -> usize {
    5
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load configuration from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// where the CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref data_dir) = args.data_dir {
            self.store.data_dir = data_dir.clone();
        }

        if args.verbose {
            self.general.verbose = true;
        }

        let Some(options) = args.command.report_options() else {
            return;
        };

        if let Some(format) = options.format {
            self.report.format = format;
        }
        if let Some(ref output) = options.output {
            self.general.output = Some(output.clone());
        }
        if let Some(fail_under) = options.fail_under {
            self.report.fail_under = Some(fail_under);
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Args, Command, ReportOptions};
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store.data_dir, PathBuf::from("testdeck-data"));
        assert_eq!(config.report.format, OutputFormat::Markdown);
        assert!(config.report.include_quality_metrics);
        assert_eq!(config.report.fail_under, None);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
verbose = true
output = "reports/latest.md"

[store]
data_dir = "/var/lib/testdeck"

[report]
format = "json"
fail_under = 90.0
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert!(config.general.verbose);
        assert_eq!(config.general.output, Some(PathBuf::from("reports/latest.md")));
        assert_eq!(config.store.data_dir, PathBuf::from("/var/lib/testdeck"));
        assert_eq!(config.report.format, OutputFormat::Json);
        assert_eq!(config.report.fail_under, Some(90.0));
        assert_eq!(config.report.top_failing, 5);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[store]"));
        assert!(toml_str.contains("[report]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.store.data_dir, Config::default().store.data_dir);
    }

    #[test]
    fn test_load_from_dir() {
        let temp = TempDir::new().unwrap();
        assert!(Config::load_from_dir(temp.path()).unwrap().is_none());

        std::fs::write(temp.path().join(CONFIG_FILE), "[store]\ndata_dir = \"db\"\n").unwrap();
        let config = Config::load_from_dir(temp.path()).unwrap().unwrap();
        assert_eq!(config.store.data_dir, PathBuf::from("db"));

        std::fs::write(temp.path().join(CONFIG_FILE), "[store\n").unwrap();
        assert!(Config::load_from_dir(temp.path()).is_err());
    }

    #[test]
    fn test_merge_with_args() {
        let args = Args {
            config: None,
            data_dir: Some(PathBuf::from("other")),
            verbose: false,
            quiet: false,
            command: Command::Report {
                input: PathBuf::from("summaries.json"),
                previous_pass_rate: 0.0,
                options: ReportOptions {
                    format: Some(OutputFormat::Json),
                    output: None,
                    fail_under: Some(75.0),
                },
            },
        };

        let mut config = Config::default();
        config.general.output = Some(PathBuf::from("kept.md"));
        config.merge_with_args(&args);

        assert_eq!(config.store.data_dir, PathBuf::from("other"));
        assert_eq!(config.report.format, OutputFormat::Json);
        assert_eq!(config.report.fail_under, Some(75.0));
        assert_eq!(config.general.output, Some(PathBuf::from("kept.md")));
    }
}
