//! Harness configuration.
//!
//! Values are layered, later sources winning:
//!
//! 1. built-in defaults
//! 2. `xsbench.toml` in the working directory, or an explicit settings file
//! 3. `XSBENCH_*` environment variables (a `.env` file is loaded first)
//!
//! Command-line flags are applied on top by the caller.

use crate::error::Result;
use crate::io::OutputFormat;
use crate::table::DEFAULT_SORT_COLUMN;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use xsbench_core::timing::GNU_TIME_PROGRAM;
use xsbench_core::FailurePolicy;

/// Settings file read when no explicit path is given.
pub const DEFAULT_SETTINGS_FILE: &str = "xsbench.toml";

/// Prefix of environment overrides, e.g. `XSBENCH_ITERATIONS=5`.
pub const ENV_PREFIX: &str = "XSBENCH";

/// Source of the sample corpus.
pub const DEFAULT_DATA_URL: &str =
    "https://object.pouta.csc.fi/OPUS-OpenSubtitles/v2016/mono/en.txt.gz";

/// Everything a benchmark run can be tuned with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Timed runs per command
    pub iterations: usize,
    /// Keep the page cache warm instead of dropping it before each run
    pub preserve_cache: bool,
    /// Kill a run after this many seconds
    pub timeout_secs: Option<u64>,
    /// GNU time program and its arguments, prefixed to every command
    pub time_program: Vec<String>,
    /// What a GNU time parse failure does
    pub gnu_time_failure_policy: FailurePolicy,
    /// What a structured timing parse failure does
    pub structured_failure_policy: FailurePolicy,
    /// Directory holding the sample data
    pub data_dir: PathBuf,
    /// Report directory; reports go to the terminal when unset
    pub output_dir: Option<PathBuf>,
    /// Report format
    pub format: OutputFormat,
    /// Column summary tables are sorted by
    pub sort_column: String,
    /// Search pattern
    pub pattern: String,
    /// Where the sample corpus is downloaded from
    pub data_url: String,
    /// Wait after each cache drop, in milliseconds
    pub drop_cache_settle_ms: u64,
    /// Directory for per-run scratch files
    pub scratch_dir: Option<PathBuf>,
    /// Show progress bars
    pub progress: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            iterations: 3,
            preserve_cache: false,
            timeout_secs: None,
            time_program: GNU_TIME_PROGRAM.iter().map(|s| s.to_string()).collect(),
            gnu_time_failure_policy: FailurePolicy::Abort,
            structured_failure_policy: FailurePolicy::Skip,
            data_dir: PathBuf::from("bench_data"),
            output_dir: None,
            format: OutputFormat::default(),
            sort_column: DEFAULT_SORT_COLUMN.to_string(),
            pattern: "Sherlock".to_string(),
            data_url: DEFAULT_DATA_URL.to_string(),
            drop_cache_settle_ms: 1000,
            scratch_dir: None,
            progress: true,
        }
    }
}

impl HarnessConfig {
    /// Load the layered configuration. `path` replaces the default
    /// settings file; either file may be absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let file = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
        debug!(settings = %file.display(), "loading settings");

        let config = Config::builder()
            .add_source(File::from(file).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.iterations, 3);
        assert!(!config.preserve_cache);
        assert_eq!(config.time_program[0], "/usr/bin/time");
        assert_eq!(config.gnu_time_failure_policy, FailurePolicy::Abort);
        assert_eq!(config.structured_failure_policy, FailurePolicy::Skip);
        assert_eq!(config.sort_column, "mean wall [s]");
        assert_eq!(config.format, OutputFormat::Csv);
    }

    #[test]
    fn test_load_file_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.toml");
        fs::write(
            &path,
            r#"
iterations = 7
preserve_cache = true
format = "markdown"
structured_failure_policy = "abort"
time_program = ["/opt/time", "-f", "%e %U %S"]
"#,
        )
        .unwrap();

        let config = HarnessConfig::load(Some(&path)).unwrap();
        assert_eq!(config.iterations, 7);
        assert!(config.preserve_cache);
        assert_eq!(config.format, OutputFormat::Markdown);
        assert_eq!(config.structured_failure_policy, FailurePolicy::Abort);
        assert_eq!(config.time_program, vec!["/opt/time", "-f", "%e %U %S"]);
        assert_eq!(config.pattern, "Sherlock");
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("bench_data"));
        assert_eq!(config.drop_cache_settle_ms, 1000);
    }
}
