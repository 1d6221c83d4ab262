//! Benchmark runner, suites and report writers for xsbench.
//!
//! This crate turns [`Benchmark`] definitions into [`Report`]s and files
//! them as JSON, CSV or Markdown together with an SVG chart and an entry in
//! the output directory's result index.
//!
//! # Quick Start
//!
//! ```no_run
//! use xsbench_benchmarks::{run_and_write, BenchmarkRunner, HarnessConfig, ReportOptions};
//! use xsbench_benchmarks::suite::{SuiteContext, SuiteKind};
//!
//! let config = HarnessConfig::load(None)?;
//! let runner = BenchmarkRunner::new(config);
//! let ctx = SuiteContext::new("bench_data/en.sample.txt", "bench_data/en.sample.meta");
//! let output = ReportOptions::new("bench_results");
//!
//! for entry in SuiteKind::Compare.entries(&ctx) {
//!     let report = run_and_write(&runner, &entry.benchmark, Some(&output))?;
//!     println!("{}: {} commands", report.setup.name, report.results.len());
//! }
//! # Ok::<(), xsbench_benchmarks::BenchError>(())
//! ```
//!
//! # Modules
//!
//! - [`runner`] - Benchmark definition and the sequential runner
//! - [`suite`] - Built-in benchmark tables
//! - [`config_file`] - Benchmarks defined in JSON config files
//! - [`result`] - The `Report` of one benchmark run
//! - [`table`] - Summary table shared by the CSV and Markdown writers
//! - [`io`] - Reading and writing reports
//! - [`markdown`] - Markdown report generation
//! - [`plot`] - SVG and terminal bar charts
//! - [`index`] - Result index of an output directory
//! - [`data`] - Sample corpus preparation
//! - [`settings`] - Layered harness configuration

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config_file;
pub mod data;
pub mod error;
pub mod index;
pub mod io;
pub mod markdown;
pub mod plot;
pub mod result;
pub mod runner;
pub mod settings;
pub mod suite;
pub mod table;

pub use error::{BenchError, Result};
pub use io::{OutputFormat, ReportOptions};
pub use result::Report;
pub use runner::{Benchmark, BenchmarkRunner};
pub use settings::HarnessConfig;

use tracing::info;

/// Run `benchmark` and deliver its report.
///
/// With `output` the report, its chart and an index entry are written to
/// the output directory; without it the summary and charts are printed.
/// Nothing is written when the run fails.
pub fn run_and_write(
    runner: &BenchmarkRunner,
    benchmark: &Benchmark,
    output: Option<&ReportOptions>,
) -> Result<Report> {
    info!(benchmark = %benchmark.name, "starting");
    let report = runner.run(benchmark)?;
    match output {
        Some(options) => {
            io::write_report(&report, options)?;
        }
        None => io::print_report(&report, &runner.config().sort_column)?,
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use xsbench_core::{Command, TimerKind};

    fn runner() -> BenchmarkRunner {
        BenchmarkRunner::new(HarnessConfig {
            iterations: 2,
            preserve_cache: true,
            progress: false,
            time_program: vec![
                "sh".into(),
                "-c".into(),
                "printf '0.5\\t0.25\\t0.25\\n' >&2; exec \"$@\"".into(),
                "timer".into(),
            ],
            ..HarnessConfig::default()
        })
    }

    #[test]
    fn test_run_and_write_files_report() {
        let dir = tempfile::tempdir().unwrap();
        let benchmark = Benchmark::new("echo test", TimerKind::GnuTime)
            .with_command(Command::argv("echo", ["echo", "hi"]));
        let options = ReportOptions::new(dir.path());

        let report = run_and_write(&runner(), &benchmark, Some(&options)).unwrap();
        assert_eq!(report.results.len(), 1);
        assert!(dir.path().join("echo_test_0.csv").exists());
        assert!(dir.path().join("echo_test_0.svg").exists());
        assert!(dir.path().join(index::INDEX_FILE).exists());
    }

    #[test]
    fn test_failed_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let benchmark = Benchmark::new("missing", TimerKind::GnuTime)
            .with_command(Command::argv("ghost", ["xsbench-no-such-tool"]));
        let options = ReportOptions::new(dir.path().join("out"));

        assert!(run_and_write(&runner(), &benchmark, Some(&options)).is_err());
        assert!(!dir.path().join("out").exists());
    }
}
