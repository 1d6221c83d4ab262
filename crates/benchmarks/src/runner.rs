//! Benchmark definition and the sequential runner.
//!
//! A run moves through fixed stages:
//!
//! ```text
//! preflight -> setup -> (warmup) -> iterate [drop cache -> run command] x N -> cleanup
//! ```
//!
//! Preflight and setup fail fast before anything is measured. Warmup only
//! happens when the page cache is kept warm; otherwise the cache is dropped
//! before every timed execution. Cleanup always runs, and its failures are
//! logged without replacing an earlier error.

use crate::error::{BenchError, Result};
use crate::result::Report;
use crate::settings::HarnessConfig;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{debug, info, warn};
use xsbench_core::cache::{CacheControl, KernelCacheControl};
use xsbench_core::{
    find_executable, BenchmarkSetup, Command, FailurePolicy, GnuTime, HarnessError, ResultAccumulator,
    RunOptions, StructuredTiming, TimerKind, TimingCapture,
};

/// One benchmark: commands measured against each other under one timer.
#[derive(Debug, Clone)]
pub struct Benchmark {
    /// Benchmark name, also the stem of its report file
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Search pattern, for search benchmarks
    pub pattern: Option<String>,
    /// Timer every command runs under
    pub timer: TimerKind,
    /// Measured commands, in report order
    pub commands: Vec<Command>,
    /// Reference command measured first in every iteration
    pub baseline: Option<Command>,
    /// Run once before anything is measured
    pub setup: Vec<Command>,
    /// Run once at the end, even after a failure
    pub cleanup: Vec<Command>,
    /// Cache mode fixed by the benchmark itself; `None` follows the runner
    pub preserve_cache: Option<bool>,
}

impl Benchmark {
    /// Empty benchmark called `name`.
    pub fn new(name: impl Into<String>, timer: TimerKind) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            pattern: None,
            timer,
            commands: Vec::new(),
            baseline: None,
            setup: Vec::new(),
            cleanup: Vec::new(),
            preserve_cache: None,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the search pattern.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Add a measured command.
    pub fn with_command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    /// Set the baseline command.
    pub fn with_baseline(mut self, command: Command) -> Self {
        self.baseline = Some(command);
        self
    }

    /// Add a setup command.
    pub fn with_setup(mut self, command: Command) -> Self {
        self.setup.push(command);
        self
    }

    /// Add a cleanup command.
    pub fn with_cleanup(mut self, command: Command) -> Self {
        self.cleanup.push(command);
        self
    }

    /// Fix the cache mode regardless of the runner's setting.
    pub fn with_preserve_cache(mut self, preserve: bool) -> Self {
        self.preserve_cache = Some(preserve);
        self
    }

    /// Baseline first, then the commands, the order they run in each
    /// iteration.
    pub fn timed_commands(&self) -> impl Iterator<Item = &Command> {
        self.baseline.iter().chain(&self.commands)
    }

    fn all_commands(&self) -> impl Iterator<Item = &Command> {
        self.timed_commands().chain(&self.setup).chain(&self.cleanup)
    }
}

/// Runs benchmarks one command at a time.
pub struct BenchmarkRunner {
    config: HarnessConfig,
    cache: Box<dyn CacheControl>,
}

impl BenchmarkRunner {
    /// Runner with the kernel page cache control.
    pub fn new(config: HarnessConfig) -> Self {
        let cache = KernelCacheControl::default()
            .with_settle(Duration::from_millis(config.drop_cache_settle_ms));
        Self {
            config,
            cache: Box::new(cache),
        }
    }

    /// Drop caches with `cache` instead.
    pub fn with_cache_control(mut self, cache: Box<dyn CacheControl>) -> Self {
        self.cache = cache;
        self
    }

    /// The configuration this runner was built with.
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Timing capture for `timer` as configured.
    pub fn capture(&self, timer: TimerKind) -> Box<dyn TimingCapture> {
        match timer {
            TimerKind::GnuTime => Box::new(
                GnuTime::default()
                    .with_program(self.config.time_program.clone())
                    .with_policy(self.config.gnu_time_failure_policy),
            ),
            TimerKind::InlineBench => Box::new(
                StructuredTiming::default().with_policy(self.config.structured_failure_policy),
            ),
        }
    }

    fn run_options(&self) -> RunOptions {
        RunOptions {
            timeout: self.config.timeout_secs.map(Duration::from_secs),
            scratch_dir: self.config.scratch_dir.clone(),
        }
    }

    /// Run `benchmark` and return its report.
    pub fn run(&self, benchmark: &Benchmark) -> Result<Report> {
        let iterations = self.config.iterations;
        if iterations == 0 {
            return Err(BenchError::InvalidIterations(iterations));
        }
        for command in benchmark.all_commands() {
            command.ensure_exists()?;
        }
        if benchmark.timer == TimerKind::GnuTime {
            self.ensure_time_program(benchmark)?;
        }

        let preserve_cache = benchmark
            .preserve_cache
            .unwrap_or(self.config.preserve_cache);
        if !preserve_cache {
            self.cache.check_access()?;
        }

        info!(
            benchmark = %benchmark.name,
            commands = benchmark.commands.len(),
            iterations,
            cached = preserve_cache,
            "running benchmark"
        );

        let mut setup = BenchmarkSetup::builder(&benchmark.name)
            .description(&benchmark.description)
            .iterations(iterations)
            .cached(preserve_cache)
            .timer(benchmark.timer);
        if let Some(pattern) = &benchmark.pattern {
            setup = setup.pattern(pattern);
        }
        let setup = setup.build();

        let options = self.run_options();
        let outcome = self.measure(benchmark, preserve_cache, &options);
        self.cleanup(benchmark, &options);

        let results = outcome?;
        Ok(Report::new(
            setup,
            results,
            benchmark.baseline.as_ref().map(|c| c.name().to_string()),
        ))
    }

    fn ensure_time_program(&self, benchmark: &Benchmark) -> Result<()> {
        let program = self.config.time_program.first().map(String::as_str).unwrap_or_default();
        if find_executable(program).is_none() {
            return Err(HarnessError::CommandNotFound {
                name: format!("{} timer", benchmark.name),
                program: program.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn measure(
        &self,
        benchmark: &Benchmark,
        preserve_cache: bool,
        options: &RunOptions,
    ) -> Result<ResultAccumulator> {
        for command in &benchmark.setup {
            info!(command = %command.name(), "running setup command");
            command.run_checked(options)?;
        }

        if preserve_cache {
            debug!("warming up");
            for command in benchmark.timed_commands() {
                command.run_plain(options)?;
            }
        }

        let capture = self.capture(benchmark.timer);
        let progress = self.progress_bar(benchmark);
        let mut results = ResultAccumulator::new();

        for iteration in 0..self.config.iterations {
            for command in benchmark.timed_commands() {
                progress.set_message(format!(
                    "{}/{}: {}",
                    iteration + 1,
                    self.config.iterations,
                    command.name()
                ));
                if !preserve_cache {
                    self.cache.drop_caches()?;
                }
                match command.run(capture.as_ref(), options) {
                    Ok(measurement) => {
                        results.merge(
                            command.name(),
                            &command.invocation().to_string(),
                            measurement,
                        )?;
                    }
                    Err(e)
                        if e.is_parse_failure()
                            && capture.failure_policy() == FailurePolicy::Skip =>
                    {
                        warn!(
                            command = %command.name(),
                            iteration,
                            error = %e,
                            "skipping unparseable run"
                        );
                    }
                    Err(e) => {
                        progress.abandon();
                        return Err(e.into());
                    }
                }
                progress.inc(1);
            }
        }
        progress.finish_and_clear();

        for command in benchmark.timed_commands() {
            if results.get(command.name()).is_none() {
                warn!(command = %command.name(), "no successful run recorded");
            }
        }
        Ok(results)
    }

    fn cleanup(&self, benchmark: &Benchmark, options: &RunOptions) {
        for command in &benchmark.cleanup {
            debug!(command = %command.name(), "running cleanup command");
            if let Err(e) = command.run_checked(options) {
                warn!(command = %command.name(), error = %e, "cleanup command failed");
            }
        }
    }

    fn progress_bar(&self, benchmark: &Benchmark) -> ProgressBar {
        if !self.config.progress {
            return ProgressBar::hidden();
        }
        let runs = self.config.iterations * benchmark.timed_commands().count();
        let pb = ProgressBar::new(runs as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    }
}
