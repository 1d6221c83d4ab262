//! CLI for xsbench.
//!
//! One subcommand per benchmark family:
//!
//! - `compare` - grep, xs and ripgrep under GNU time
//! - `searchers` / `readers` - InlineBench micro-benchmark suites
//! - `cmd` - benchmarks defined in JSON config files

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use xsbench_benchmarks::config_file::load_configs;
use xsbench_benchmarks::data::{preprocess_file, SampleData};
use xsbench_benchmarks::suite::{commands_from_file, select, SuiteContext, SuiteKind};
use xsbench_benchmarks::{
    run_and_write, BenchError, Benchmark, BenchmarkRunner, HarnessConfig, OutputFormat, ReportOptions,
};
use xsbench_core::{ExecutableCacheControl, HarnessError};

/// xsbench CLI.
#[derive(Parser, Debug)]
#[command(name = "xsbench")]
#[command(author, version, about = "Automated benchmarks of xs, grep and friends", long_about = None)]
pub struct Cli {
    /// Only log errors.
    #[arg(long, global = true, conflicts_with = "verbose")]
    pub silent: bool,

    /// Log debug messages.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Settings file (default: xsbench.toml).
    #[arg(long, global = true, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by the built-in suites.
#[derive(Args, Debug, Clone, Default)]
pub struct SuiteArgs {
    /// The directory data are downloaded to.
    #[arg(long, value_name = "PATH")]
    pub dir: Option<PathBuf>,

    /// Only download data without running benchmarks and exit.
    #[arg(long)]
    pub download: bool,

    /// List available benchmarks by name and exit.
    #[arg(long)]
    pub list_benchmarks: bool,

    /// Do not drop page caches between runs.
    #[arg(long, visible_alias = "preserve-cache", conflicts_with = "drop_cache")]
    pub cache: bool,

    /// Drop page caches by running this executable.
    #[arg(long, value_name = "PATH")]
    pub drop_cache: Option<PathBuf>,

    /// Number of iterations per benchmark.
    #[arg(short, long, value_name = "INTEGER")]
    pub iterations: Option<usize>,

    /// The pattern that is searched.
    #[arg(long, value_name = "STRING")]
    pub pattern: Option<String>,

    /// Directory results are written to (default: print to the terminal).
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Report format: json, csv or markdown.
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Only run benchmarks whose name matches this regex.
    #[arg(long, value_name = "REGEX", default_value = "")]
    pub filter: String,

    /// Run benchmarks on this file instead of the sample data.
    #[arg(long, value_name = "PATH")]
    pub input_file: Option<PathBuf>,

    /// Column the summary table is sorted by.
    #[arg(long, value_name = "COLUMN")]
    pub sort: Option<String>,

    /// Kill a single run after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compare GNU grep, xs grep and ripgrep.
    Compare {
        #[command(flatten)]
        #[allow(missing_docs)]
        common: SuiteArgs,

        /// Benchmark the commands in this file (one per line) instead.
        #[arg(long, value_name = "PATH")]
        commands: Option<PathBuf>,
    },

    /// Compare search algorithm implementations.
    Searchers {
        #[command(flatten)]
        #[allow(missing_docs)]
        common: SuiteArgs,

        /// Directory holding the search executables.
        #[arg(long, value_name = "PATH", default_value = ".")]
        binary_path: PathBuf,
    },

    /// Compare file reading strategies and chunk sizes.
    Readers {
        #[command(flatten)]
        #[allow(missing_docs)]
        common: SuiteArgs,

        /// Directory holding the reader executables.
        #[arg(long, value_name = "PATH", default_value = ".")]
        binary_path: PathBuf,
    },

    /// Run benchmarks defined in JSON config files.
    Cmd {
        /// Config files or directories containing them.
        #[arg(long, value_name = "PATH", num_args = 1.., required = true)]
        config: Vec<PathBuf>,

        /// Working directory of the configured commands.
        #[arg(long, value_name = "PATH", default_value = "sample_data")]
        data_dir: PathBuf,

        /// List configured benchmarks by name and exit.
        #[arg(long)]
        list_benchmarks: bool,

        /// Drop page caches by running this executable (default: keep caches).
        #[arg(long, value_name = "PATH")]
        drop_cache: Option<PathBuf>,

        /// Number of iterations per benchmark.
        #[arg(short, long, value_name = "INTEGER")]
        iterations: Option<usize>,

        /// Directory results are written to (default: print to the terminal).
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Report format: json, csv or markdown.
        #[arg(long, value_name = "FORMAT")]
        format: Option<OutputFormat>,

        /// Kill a single run after this many seconds.
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },
}

/// Run the xsbench CLI.
///
/// # Returns
///
/// Returns `Ok(())` on success, or an error if something goes wrong.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the xsbench CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    init_logging(cli.silent, cli.verbose);

    let mut config = HarnessConfig::load(cli.settings.as_deref()).context("loading settings")?;
    if cli.silent {
        config.progress = false;
    }

    match cli.command {
        Commands::Compare { common, commands } => {
            apply_suite_args(&mut config, &common);
            match commands {
                Some(path) => {
                    let benchmark = commands_from_file(&path, SuiteKind::Compare.timer())?;
                    let runner = runner(config.clone(), common.drop_cache.as_deref());
                    run_benchmark(&runner, &benchmark, report_options(&config, None, None).as_ref())
                }
                None => run_suite(SuiteKind::Compare, config, &common, Path::new("")),
            }
        }
        Commands::Searchers { common, binary_path } => {
            apply_suite_args(&mut config, &common);
            run_suite(SuiteKind::Searchers, config, &common, &binary_path)
        }
        Commands::Readers { common, binary_path } => {
            apply_suite_args(&mut config, &common);
            run_suite(SuiteKind::Readers, config, &common, &binary_path)
        }
        Commands::Cmd {
            config: paths,
            data_dir,
            list_benchmarks,
            drop_cache,
            iterations,
            output,
            format,
            timeout,
        } => {
            // Config benchmarks keep caches unless a dropper is given.
            config.preserve_cache = drop_cache.is_none();
            if let Some(iterations) = iterations {
                config.iterations = iterations;
            }
            if output.is_some() {
                config.output_dir = output;
            }
            if let Some(format) = format {
                config.format = format;
            }
            if timeout.is_some() {
                config.timeout_secs = timeout;
            }
            run_configs(config, &paths, &data_dir, list_benchmarks, drop_cache.as_deref())
        }
    }
}

/// Exit code for a failed run.
///
/// 1 invalid path argument, 2 no valid configuration, 3 command not found,
/// 4 permission denied, 5 anything else.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    let harness = match err.downcast_ref::<BenchError>() {
        Some(BenchError::InvalidPath { .. }) => return 1,
        Some(BenchError::NoValidConfig) => return 2,
        Some(BenchError::Harness(harness)) => Some(harness),
        Some(_) => return 5,
        None => err.downcast_ref::<HarnessError>(),
    };
    match harness {
        Some(HarnessError::CommandNotFound { .. }) => 3,
        Some(HarnessError::PermissionDenied(_)) => 4,
        _ => 5,
    }
}

fn init_logging(silent: bool, verbose: bool) {
    let filter = if silent {
        tracing_subscriber::EnvFilter::new("error")
    } else if verbose {
        tracing_subscriber::EnvFilter::new("xsbench=debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("xsbench=info"))
    };
    // A subscriber may already be installed when run more than once in-process.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Apply suite flags on top of the layered settings.
pub fn apply_suite_args(config: &mut HarnessConfig, args: &SuiteArgs) {
    if let Some(dir) = &args.dir {
        config.data_dir = dir.clone();
    }
    if args.cache {
        config.preserve_cache = true;
    }
    if let Some(iterations) = args.iterations {
        config.iterations = iterations;
    }
    if let Some(pattern) = &args.pattern {
        config.pattern = pattern.clone();
    }
    if args.output.is_some() {
        config.output_dir = args.output.clone();
    }
    if let Some(format) = args.format {
        config.format = format;
    }
    if let Some(sort) = &args.sort {
        config.sort_column = sort.clone();
    }
    if args.timeout.is_some() {
        config.timeout_secs = args.timeout;
    }
}

fn runner(config: HarnessConfig, drop_cache: Option<&Path>) -> BenchmarkRunner {
    let settle = Duration::from_millis(config.drop_cache_settle_ms);
    let runner = BenchmarkRunner::new(config);
    match drop_cache {
        Some(program) => runner.with_cache_control(Box::new(
            ExecutableCacheControl::new(program.to_string_lossy()).with_settle(settle),
        )),
        None => runner,
    }
}

fn report_options(
    config: &HarnessConfig,
    data_file: Option<&Path>,
    config_file: Option<&Path>,
) -> Option<ReportOptions> {
    config.output_dir.as_ref().map(|dir| ReportOptions {
        output_dir: dir.clone(),
        format: config.format,
        sort_column: config.sort_column.clone(),
        data_file: data_file.map(|p| p.display().to_string()),
        config_file: config_file.map(|p| p.display().to_string()),
    })
}

fn run_benchmark(
    runner: &BenchmarkRunner,
    benchmark: &Benchmark,
    options: Option<&ReportOptions>,
) -> anyhow::Result<()> {
    run_and_write(runner, benchmark, options)
        .with_context(|| format!("benchmark {:?} failed", benchmark.name))?;
    Ok(())
}

fn list(names: impl IntoIterator<Item = String>) {
    println!("The following benchmarks are available:");
    for name in names {
        println!(" - {name}");
    }
}

fn run_suite(kind: SuiteKind, config: HarnessConfig, args: &SuiteArgs, binary_dir: &Path) -> anyhow::Result<()> {
    if args.list_benchmarks {
        let ctx = SuiteContext::new("", "");
        list(kind.entries(&ctx).into_iter().map(|entry| entry.key));
        return Ok(());
    }
    let filter = Regex::new(&args.filter).map_err(BenchError::from)?;

    if let Some(dir) = &args.dir {
        if !dir.is_dir() {
            return Err(BenchError::invalid_path(dir, "is not a directory or does not exist").into());
        }
    }

    let (data_file, meta_file) = match &args.input_file {
        Some(file) => {
            if !file.is_file() {
                return Err(BenchError::invalid_path(file, "is not a file or does not exist").into());
            }
            let mut meta = file.clone().into_os_string();
            meta.push(".meta");
            (file.clone(), PathBuf::from(meta))
        }
        None => {
            let sample = SampleData::new(&config.data_dir)
                .with_url(&config.data_url)
                .with_progress(config.progress);
            let data_file = sample.ensure().context("preparing sample data")?;
            if args.download {
                info!(file = %data_file.display(), "download complete");
                return Ok(());
            }
            (data_file, sample.meta_file())
        }
    };
    if kind == SuiteKind::Compare && !preprocess_file(&data_file, &meta_file)? {
        warn!("benchmarks using metadata files may fail");
    }

    let ctx = SuiteContext::new(&data_file, &meta_file)
        .with_pattern(&config.pattern)
        .with_binary_dir(binary_dir);
    let options = report_options(&config, Some(&data_file), None);
    let runner = runner(config, args.drop_cache.as_deref());

    let entries = select(kind.entries(&ctx), &filter);
    info!(suite = %kind, benchmarks = entries.len(), "running suite");
    for entry in &entries {
        info!(benchmark = %entry.key, "running");
        run_benchmark(&runner, &entry.benchmark, options.as_ref())?;
    }
    Ok(())
}

fn run_configs(
    config: HarnessConfig,
    paths: &[PathBuf],
    data_dir: &Path,
    list_benchmarks: bool,
    drop_cache: Option<&Path>,
) -> anyhow::Result<()> {
    let configs = load_configs(paths)?;
    if list_benchmarks {
        list(configs.iter().map(|(path, c)| format!("{} ({})", c.name, path.display())));
        return Ok(());
    }
    if !data_dir.is_dir() {
        return Err(BenchError::invalid_path(data_dir, "is not a directory or does not exist").into());
    }

    let runner = runner(config.clone(), drop_cache);
    for (path, config_file) in configs {
        let options = report_options(&config, None, Some(&path));
        let benchmark = config_file.into_benchmark(data_dir);
        run_benchmark(&runner, &benchmark, options.as_ref())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_parse_compare() {
        let cli = parse(&[
            "xsbench", "compare", "--cache", "-i", "5", "--pattern", "Watson", "-o", "out", "--format", "md",
            "--filter", "regex",
        ]);
        match cli.command {
            Commands::Compare { common, commands } => {
                assert!(common.cache);
                assert_eq!(common.iterations, Some(5));
                assert_eq!(common.pattern.as_deref(), Some("Watson"));
                assert_eq!(common.output, Some(PathBuf::from("out")));
                assert_eq!(common.format, Some(OutputFormat::Markdown));
                assert_eq!(common.filter, "regex");
                assert!(commands.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_preserve_cache_alias_and_conflicts() {
        let cli = parse(&["xsbench", "readers", "--preserve-cache"]);
        assert!(matches!(cli.command, Commands::Readers { common, .. } if common.cache));

        let err = Cli::try_parse_from(["xsbench", "compare", "--cache", "--drop-cache", "/bin/drop"]);
        assert!(err.is_err());
        let err = Cli::try_parse_from(["xsbench", "--silent", "--verbose", "compare"]);
        assert!(err.is_err());
    }

    #[test]
    fn test_parse_cmd() {
        let cli = parse(&["xsbench", "cmd", "--config", "a.json", "configs", "--drop-cache", "/usr/local/bin/drop"]);
        match cli.command {
            Commands::Cmd {
                config,
                data_dir,
                drop_cache,
                ..
            } => {
                assert_eq!(config, vec![PathBuf::from("a.json"), PathBuf::from("configs")]);
                assert_eq!(data_dir, PathBuf::from("sample_data"));
                assert_eq!(drop_cache, Some(PathBuf::from("/usr/local/bin/drop")));
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from(["xsbench", "cmd"]).is_err());
    }

    #[test]
    fn test_apply_suite_args() {
        let mut config = HarnessConfig::default();
        let args = SuiteArgs {
            cache: true,
            iterations: Some(9),
            pattern: Some("Holmes".into()),
            output: Some(PathBuf::from("results")),
            format: Some(OutputFormat::Json),
            sort: Some("mean cpu [s]".into()),
            timeout: Some(30),
            ..SuiteArgs::default()
        };
        apply_suite_args(&mut config, &args);

        assert!(config.preserve_cache);
        assert_eq!(config.iterations, 9);
        assert_eq!(config.pattern, "Holmes");
        assert_eq!(config.output_dir, Some(PathBuf::from("results")));
        assert_eq!(config.format, OutputFormat::Json);
        assert_eq!(config.sort_column, "mean cpu [s]");
        assert_eq!(config.timeout_secs, Some(30));
    }

    #[test]
    fn test_exit_codes() {
        let code = |e: BenchError| exit_code(&anyhow::Error::from(e));
        assert_eq!(code(BenchError::invalid_path("x", "does not exist")), 1);
        assert_eq!(code(BenchError::NoValidConfig), 2);
        assert_eq!(
            code(BenchError::Harness(HarnessError::CommandNotFound {
                name: "rg".into(),
                program: "rg".into()
            })),
            3
        );
        assert_eq!(code(BenchError::Harness(HarnessError::PermissionDenied("root".into()))), 4);
        assert_eq!(code(BenchError::InvalidIterations(0)), 5);

        let wrapped = anyhow::Error::from(BenchError::NoValidConfig).context("loading configs");
        assert_eq!(exit_code(&wrapped), 2);
        assert_eq!(exit_code(&anyhow::anyhow!("other")), 5);
    }

    #[test]
    fn test_missing_config_path_is_invalid_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let err = run_configs(HarnessConfig::default(), &[missing], dir.path(), false, None).unwrap_err();
        assert_eq!(exit_code(&err), 1);

        let err = run_configs(HarnessConfig::default(), &[dir.path().to_path_buf()], dir.path(), false, None)
            .unwrap_err();
        assert_eq!(exit_code(&err), 2);
    }

    #[test]
    fn test_missing_data_dir_is_invalid_path() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("echo.json");
        fs::write(&config_path, r#"{"name": "n", "timer": "GNU time", "commands": {"echo": ["echo", "hi"]}}"#).unwrap();

        let err = run_configs(HarnessConfig::default(), &[config_path], &dir.path().join("absent"), false, None)
            .unwrap_err();
        assert_eq!(exit_code(&err), 1);
        assert!(format!("{err:#}").contains("absent"));
    }

    #[test]
    fn test_invalid_input_file() {
        let dir = tempfile::tempdir().unwrap();
        let args = SuiteArgs {
            input_file: Some(dir.path().join("absent.txt")),
            ..SuiteArgs::default()
        };
        let err = run_suite(SuiteKind::Compare, HarnessConfig::default(), &args, Path::new("")).unwrap_err();
        assert_eq!(exit_code(&err), 1);
    }

    #[test]
    fn test_cmd_run_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("echo.json");
        fs::write(
            &config_path,
            r#"{"name": "echo run", "timer": "GNU time", "commands": {"echo": ["echo", "hi"]}}"#,
        )
        .unwrap();
        let output = dir.path().join("results");
        let config = HarnessConfig {
            iterations: 1,
            preserve_cache: true,
            progress: false,
            output_dir: Some(output.clone()),
            format: OutputFormat::Json,
            time_program: vec![
                "sh".into(),
                "-c".into(),
                "printf '0.1\\t0.1\\t0.0\\n' >&2; exec \"$@\"".into(),
                "timer".into(),
            ],
            ..HarnessConfig::default()
        };

        run_configs(config, &[config_path], dir.path(), false, None).unwrap();
        assert!(output.join("echo_run_0.json").exists());
        assert!(output.join("results.info.json").exists());
    }
}
