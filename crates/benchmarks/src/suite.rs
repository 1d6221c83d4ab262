//! Built-in benchmark tables.
//!
//! Every suite is plain data: a list of keyed [`Benchmark`]s built from a
//! [`SuiteContext`] and handed to the one generic runner. Keys are what
//! `--filter` matches and `--list-benchmarks` prints.

use crate::error::{BenchError, Result};
use crate::runner::Benchmark;
use regex::Regex;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;
use xsbench_core::{Command, TimerKind};

/// Pattern searched for when none is given.
pub const DEFAULT_PATTERN: &str = "Sherlock";

/// Pattern regex benchmarks use while [`DEFAULT_PATTERN`] is in effect.
pub const REGEX_PATTERN: &str = "She[r ]lock";

/// Chunk sizes of the reader benchmarks, in bytes.
pub const CHUNK_SIZES: [u64; 7] = [
    4096, 32768, 262144, 2097152, 16777216, 134217728, 1073741824,
];

/// Inputs the tables are built from.
#[derive(Debug, Clone)]
pub struct SuiteContext {
    /// File searched or read
    pub data_file: PathBuf,
    /// Metadata file produced by `xspp` for `data_file`
    pub meta_file: PathBuf,
    /// Search pattern
    pub pattern: String,
    /// Directory holding the micro-benchmark executables
    pub binary_dir: PathBuf,
}

impl SuiteContext {
    /// Context for `data_file` with its metadata file next to it.
    pub fn new(data_file: impl Into<PathBuf>, meta_file: impl Into<PathBuf>) -> Self {
        Self {
            data_file: data_file.into(),
            meta_file: meta_file.into(),
            pattern: DEFAULT_PATTERN.to_string(),
            binary_dir: PathBuf::new(),
        }
    }

    /// Set the search pattern.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Set the executable directory.
    pub fn with_binary_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.binary_dir = dir.into();
        self
    }

    /// The pattern a benchmark keyed `key` searches for.
    pub fn pattern_for(&self, key: &str) -> &str {
        if key.contains("regex") && self.pattern == DEFAULT_PATTERN {
            REGEX_PATTERN
        } else {
            &self.pattern
        }
    }

    fn data(&self) -> String {
        self.data_file.to_string_lossy().into_owned()
    }

    fn meta(&self) -> String {
        self.meta_file.to_string_lossy().into_owned()
    }

    fn binary(&self, name: &str) -> String {
        self.binary_dir.join(name).to_string_lossy().into_owned()
    }
}

/// One keyed benchmark of a suite.
#[derive(Debug, Clone)]
pub struct SuiteEntry {
    /// Selection key
    pub key: String,
    /// The benchmark
    pub benchmark: Benchmark,
}

impl SuiteEntry {
    fn new(key: impl Into<String>, benchmark: Benchmark) -> Self {
        Self {
            key: key.into(),
            benchmark,
        }
    }
}

/// The built-in suites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteKind {
    /// grep, xs and ripgrep under GNU time
    Compare,
    /// Search algorithm micro-benchmarks
    Searchers,
    /// File reading micro-benchmarks
    Readers,
}

impl SuiteKind {
    /// All entries of the suite, in run order.
    pub fn entries(&self, ctx: &SuiteContext) -> Vec<SuiteEntry> {
        match self {
            SuiteKind::Compare => comparison_entries(ctx),
            SuiteKind::Searchers => searcher_entries(ctx),
            SuiteKind::Readers => reader_entries(ctx),
        }
    }

    /// Timer the suite's benchmarks run under.
    pub fn timer(&self) -> TimerKind {
        match self {
            SuiteKind::Compare => TimerKind::GnuTime,
            SuiteKind::Searchers | SuiteKind::Readers => TimerKind::InlineBench,
        }
    }
}

impl fmt::Display for SuiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuiteKind::Compare => write!(f, "compare"),
            SuiteKind::Searchers => write!(f, "searchers"),
            SuiteKind::Readers => write!(f, "readers"),
        }
    }
}

impl FromStr for SuiteKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compare" | "comparison" => Ok(SuiteKind::Compare),
            "searchers" => Ok(SuiteKind::Searchers),
            "readers" => Ok(SuiteKind::Readers),
            other => Err(format!("unknown suite {other:?}")),
        }
    }
}

/// Entries whose key matches `filter`.
pub fn select(entries: Vec<SuiteEntry>, filter: &Regex) -> Vec<SuiteEntry> {
    entries
        .into_iter()
        .filter(|entry| {
            let selected = filter.is_match(&entry.key);
            if !selected {
                debug!(benchmark = %entry.key, "skipping");
            }
            selected
        })
        .collect()
}

/// `4096` -> `4K`, `1073741824` -> `1G`.
pub fn size_label(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["", "K", "M", "G"];
    let mut size = bytes;
    let mut unit = 0;
    while size >= 1000 && unit < UNITS.len() - 1 {
        size /= 1024;
        unit += 1;
    }
    format!("{size}{}", UNITS[unit])
}

/// Quote `s` for `sh`.
pub fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:".contains(c))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// A benchmark of the commands listed in `path`, one whitespace-separated
/// command line per line.
pub fn commands_from_file(path: &Path, timer: TimerKind) -> Result<Benchmark> {
    if !path.is_file() {
        return Err(BenchError::invalid_path(path, "is not a file or does not exist"));
    }
    let content = fs::read_to_string(path)?;
    let mut benchmark = Benchmark::new("custom benchmark", timer)
        .with_description(format!("Commands read from {}", path.display()));
    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        benchmark = benchmark.with_command(Command::argv(line, line.split_whitespace()));
    }
    Ok(benchmark)
}

struct SearchTool {
    name: &'static str,
    program: &'static str,
    with_meta: bool,
    flags: &'static [&'static str],
}

const SEARCH_TOOLS: [SearchTool; 11] = [
    SearchTool { name: "GNU grep", program: "grep", with_meta: false, flags: &[] },
    SearchTool { name: "xs grep", program: "xs", with_meta: false, flags: &[] },
    SearchTool { name: "xs grep meta", program: "xs", with_meta: true, flags: &[] },
    SearchTool { name: "xs grep --no-mmap", program: "xs", with_meta: false, flags: &["--no-mmap"] },
    SearchTool { name: "xs grep -j 1", program: "xs", with_meta: false, flags: &["-j", "1"] },
    SearchTool { name: "xs grep -j 1 meta", program: "xs", with_meta: true, flags: &["-j", "1"] },
    SearchTool { name: "xs grep --no-mmap -j 1", program: "xs", with_meta: false, flags: &["--no-mmap", "-j", "1"] },
    SearchTool { name: "ripgrep", program: "rg", with_meta: false, flags: &[] },
    SearchTool { name: "ripgrep --no-mmap", program: "rg", with_meta: false, flags: &["--no-mmap"] },
    SearchTool { name: "ripgrep -j 1", program: "rg", with_meta: false, flags: &["-j", "1"] },
    SearchTool { name: "ripgrep --no-mmap -j 1", program: "rg", with_meta: false, flags: &["-j", "1", "--no-mmap"] },
];

struct SearchCase {
    key: &'static str,
    name: &'static str,
    flag: Option<&'static str>,
    description: &'static str,
}

const SEARCH_CASES: [SearchCase; 8] = [
    SearchCase {
        key: "comparison: literal, plane",
        name: "literal",
        flag: None,
        description: "Search of matching lines.",
    },
    SearchCase {
        key: "comparison: literal, line numbers",
        name: "literal line numbers",
        flag: Some("-n"),
        description: "Search of matching lines, reporting line numbers.",
    },
    SearchCase {
        key: "comparison: literal, byte offset",
        name: "literal byte offsets",
        flag: Some("-b"),
        description: "Search of matching lines, reporting byte offsets.",
    },
    SearchCase {
        key: "comparison: literal, case insensitive",
        name: "literal case insensitive",
        flag: Some("-i"),
        description: "Case insensitive search of matching lines.",
    },
    SearchCase {
        key: "comparison: regex",
        name: "regex",
        flag: None,
        description: "Regex search of matching lines.",
    },
    SearchCase {
        key: "comparison: regex, line numbers",
        name: "regex line numbers",
        flag: Some("-n"),
        description: "Regex search of matching lines, reporting line numbers.",
    },
    SearchCase {
        key: "comparison: regex, byte offset",
        name: "regex byte offsets",
        flag: Some("-b"),
        description: "Regex search of matching lines, reporting byte offsets.",
    },
    SearchCase {
        key: "comparison: regex, case insensitive",
        name: "regex case insensitive",
        flag: Some("-i"),
        description: "Case insensitive regex search of matching lines.",
    },
];

fn comparison_entries(ctx: &SuiteContext) -> Vec<SuiteEntry> {
    let mut entries: Vec<SuiteEntry> = SEARCH_CASES
        .iter()
        .map(|case| SuiteEntry::new(case.key, search_case(ctx, case)))
        .collect();
    entries.push(zstd_case(ctx));
    entries.push(lz4_case(ctx));
    entries
}

fn search_case(ctx: &SuiteContext, case: &SearchCase) -> Benchmark {
    let pattern = ctx.pattern_for(case.key);
    let (data, meta) = (ctx.data(), ctx.meta());

    let mut benchmark = Benchmark::new(case.name, TimerKind::GnuTime)
        .with_description(case.description)
        .with_pattern(pattern)
        .with_baseline(Command::argv("cat", ["cat", data.as_str()]));
    for tool in &SEARCH_TOOLS {
        let mut argv = vec![tool.program, pattern, data.as_str()];
        if tool.with_meta {
            argv.push(meta.as_str());
        }
        argv.extend(tool.flags);
        argv.extend(case.flag);
        benchmark = benchmark.with_command(Command::argv(tool.name, argv));
    }
    benchmark
}

fn zstd_case(ctx: &SuiteContext) -> SuiteEntry {
    let data = ctx.data();
    let compressed = format!("{data}.zst");
    let xs_file = format!("{data}.xszst");
    let xs_meta = format!("{data}.xszst.meta");
    let benchmark = compressed_case(
        ctx,
        "zstd compressed file input",
        "zstdcat",
        &compressed,
        &xs_file,
        &xs_meta,
    )
    .with_setup(Command::argv(
        "zstd",
        ["zstd", data.as_str(), "-o", compressed.as_str(), "-f", "-q"],
    ))
    .with_setup(Command::argv(
        "xspp zstd",
        ["xspp", data.as_str(), "-o", xs_file.as_str(), "-m", xs_meta.as_str(), "-a", "zst"],
    ));
    SuiteEntry::new("comparison: zstd compressed input file", benchmark)
}

fn lz4_case(ctx: &SuiteContext) -> SuiteEntry {
    let data = ctx.data();
    let compressed = format!("{data}.lz4");
    let xs_file = format!("{data}.xslz4");
    let xs_meta = format!("{data}.xslz4.meta");
    let benchmark = compressed_case(
        ctx,
        "lz4 compressed file input",
        "lz4cat",
        &compressed,
        &xs_file,
        &xs_meta,
    )
    .with_setup(Command::argv(
        "lz4 HC",
        ["lz4", data.as_str(), compressed.as_str(), "-9", "-f", "-q"],
    ))
    .with_setup(Command::argv(
        "xspp lz4",
        ["xspp", data.as_str(), xs_file.as_str(), "-m", xs_meta.as_str(), "-a", "lz4", "--hc"],
    ));
    SuiteEntry::new("comparison: lz4 compressed input file", benchmark)
}

fn compressed_case(
    ctx: &SuiteContext,
    name: &str,
    cat: &str,
    compressed: &str,
    xs_file: &str,
    xs_meta: &str,
) -> Benchmark {
    let pattern = ctx.pattern.as_str();
    let quoted_file = shell_quote(compressed);
    let quoted_pattern = shell_quote(pattern);

    let mut benchmark = Benchmark::new(name, TimerKind::GnuTime)
        .with_description(format!("Search of matching lines in a {cat} decompressed stream."))
        .with_pattern(pattern)
        .with_baseline(Command::argv(cat, [cat, compressed]));
    for (label, searcher) in [("grep", "grep"), ("rg", "rg"), ("xs", "xs")] {
        benchmark = benchmark.with_command(Command::shell(
            format!("{cat} | {label}"),
            format!("{cat} {quoted_file} | {searcher} {quoted_pattern}"),
        ));
    }
    let algorithm = if cat == "zstdcat" { "zstd" } else { "lz4" };
    benchmark.with_command(Command::argv(
        format!("xspp -a {algorithm} -> xs"),
        ["xs", pattern, xs_file, xs_meta],
    ))
}

struct Searcher {
    name: &'static str,
    binary: &'static str,
    args: &'static [&'static str],
}

fn searcher_entries(ctx: &SuiteContext) -> Vec<SuiteEntry> {
    const REGEX: [Searcher; 4] = [
        Searcher { name: "re2 regex", binary: "re2_search", args: &[] },
        Searcher { name: "std::regex", binary: "std_regex_search", args: &[] },
        Searcher { name: "re2 regex -i", binary: "re2_search", args: &["-i"] },
        Searcher { name: "std::regex -i", binary: "std_regex_search", args: &["-i"] },
    ];
    const LITERAL: [Searcher; 4] = [
        Searcher { name: "re2 regex", binary: "re2_search", args: &["-l"] },
        Searcher { name: "std::strstr", binary: "std_strstr_search", args: &[] },
        Searcher { name: "std::string::find", binary: "std_string_find_search", args: &[] },
        Searcher { name: "simd::strstr", binary: "simd_strstr", args: &[] },
    ];
    const LITERAL_CASE_INSENSITIVE: [Searcher; 4] = [
        Searcher { name: "re2 regex", binary: "re2_search", args: &["-l", "-i"] },
        Searcher { name: "std::strstr", binary: "std_strstr_search", args: &["-i"] },
        Searcher { name: "std::string::find", binary: "std_string_find_search", args: &["-i"] },
        Searcher { name: "simd::strstr", binary: "simd_strstr", args: &["-i"] },
    ];

    [
        ("regex", "regex search", &REGEX),
        ("literal", "literal", &LITERAL),
        ("literal case insensitive", "literal case insensitive", &LITERAL_CASE_INSENSITIVE),
    ]
    .into_iter()
    .map(|(key, name, searchers)| {
        SuiteEntry::new(key, searcher_benchmark(ctx, name, ctx.pattern_for(key), searchers))
    })
    .collect()
}

fn searcher_benchmark(ctx: &SuiteContext, name: &str, pattern: &str, searchers: &[Searcher]) -> Benchmark {
    let data = ctx.data();
    let mut benchmark = Benchmark::new(name, TimerKind::InlineBench)
        .with_pattern(pattern)
        .with_preserve_cache(true)
        .with_setup(Command::argv("cat", ["cat", data.as_str()]));
    for searcher in searchers {
        let mut argv = vec![ctx.binary(searcher.binary), pattern.to_string(), data.clone()];
        argv.extend(searcher.args.iter().map(|a| a.to_string()));
        benchmark = benchmark.with_command(Command::argv(searcher.name, argv));
    }
    benchmark
}

const READERS: [(&str, &str); 4] = [
    ("mmap read", "mmap_read"),
    ("posix read", "posix_read"),
    ("fread read", "fread_read"),
    ("std::ifstream read", "std_ifstream_read"),
];

fn reader_command(ctx: &SuiteContext, name: impl Into<String>, binary: &str, chunk_size: u64) -> Command {
    Command::argv(
        name,
        [ctx.binary(binary), ctx.data(), "-s".to_string(), chunk_size.to_string()],
    )
}

fn reader_entries(ctx: &SuiteContext) -> Vec<SuiteEntry> {
    let mut entries: Vec<SuiteEntry> = READERS
        .iter()
        .map(|(reader, binary)| {
            let mut benchmark = Benchmark::new(format!("{reader}: chunk sizes"), TimerKind::InlineBench)
                .with_description(format!("{reader} with chunk sizes from 4K to 1G."));
            for size in CHUNK_SIZES {
                benchmark = benchmark.with_command(reader_command(ctx, size_label(size), binary, size));
            }
            SuiteEntry::new(format!("chunk size: {reader}"), benchmark)
        })
        .collect();

    let mut compare = Benchmark::new("compare readers", TimerKind::InlineBench)
        .with_description("Each reader with its best chunk size.");
    for (reader, binary) in READERS {
        let size = if binary == "mmap_read" { 16777216 } else { 262144 };
        compare = compare.with_command(reader_command(
            ctx,
            format!("{reader} ({})", size_label(size)),
            binary,
            size,
        ));
    }
    entries.push(SuiteEntry::new("compare readers", compare));
    entries
}
