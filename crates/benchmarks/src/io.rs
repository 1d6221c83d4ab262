//! I/O operations for benchmark reports.
//!
//! This module reads and writes reports in the supported formats and files
//! finished reports into an output directory together with their chart and
//! an entry in the directory's result index.

use crate::error::{BenchError, Result};
use crate::index::{next_report_stem, IndexEntry, ResultIndex};
use crate::markdown;
use crate::plot;
use crate::result::Report;
use crate::table::{SummaryTable, DEFAULT_SORT_COLUMN};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// File format of a written report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossless JSON
    Json,
    /// Summary table as CSV
    #[default]
    Csv,
    /// Setup header and summary table as Markdown
    #[serde(alias = "md")]
    Markdown,
}

impl OutputFormat {
    /// Every report format.
    pub const ALL: [OutputFormat; 3] = [OutputFormat::Json, OutputFormat::Csv, OutputFormat::Markdown];

    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Markdown => "md",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(BenchError::UnknownFormat(other.to_string()).to_string()),
        }
    }
}

/// Write `report` as JSON. Samples are stored raw, so the file reads back
/// into an identical report.
pub fn write_json(report: &Report, path: impl AsRef<Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)?;
    Ok(())
}

/// Read a report written by [`write_json`].
pub fn read_json(path: impl AsRef<Path>) -> Result<Report> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn write_table<W: Write>(table: &SummaryTable, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(table.headers())?;
    for row in table.rows() {
        csv.write_record(row.iter().map(|cell| cell.to_string()))?;
    }
    csv.flush()?;
    Ok(())
}

/// Write the summary table of `report` as CSV, sorted by `sort_column`.
///
/// An unknown column keeps the rows in insertion order.
pub fn write_csv(report: &Report, path: impl AsRef<Path>, sort_column: &str) -> Result<()> {
    let table = SummaryTable::from_report(report).sorted_by(sort_column);
    write_table(&table, fs::File::create(path)?)
}

/// The CSV summary as a string.
pub fn csv_string(report: &Report, sort_column: &str) -> Result<String> {
    let table = SummaryTable::from_report(report).sorted_by(sort_column);
    let mut buffer = Vec::new();
    write_table(&table, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// `report` rendered in `format`.
pub fn render_report(report: &Report, format: OutputFormat, sort_column: &str) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Csv => csv_string(report, sort_column),
        OutputFormat::Markdown => Ok(markdown::generate_report(report, sort_column)),
    }
}

/// Write the Markdown report.
pub fn write_markdown(report: &Report, path: impl AsRef<Path>, sort_column: &str) -> Result<()> {
    fs::write(path, markdown::generate_report(report, sort_column))?;
    Ok(())
}

/// Where and how a finished report is filed.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Output directory, created if missing
    pub output_dir: PathBuf,
    /// Report format
    pub format: OutputFormat,
    /// Column the summary table is sorted by
    pub sort_column: String,
    /// Input data file, recorded in the index
    pub data_file: Option<String>,
    /// Config file the benchmark came from, recorded in the index
    pub config_file: Option<String>,
}

impl ReportOptions {
    /// Defaults for `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            format: OutputFormat::default(),
            sort_column: DEFAULT_SORT_COLUMN.to_string(),
            data_file: None,
            config_file: None,
        }
    }

    /// Set the format.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }
}

/// Write `report` and its chart under `options.output_dir` as
/// `<name>_<id>.<ext>` and `<name>_<id>.svg`, then record both in the
/// directory's result index. Returns the report path.
pub fn write_report(report: &Report, options: &ReportOptions) -> Result<PathBuf> {
    let dir = &options.output_dir;
    fs::create_dir_all(dir)?;

    let mut index = ResultIndex::load(dir)?;
    let stem = next_report_stem(dir, &report.setup.name, &index);
    let file_name = format!("{stem}.{}", options.format.extension());
    let plot_name = format!("{stem}.{}", plot::EXTENSION);
    let path = dir.join(&file_name);

    // nothing is written until every file has rendered
    let content = render_report(report, options.format, &options.sort_column)?;
    let svg = plot::render_svg(report);

    fs::write(&path, content)?;
    fs::write(dir.join(&plot_name), svg)?;
    index.insert(
        file_name,
        IndexEntry {
            setup: report.setup.clone(),
            format: options.format,
            plot: plot_name,
            file: options.data_file.clone(),
            config_file: options.config_file.clone(),
        },
    );
    index.save()?;

    info!(report = %path.display(), "report written");
    Ok(path)
}

/// Print `report` to the terminal: setup line, summary table and bar
/// charts.
pub fn print_report(report: &Report, sort_column: &str) -> Result<()> {
    let setup = &report.setup;
    println!("{}", format!("===== {} =====", setup.name).bold());
    println!(
        " CPU: {} | timer: {} | iterations: {} | cache: {}",
        setup.hardware.cpu,
        setup.timer,
        setup.iterations,
        if setup.cached { "warm" } else { "dropped" }
    );
    println!();
    let table = SummaryTable::from_report(report).sorted_by(sort_column);
    println!("{}", markdown::generate_table(&table));
    plot::plot(report, None)
}
